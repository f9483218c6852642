use conduit_scene::{CellValue, DataTableData, HostTransform};

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};

pub const DATA_TABLE_ROW_NAME: &str = "unreal_data_table_row_name";
pub const DATA_TABLE_ROW_STRUCT: &str = "unreal_data_table_rowstruct";
pub const DATA_TABLE_COLUMN_PREFIX: &str = "unreal_data_table_";

fn cell_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Float(value) => value.to_string(),
        CellValue::Int(value) => value.to_string(),
        CellValue::Bool(value) => value.to_string(),
        CellValue::String(value) => value.clone(),
        CellValue::Vector(v) => format!("({}, {}, {})", v[0], v[1], v[2]),
    }
}

/// One column as a point attribute. Columns whose cells disagree on type fall back
/// to strings; missing cells take the type's default.
fn column_storage(table: &DataTableData, column: usize) -> AttributeStorage {
    let cells: Vec<Option<&CellValue>> = table.rows.iter().map(|row| row.values.get(column)).collect();
    let first = cells.iter().flatten().next();
    let uniform = cells.iter().flatten().all(|cell| {
        first.is_some_and(|first| std::mem::discriminant(*first) == std::mem::discriminant(*cell))
    });
    if !uniform {
        return AttributeStorage::String(
            cells.iter().map(|cell| cell.map(cell_text).unwrap_or_default()).collect(),
        );
    }
    match first {
        Some(CellValue::Float(_)) => AttributeStorage::Float(
            cells
                .iter()
                .map(|cell| match cell {
                    Some(CellValue::Float(value)) => *value,
                    _ => 0.0,
                })
                .collect(),
        ),
        Some(CellValue::Int(_)) => AttributeStorage::Int(
            cells
                .iter()
                .map(|cell| match cell {
                    Some(CellValue::Int(value)) => *value,
                    _ => 0,
                })
                .collect(),
        ),
        Some(CellValue::Bool(_)) => AttributeStorage::Bool(
            cells
                .iter()
                .map(|cell| matches!(cell, Some(CellValue::Bool(true))))
                .collect(),
        ),
        Some(CellValue::Vector(_)) => AttributeStorage::Vec3(
            cells
                .iter()
                .map(|cell| match cell {
                    Some(CellValue::Vector(value)) => *value,
                    _ => [0.0; 3],
                })
                .collect(),
        ),
        Some(CellValue::String(_)) | None => AttributeStorage::String(
            cells.iter().map(|cell| cell.map(cell_text).unwrap_or_default()).collect(),
        ),
    }
}

impl GeometryExtractor for DataTableData {
    /// One point per row, all at the origin.
    fn extract(
        &self,
        _transform: &HostTransform,
        _ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let positions = vec![[0.0; 3]; self.rows.len()];
        let mut part = PartGeometry::new(PartKind::Points, positions, FaceTopology::default());
        if self.rows.is_empty() {
            return Ok(Extraction::from_part(part));
        }
        part.set_attribute(
            AttributeOwner::Point,
            DATA_TABLE_ROW_NAME,
            AttributeStorage::String(self.rows.iter().map(|row| row.name.clone()).collect()),
        );
        for (index, column) in self.columns.iter().enumerate() {
            part.set_attribute(
                AttributeOwner::Point,
                format!("{DATA_TABLE_COLUMN_PREFIX}{index}_{column}"),
                column_storage(self, index),
            );
        }
        part.set_attribute(
            AttributeOwner::Detail,
            DATA_TABLE_ROW_STRUCT,
            AttributeStorage::String(vec![self.row_struct.clone()]),
        );
        Ok(Extraction::from_part(part))
    }
}
