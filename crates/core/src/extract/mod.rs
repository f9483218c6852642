//! Per-kind readers that turn host objects into engine-convention parts.

mod brush;
mod camera;
mod data_table;
mod instancer;
mod landscape;
mod mesh;
mod spline;

use conduit_scene::{HostTransform, SceneObjectData};

use crate::error::BridgeError;
use crate::geometry::Extraction;
use crate::registry::InputOptions;

pub use brush::BRUSH_TEXEL_SCALE;
pub use data_table::{DATA_TABLE_COLUMN_PREFIX, DATA_TABLE_ROW_NAME, DATA_TABLE_ROW_STRUCT};
pub use landscape::HEIGHT_ATTRIBUTE;
pub use mesh::{
    BONE_INDEX_ATTRIBUTE, BONE_WEIGHT_ATTRIBUTE, LOD_ATTRIBUTE, PIECE_ATTRIBUTE,
    SKELETON_ATTRIBUTE,
};
pub use spline::CURVE_CLOSED_ATTRIBUTE;

#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub options: &'a InputOptions,
    /// Host units per engine unit.
    pub scale_factor: f32,
}

/// Reads one host object into a canonical part.
///
/// `transform` is the object's world transform. Extractors over world-space source
/// data bake it out with its inverse; the others produce object-space geometry and
/// leave placement to the object node transform.
pub trait GeometryExtractor {
    fn extract(
        &self,
        transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError>;
}

/// Extractor for `data`, or `None` for structural kinds (actors, blueprints and
/// asset references) which the translator expands itself.
pub fn extractor_for(data: &SceneObjectData) -> Option<&dyn GeometryExtractor> {
    match data {
        SceneObjectData::StaticMesh(mesh) => Some(mesh),
        SceneObjectData::SkeletalMesh(mesh) => Some(mesh),
        SceneObjectData::Spline(spline) => Some(spline),
        SceneObjectData::Landscape(landscape) => Some(landscape),
        SceneObjectData::Brush(brush) => Some(brush),
        SceneObjectData::Camera(camera) => Some(camera),
        SceneObjectData::DataTable(table) => Some(table),
        SceneObjectData::GeometryCollection(collection) => Some(collection),
        SceneObjectData::InstancedMesh(instances) => Some(instances),
        SceneObjectData::Actor(_)
        | SceneObjectData::Blueprint(_)
        | SceneObjectData::AssetReference(_) => None,
    }
}
