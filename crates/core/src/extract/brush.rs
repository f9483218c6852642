use conduit_scene::{BrushData, HostTransform};
use glam::Vec3;

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::convert::{host_to_engine_position, NormalTransform};
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};
use crate::material::MaterialBinding;
use crate::parallel;

/// Host texels per UV unit on brush surfaces.
pub const BRUSH_TEXEL_SCALE: f32 = 100.0;

fn point(points: &[[f32; 3]], index: u32) -> Result<Vec3, BridgeError> {
    points
        .get(index as usize)
        .map(|p| Vec3::from(*p))
        .ok_or_else(|| {
            BridgeError::InvalidTopology(format!(
                "brush vertex {index} out of range for {} points",
                points.len()
            ))
        })
}

impl GeometryExtractor for BrushData {
    /// Brush points are world space; they are moved into the object's local space
    /// so the object node can carry the actor transform.
    fn extract(
        &self,
        transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        if self.points.is_empty() {
            return Ok(Extraction::Empty);
        }
        let inverse = transform.inverse_mat4();
        let normals = NormalTransform::new(inverse);
        let scale = ctx.scale_factor;
        let positions = parallel::map_slice(&self.points, |p| {
            let local = inverse.transform_point3(Vec3::from(*p));
            host_to_engine_position(local.to_array(), scale)
        });

        let mut topology = FaceTopology::default();
        let mut corner_normals = Vec::new();
        let mut corner_uvs = Vec::new();
        for polygon in &self.polygons {
            let base = point(&self.points, polygon.base_point)?;
            let normal = normals.apply(polygon.normal);
            let axis_u = Vec3::from(polygon.texture_u);
            let axis_v = Vec3::from(polygon.texture_v);
            topology.face_counts.push(polygon.vertices.len() as u32);
            for &vertex in &polygon.vertices {
                let delta = point(&self.points, vertex)? - base;
                topology.vertex_list.push(vertex);
                corner_normals.push(normal);
                corner_uvs.push([
                    delta.dot(axis_u) / BRUSH_TEXEL_SCALE,
                    -delta.dot(axis_v) / BRUSH_TEXEL_SCALE,
                    0.0,
                ]);
            }
        }

        let mut part = PartGeometry::new(PartKind::Mesh, positions, topology);
        part.set_attribute(
            AttributeOwner::Vertex,
            "N",
            AttributeStorage::Vec3(corner_normals),
        );
        part.set_attribute(AttributeOwner::Vertex, "uv", AttributeStorage::Vec3(corner_uvs));
        if !self.polygons.is_empty() {
            part.materials = Some(MaterialBinding::from_faces(
                self.polygons.iter().map(|polygon| polygon.material.as_ref()),
            ));
        }
        Ok(Extraction::from_part(part))
    }
}
