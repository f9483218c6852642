use conduit_scene::{HostTransform, InstancedMeshData};

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::compose::INSTANCE_ATTRIBUTE;
use crate::convert::EngineTransform;
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};

impl GeometryExtractor for InstancedMeshData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let engine: Vec<EngineTransform> = self
            .instances
            .iter()
            .map(|instance| EngineTransform::from_host(instance, ctx.scale_factor))
            .collect();
        let positions = engine.iter().map(|t| t.position).collect();
        let mut part = PartGeometry::new(PartKind::Points, positions, FaceTopology::default());
        if engine.is_empty() {
            return Ok(Extraction::from_part(part));
        }
        part.set_attribute(
            AttributeOwner::Point,
            "rot",
            AttributeStorage::Vec4(engine.iter().map(|t| t.rotation).collect()),
        );
        part.set_attribute(
            AttributeOwner::Point,
            "scale",
            AttributeStorage::Vec3(engine.iter().map(|t| t.scale).collect()),
        );
        part.set_attribute(
            AttributeOwner::Point,
            INSTANCE_ATTRIBUTE,
            AttributeStorage::String(vec![self.mesh.to_string(); engine.len()]),
        );
        Ok(Extraction::from_part(part))
    }
}
