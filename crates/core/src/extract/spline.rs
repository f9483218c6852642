use conduit_scene::{HostTransform, SplineData};
use glam::Quat;

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::convert::{host_to_engine_position, host_to_engine_vector};
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};

pub const CURVE_CLOSED_ATTRIBUTE: &str = "curve_closed";

fn engine_rotation(rotation: [f32; 4]) -> [f32; 4] {
    let q = Quat::from_array(rotation).normalize();
    [q.x, q.z, q.y, -q.w]
}

impl GeometryExtractor for SplineData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let positions: Vec<[f32; 3]> = self
            .points
            .iter()
            .map(|p| host_to_engine_position(*p, ctx.scale_factor))
            .collect();
        let topology = FaceTopology::polyline(positions.len());
        let mut part = PartGeometry::new(PartKind::Curve, positions, topology);

        if let Some(rotations) = &self.rotations {
            part.set_attribute(
                AttributeOwner::Point,
                "rot",
                AttributeStorage::Vec4(rotations.iter().map(|r| engine_rotation(*r)).collect()),
            );
        }
        if let Some(scales) = &self.scales {
            part.set_attribute(
                AttributeOwner::Point,
                "scale",
                AttributeStorage::Vec3(scales.iter().map(|s| host_to_engine_vector(*s)).collect()),
            );
        }
        part.set_attribute(
            AttributeOwner::Detail,
            CURVE_CLOSED_ATTRIBUTE,
            AttributeStorage::Int(vec![i32::from(self.closed)]),
        );
        Ok(Extraction::from_part(part))
    }
}
