use conduit_scene::{HostTransform, LandscapeData};

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::convert::host_to_engine_position;
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};
use crate::parallel;

pub const HEIGHT_ATTRIBUTE: &str = "height";

impl GeometryExtractor for LandscapeData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let width = self.size[0] as usize;
        let height = self.size[1] as usize;
        if width < 2 || height < 2 {
            return Ok(Extraction::Empty);
        }
        let count = width * height;
        if self.heights.len() != count {
            return Err(BridgeError::AttributeLengthMismatch {
                name: HEIGHT_ATTRIBUTE.to_string(),
                owner: AttributeOwner::Point,
                expected: count,
                actual: self.heights.len(),
            });
        }

        let spacing = self.spacing;
        let heights = &self.heights;
        let scale = ctx.scale_factor;
        let positions = parallel::map_indexed(count, |idx| {
            let x = (idx % width) as f32 * spacing;
            let y = (idx / width) as f32 * spacing;
            host_to_engine_position([x, y, heights[idx]], scale)
        });
        let mut part = PartGeometry::new(PartKind::Mesh, positions, FaceTopology::grid(width, height));
        part.set_attribute(
            AttributeOwner::Point,
            HEIGHT_ATTRIBUTE,
            AttributeStorage::Float(parallel::map_slice(heights, |h| h / scale)),
        );
        Ok(Extraction::from_part(part))
    }
}
