use conduit_scene::{CameraData, HostTransform};

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};

impl GeometryExtractor for CameraData {
    /// One point at the object origin; placement comes from the object transform.
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let mut part = PartGeometry::new(PartKind::Points, vec![[0.0; 3]], FaceTopology::default());
        let detail = |value: f32| AttributeStorage::Float(vec![value]);
        part.set_attribute(AttributeOwner::Detail, "fov", detail(self.fov_degrees));
        part.set_attribute(AttributeOwner::Detail, "aspect", detail(self.aspect_ratio));
        part.set_attribute(
            AttributeOwner::Detail,
            "ortho",
            AttributeStorage::Int(vec![i32::from(self.orthographic)]),
        );
        part.set_attribute(
            AttributeOwner::Detail,
            "ortho_width",
            detail(self.ortho_width / ctx.scale_factor),
        );
        part.set_attribute(
            AttributeOwner::Detail,
            "near_clip",
            detail(self.near_clip / ctx.scale_factor),
        );
        part.set_attribute(
            AttributeOwner::Detail,
            "far_clip",
            detail(self.far_clip / ctx.scale_factor),
        );
        Ok(Extraction::from_part(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InputOptions;

    #[test]
    fn camera_clip_planes_use_engine_units() {
        let options = InputOptions::default();
        let ctx = ExtractContext {
            options: &options,
            scale_factor: 100.0,
        };
        let Extraction::Geometry(part) = CameraData::default()
            .extract(&HostTransform::IDENTITY, &ctx)
            .unwrap()
        else {
            panic!("expected geometry");
        };
        assert_eq!(part.point_count(), 1);
        assert_eq!(
            part.attributes.get(AttributeOwner::Detail, "near_clip"),
            Some(&AttributeStorage::Float(vec![0.1]))
        );
        assert!(part.validate().is_ok());
    }
}
