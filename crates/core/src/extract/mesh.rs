use conduit_scene::{
    GeometryCollectionData, HostMesh, HostTransform, SkeletalMeshData, StaticMeshData,
};
use glam::{Mat4, Vec3};

use super::{ExtractContext, GeometryExtractor};
use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::convert::{host_to_engine_position, host_to_engine_uv, NormalTransform};
use crate::error::BridgeError;
use crate::geometry::{Extraction, FaceTopology, PartGeometry, PartKind};
use crate::material::MaterialBinding;
use crate::parallel;

pub const LOD_ATTRIBUTE: &str = "lod";
pub const PIECE_ATTRIBUTE: &str = "piece";
pub const BONE_INDEX_ATTRIBUTE: &str = "bone_index";
pub const BONE_WEIGHT_ATTRIBUTE: &str = "bone_weight";
pub const SKELETON_ATTRIBUTE: &str = "unreal_skeleton";

fn uv_attribute_name(set: usize) -> String {
    if set == 0 {
        "uv".to_string()
    } else {
        format!("uv{}", set + 1)
    }
}

/// Converts `mesh` to engine convention, optionally baking `bake` into points and
/// normals first. Per-corner arrays are passed through; their lengths are checked
/// when the part is validated.
pub(crate) fn mesh_part(mesh: &HostMesh, bake: Option<Mat4>, scale_factor: f32) -> PartGeometry {
    let positions = parallel::map_slice(&mesh.positions, |p| {
        let p = match bake {
            Some(matrix) => matrix.transform_point3(Vec3::from(*p)).to_array(),
            None => *p,
        };
        host_to_engine_position(p, scale_factor)
    });
    let topology = FaceTopology::new(mesh.face_counts.clone(), mesh.indices.clone());
    let mut part = PartGeometry::new(PartKind::Mesh, positions, topology);

    if let Some(normals) = &mesh.normals {
        let transform = bake.map(NormalTransform::new).unwrap_or_else(NormalTransform::identity);
        part.set_attribute(
            AttributeOwner::Vertex,
            "N",
            AttributeStorage::Vec3(parallel::map_slice(normals, |n| transform.apply(*n))),
        );
    }
    for (set, uvs) in mesh.uv_sets.iter().enumerate() {
        part.set_attribute(
            AttributeOwner::Vertex,
            uv_attribute_name(set),
            AttributeStorage::Vec3(uvs.iter().map(|uv| host_to_engine_uv(*uv)).collect()),
        );
    }
    if let Some(colors) = &mesh.colors {
        part.set_attribute(
            AttributeOwner::Vertex,
            "Cd",
            AttributeStorage::Vec3(colors.iter().map(|c| [c[0], c[1], c[2]]).collect()),
        );
        part.set_attribute(
            AttributeOwner::Vertex,
            "Alpha",
            AttributeStorage::Float(colors.iter().map(|c| c[3]).collect()),
        );
    }
    if !mesh.materials.is_empty() {
        part.materials = Some(MaterialBinding::from_faces(
            (0..mesh.face_count()).map(|face| mesh.material_for_face(face)),
        ));
    }
    part
}

impl GeometryExtractor for StaticMeshData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        if self.lods.is_empty() {
            return Ok(Extraction::Empty);
        }
        if ctx.options.export_lods {
            let parts: Vec<PartGeometry> = self
                .lods
                .iter()
                .enumerate()
                .map(|(lod, mesh)| {
                    let mut part = mesh_part(mesh, None, ctx.scale_factor);
                    let faces = part.topology.face_count();
                    part.set_attribute(
                        AttributeOwner::Primitive,
                        LOD_ATTRIBUTE,
                        AttributeStorage::Int(vec![lod as i32; faces]),
                    );
                    part
                })
                .collect();
            return Ok(Extraction::from_part(PartGeometry::merge(&parts)?));
        }

        let lod = (ctx.options.lod_index as usize).min(self.lods.len() - 1);
        let mut part = mesh_part(&self.lods[lod], None, ctx.scale_factor);
        part.set_attribute(
            AttributeOwner::Detail,
            LOD_ATTRIBUTE,
            AttributeStorage::Int(vec![lod as i32]),
        );
        Ok(Extraction::from_part(part))
    }
}

impl GeometryExtractor for SkeletalMeshData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let mut part = mesh_part(&self.mesh, None, ctx.scale_factor);
        if !self.influences.is_empty() {
            let dominant: Vec<(i32, f32)> = self
                .influences
                .iter()
                .map(|influences| {
                    influences
                        .iter()
                        .max_by(|a, b| a.weight.total_cmp(&b.weight))
                        .map(|best| (best.bone as i32, best.weight))
                        .unwrap_or((-1, 0.0))
                })
                .collect();
            part.set_attribute(
                AttributeOwner::Point,
                BONE_INDEX_ATTRIBUTE,
                AttributeStorage::Int(dominant.iter().map(|(bone, _)| *bone).collect()),
            );
            part.set_attribute(
                AttributeOwner::Point,
                BONE_WEIGHT_ATTRIBUTE,
                AttributeStorage::Float(dominant.iter().map(|(_, weight)| *weight).collect()),
            );
        }
        if !self.skeleton.is_empty() {
            part.set_attribute(
                AttributeOwner::Detail,
                SKELETON_ATTRIBUTE,
                AttributeStorage::String(vec![self.skeleton.clone()]),
            );
        }
        Ok(Extraction::from_part(part))
    }
}

impl GeometryExtractor for GeometryCollectionData {
    fn extract(
        &self,
        _transform: &HostTransform,
        ctx: &ExtractContext<'_>,
    ) -> Result<Extraction, BridgeError> {
        let parts: Vec<PartGeometry> = self
            .pieces
            .iter()
            .enumerate()
            .map(|(index, piece)| {
                let bake = (!piece.transform.is_identity()).then(|| piece.transform.to_mat4());
                let mut part = mesh_part(&piece.mesh, bake, ctx.scale_factor);
                let faces = part.topology.face_count();
                part.set_attribute(
                    AttributeOwner::Primitive,
                    PIECE_ATTRIBUTE,
                    AttributeStorage::Int(vec![index as i32; faces]),
                );
                part
            })
            .collect();
        Ok(Extraction::from_part(PartGeometry::merge(&parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InputOptions;
    use conduit_scene::{BoneInfluence, GeometryPiece, HostMaterial};

    fn ctx(options: &InputOptions) -> ExtractContext<'_> {
        ExtractContext {
            options,
            scale_factor: 100.0,
        }
    }

    fn quad(offset: f32) -> HostMesh {
        HostMesh {
            positions: vec![
                [offset, 0.0, 0.0],
                [offset + 100.0, 0.0, 0.0],
                [offset + 100.0, 100.0, 0.0],
                [offset, 100.0, 0.0],
            ],
            face_counts: vec![4],
            indices: vec![0, 1, 2, 3],
            ..Default::default()
        }
    }

    fn geometry(extraction: Extraction) -> PartGeometry {
        match extraction {
            Extraction::Geometry(part) => *part,
            Extraction::Empty => panic!("expected geometry"),
        }
    }

    #[test]
    fn static_mesh_points_are_remapped() {
        let mut mesh = HostMesh::triangles(
            vec![[100.0, 200.0, 300.0], [0.0; 3], [100.0, 0.0, 0.0]],
            vec![0, 1, 2],
        );
        mesh.normals = Some(vec![[0.0, 0.0, 1.0]; 3]);
        mesh.uv_sets = vec![vec![[0.25, 0.25]; 3], vec![[0.0, 1.0]; 3]];
        let data = StaticMeshData { lods: vec![mesh] };
        let options = InputOptions::default();
        let part = geometry(data.extract(&HostTransform::IDENTITY, &ctx(&options)).unwrap());

        let p = part.positions[0];
        assert!((p[0] - 1.0).abs() < 1.0e-4);
        assert!((p[1] - 3.0).abs() < 1.0e-4);
        assert!((p[2] - 2.0).abs() < 1.0e-4);
        assert_eq!(
            part.attributes.get(AttributeOwner::Vertex, "N"),
            Some(&AttributeStorage::Vec3(vec![[0.0, 1.0, 0.0]; 3]))
        );
        assert_eq!(
            part.attributes.get(AttributeOwner::Vertex, "uv"),
            Some(&AttributeStorage::Vec3(vec![[0.25, 0.75, 0.0]; 3]))
        );
        assert!(part.attributes.get(AttributeOwner::Vertex, "uv2").is_some());
        assert!(part.validate().is_ok());
    }

    #[test]
    fn empty_static_mesh_is_empty() {
        let options = InputOptions::default();
        let data = StaticMeshData {
            lods: vec![HostMesh::default()],
        };
        let extraction = data
            .extract(&HostTransform::IDENTITY, &ctx(&options))
            .unwrap();
        assert!(extraction.is_empty());
        let none = StaticMeshData::default();
        assert!(none
            .extract(&HostTransform::IDENTITY, &ctx(&options))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn lod_selection_clamps_and_export_merges() {
        let data = StaticMeshData {
            lods: vec![quad(0.0), quad(500.0)],
        };
        let options = InputOptions {
            lod_index: 7,
            ..Default::default()
        };
        let part = geometry(data.extract(&HostTransform::IDENTITY, &ctx(&options)).unwrap());
        assert_eq!(
            part.attributes.get(AttributeOwner::Detail, LOD_ATTRIBUTE),
            Some(&AttributeStorage::Int(vec![1]))
        );
        assert!((part.positions[0][0] - 5.0).abs() < 1.0e-4);

        let options = InputOptions {
            export_lods: true,
            ..Default::default()
        };
        let part = geometry(data.extract(&HostTransform::IDENTITY, &ctx(&options)).unwrap());
        assert_eq!(part.point_count(), 8);
        assert_eq!(
            part.attributes.get(AttributeOwner::Primitive, LOD_ATTRIBUTE),
            Some(&AttributeStorage::Int(vec![0, 1]))
        );
    }

    #[test]
    fn bad_lod_fails_even_when_exported_with_the_others() {
        let broken = HostMesh::triangles(
            vec![[0.0; 3], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]],
            vec![0, 1, 4],
        );
        let data = StaticMeshData {
            lods: vec![broken, quad(500.0)],
        };
        let options = InputOptions {
            export_lods: true,
            ..Default::default()
        };
        let result = data.extract(&HostTransform::IDENTITY, &ctx(&options));
        assert!(matches!(result, Err(BridgeError::InvalidTopology(_))));
    }

    #[test]
    fn mesh_materials_are_deduplicated_per_face() {
        let mut mesh = HostMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            face_counts: vec![3; 4],
            indices: vec![0, 1, 2, 0, 2, 1, 1, 2, 0, 2, 0, 1],
            ..Default::default()
        };
        mesh.materials = vec![
            Some(HostMaterial::new("/Game/A")),
            Some(HostMaterial::new("/Game/B")),
            Some(HostMaterial::new("/Game/C")),
        ];
        mesh.face_materials = vec![0, 1, 0, 2];
        let part = mesh_part(&mesh, None, 100.0);
        let binding = part.materials.unwrap();
        assert_eq!(binding.len(), 3);
        assert_eq!(binding.face_indices, vec![0, 1, 0, 2]);
    }

    #[test]
    fn skeletal_mesh_keeps_dominant_bone() {
        let data = SkeletalMeshData {
            mesh: HostMesh::triangles(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![0, 1, 2]),
            skeleton: "/Game/SK_Hero_Skeleton".to_string(),
            bone_names: vec!["root".to_string(), "spine".to_string()],
            influences: vec![
                vec![
                    BoneInfluence { bone: 0, weight: 0.25 },
                    BoneInfluence { bone: 1, weight: 0.75 },
                ],
                vec![BoneInfluence { bone: 0, weight: 1.0 }],
                Vec::new(),
            ],
        };
        let options = InputOptions::default();
        let part = geometry(data.extract(&HostTransform::IDENTITY, &ctx(&options)).unwrap());
        assert_eq!(
            part.attributes.get(AttributeOwner::Point, BONE_INDEX_ATTRIBUTE),
            Some(&AttributeStorage::Int(vec![1, 0, -1]))
        );
        assert!(part.validate().is_ok());
    }

    #[test]
    fn geometry_collection_bakes_piece_transforms() {
        let data = GeometryCollectionData {
            pieces: vec![
                GeometryPiece {
                    mesh: quad(0.0),
                    transform: HostTransform::IDENTITY,
                },
                GeometryPiece {
                    mesh: quad(0.0),
                    transform: HostTransform::from_translation([0.0, 0.0, 200.0]),
                },
            ],
        };
        let options = InputOptions::default();
        let part = geometry(data.extract(&HostTransform::IDENTITY, &ctx(&options)).unwrap());
        assert_eq!(part.point_count(), 8);
        // host Z becomes engine Y
        assert!((part.positions[4][1] - 2.0).abs() < 1.0e-4);
        assert_eq!(
            part.attributes.get(AttributeOwner::Primitive, PIECE_ATTRIBUTE),
            Some(&AttributeStorage::Int(vec![0, 1]))
        );
    }
}
