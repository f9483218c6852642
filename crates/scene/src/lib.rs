use std::collections::BTreeMap;
use std::fmt;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Path of a host object, e.g. `/Game/Props/Rock.Rock` or `/Level/Actor.Component`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(pub String);

impl ObjectRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path component with any `.Suffix` removed.
    pub fn name(&self) -> &str {
        let leaf = self.0.rsplit('/').next().unwrap_or(&self.0);
        leaf.split('.').next().unwrap_or(leaf)
    }

    /// Directory part of the path, without the trailing slash.
    pub fn parent_path(&self) -> Option<&str> {
        let trimmed = self.0.trim_end_matches('/');
        let idx = trimmed.rfind('/')?;
        if idx == 0 {
            return None;
        }
        Some(&trimmed[..idx])
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostTransform {
    pub translation: [f32; 3],
    /// Quaternion in `x, y, z, w` order.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for HostTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl HostTransform {
    pub const IDENTITY: HostTransform = HostTransform {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_array(self.rotation).normalize()
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            self.quat(),
            Vec3::from(self.translation),
        )
    }

    pub fn inverse_mat4(&self) -> Mat4 {
        self.to_mat4().inverse()
    }

    pub fn determinant(&self) -> f32 {
        self.to_mat4().determinant()
    }

    /// `self` applied after `local`, i.e. `self * local`.
    pub fn compose(&self, local: &HostTransform) -> HostTransform {
        let (scale, rotation, translation) =
            (self.to_mat4() * local.to_mat4()).to_scale_rotation_translation();
        HostTransform {
            translation: translation.to_array(),
            rotation: rotation.to_array(),
            scale: scale.to_array(),
        }
    }

    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 3] {
        self.to_mat4().transform_point3(Vec3::from(point)).to_array()
    }

    pub fn approx_eq(&self, other: &HostTransform, tolerance: f32) -> bool {
        let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance);
        let same_rotation = {
            let a = self.quat();
            let b = other.quat();
            // q and -q describe the same rotation
            a.dot(b).abs() >= 1.0 - tolerance
        };
        close(&self.translation, &other.translation)
            && close(&self.scale, &other.scale)
            && same_rotation
    }

    pub fn is_identity(&self) -> bool {
        self.approx_eq(&HostTransform::IDENTITY, 1.0e-6)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMaterial {
    pub path: String,
    #[serde(default)]
    pub scalar_params: BTreeMap<String, f32>,
    #[serde(default)]
    pub vector_params: BTreeMap<String, [f32; 4]>,
    #[serde(default)]
    pub texture_params: BTreeMap<String, String>,
    #[serde(default)]
    pub bool_params: BTreeMap<String, bool>,
}

impl HostMaterial {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Polygon mesh in host convention. Per-corner data follows `indices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMesh {
    pub positions: Vec<[f32; 3]>,
    pub face_counts: Vec<u32>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub normals: Option<Vec<[f32; 3]>>,
    #[serde(default)]
    pub uv_sets: Vec<Vec<[f32; 2]>>,
    #[serde(default)]
    pub colors: Option<Vec<[f32; 4]>>,
    /// Material slot per face.
    #[serde(default)]
    pub face_materials: Vec<u32>,
    #[serde(default)]
    pub materials: Vec<Option<HostMaterial>>,
}

impl HostMesh {
    pub fn triangles(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let face_counts = vec![3; indices.len() / 3];
        Self {
            positions,
            face_counts,
            indices,
            ..Default::default()
        }
    }

    pub fn face_count(&self) -> usize {
        self.face_counts.len()
    }

    pub fn material_for_face(&self, face: usize) -> Option<&HostMaterial> {
        let slot = *self.face_materials.get(face)? as usize;
        self.materials.get(slot).and_then(|material| material.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticMeshData {
    pub lods: Vec<HostMesh>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneInfluence {
    pub bone: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletalMeshData {
    pub mesh: HostMesh,
    pub skeleton: String,
    pub bone_names: Vec<String>,
    /// Influences per point.
    #[serde(default)]
    pub influences: Vec<Vec<BoneInfluence>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplineData {
    /// Control points in object space.
    pub points: Vec<[f32; 3]>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub rotations: Option<Vec<[f32; 4]>>,
    #[serde(default)]
    pub scales: Option<Vec<[f32; 3]>>,
}

/// Height grid in object space, `size[0] * size[1]` samples in row-major order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandscapeData {
    pub size: [u32; 2],
    pub heights: Vec<f32>,
    pub spacing: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrushPolygon {
    /// Indices into `BrushData::points`.
    pub vertices: Vec<u32>,
    pub normal: [f32; 3],
    pub texture_u: [f32; 3],
    pub texture_v: [f32; 3],
    pub base_point: u32,
    #[serde(default)]
    pub material: Option<HostMaterial>,
}

/// Brush model with points already in world space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrushData {
    pub points: Vec<[f32; 3]>,
    pub polygons: Vec<BrushPolygon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    pub fov_degrees: f32,
    pub aspect_ratio: f32,
    pub orthographic: bool,
    pub ortho_width: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            fov_degrees: 90.0,
            aspect_ratio: 16.0 / 9.0,
            orthographic: false,
            ortho_width: 512.0,
            near_clip: 10.0,
            far_clip: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    String(String),
    Vector([f32; 3]),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub name: String,
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTableData {
    pub row_struct: String,
    pub columns: Vec<String>,
    pub rows: Vec<DataRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryPiece {
    pub mesh: HostMesh,
    #[serde(default)]
    pub transform: HostTransform,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryCollectionData {
    pub pieces: Vec<GeometryPiece>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancedMeshData {
    pub mesh: ObjectRef,
    /// Instance transforms relative to the owning object.
    pub instances: Vec<HostTransform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorData {
    pub components: Vec<SceneObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintData {
    pub components: Vec<SceneObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetReferenceData {
    pub target: ObjectRef,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default)]
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneObjectData {
    StaticMesh(StaticMeshData),
    SkeletalMesh(SkeletalMeshData),
    Spline(SplineData),
    Landscape(LandscapeData),
    Actor(ActorData),
    Blueprint(BlueprintData),
    Brush(BrushData),
    Camera(CameraData),
    DataTable(DataTableData),
    GeometryCollection(GeometryCollectionData),
    InstancedMesh(InstancedMeshData),
    AssetReference(AssetReferenceData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneObjectKind {
    StaticMesh,
    SkeletalMesh,
    Spline,
    Landscape,
    Actor,
    Blueprint,
    Brush,
    Camera,
    DataTable,
    GeometryCollection,
    InstancedMesh,
    AssetReference,
}

impl SceneObjectData {
    pub fn kind(&self) -> SceneObjectKind {
        match self {
            SceneObjectData::StaticMesh(_) => SceneObjectKind::StaticMesh,
            SceneObjectData::SkeletalMesh(_) => SceneObjectKind::SkeletalMesh,
            SceneObjectData::Spline(_) => SceneObjectKind::Spline,
            SceneObjectData::Landscape(_) => SceneObjectKind::Landscape,
            SceneObjectData::Actor(_) => SceneObjectKind::Actor,
            SceneObjectData::Blueprint(_) => SceneObjectKind::Blueprint,
            SceneObjectData::Brush(_) => SceneObjectKind::Brush,
            SceneObjectData::Camera(_) => SceneObjectKind::Camera,
            SceneObjectData::DataTable(_) => SceneObjectKind::DataTable,
            SceneObjectData::GeometryCollection(_) => SceneObjectKind::GeometryCollection,
            SceneObjectData::InstancedMesh(_) => SceneObjectKind::InstancedMesh,
            SceneObjectData::AssetReference(_) => SceneObjectKind::AssetReference,
        }
    }

    pub fn components(&self) -> &[SceneObject] {
        match self {
            SceneObjectData::Actor(actor) => &actor.components,
            SceneObjectData::Blueprint(blueprint) => &blueprint.components,
            _ => &[],
        }
    }
}

impl fmt::Display for SceneObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub reference: ObjectRef,
    /// World transform for top-level objects, relative to the owning actor for
    /// components.
    #[serde(default)]
    pub transform: HostTransform,
    /// Bumped by the host whenever the object's geometry or settings change.
    #[serde(default)]
    pub content_version: u64,
    pub data: SceneObjectData,
}

impl SceneObject {
    pub fn new(reference: impl Into<ObjectRef>, data: SceneObjectData) -> Self {
        Self {
            reference: reference.into(),
            transform: HostTransform::IDENTITY,
            content_version: 0,
            data,
        }
    }

    pub fn with_transform(mut self, transform: HostTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn kind(&self) -> SceneObjectKind {
        self.data.kind()
    }
}

/// Read-only view of host objects the translator pulls from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostScene {
    objects: BTreeMap<ObjectRef, SceneObject>,
}

impl HostScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: SceneObject) {
        self.objects.insert(object.reference.clone(), object);
    }

    pub fn remove(&mut self, reference: &ObjectRef) -> Option<SceneObject> {
        self.objects.remove(reference)
    }

    pub fn get(&self, reference: &ObjectRef) -> Option<&SceneObject> {
        self.objects.get(reference)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn set_transform(&mut self, reference: &ObjectRef, transform: HostTransform) -> bool {
        match self.objects.get_mut(reference) {
            Some(object) => {
                object.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Replaces the object's data and bumps its content version.
    pub fn replace_data(&mut self, reference: &ObjectRef, data: SceneObjectData) -> bool {
        match self.objects.get_mut(reference) {
            Some(object) => {
                object.data = data;
                object.content_version = object.content_version.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    pub fn touch(&mut self, reference: &ObjectRef) -> bool {
        match self.objects.get_mut(reference) {
            Some(object) => {
                object.content_version = object.content_version.wrapping_add(1);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ref_splits_name_and_parent() {
        let reference = ObjectRef::new("/Game/Props/Rock.Rock");
        assert_eq!(reference.name(), "Rock");
        assert_eq!(reference.parent_path(), Some("/Game/Props"));
        assert_eq!(ObjectRef::new("/Rock").parent_path(), None);
    }

    #[test]
    fn reference_payloads_default_to_empty_target() {
        let instanced = InstancedMeshData::default();
        assert_eq!(instanced.mesh, ObjectRef::default());
        assert!(instanced.instances.is_empty());
        let reference = AssetReferenceData::default();
        assert_eq!(reference.target.as_str(), "");
        assert_eq!(reference.bounds, None);
    }

    #[test]
    fn compose_matches_matrix_product() {
        let parent = HostTransform::from_translation([10.0, 0.0, 0.0]);
        let child = HostTransform {
            translation: [0.0, 5.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [2.0, 2.0, 2.0],
        };
        let composed = parent.compose(&child);
        let p = composed.transform_point([1.0, 0.0, 0.0]);
        assert!((p[0] - 12.0).abs() < 1.0e-4);
        assert!((p[1] - 5.0).abs() < 1.0e-4);
    }

    #[test]
    fn set_transform_keeps_content_version() {
        let mut scene = HostScene::new();
        scene.insert(SceneObject::new(
            "/Game/Cam",
            SceneObjectData::Camera(CameraData::default()),
        ));
        let reference = ObjectRef::new("/Game/Cam");
        scene.set_transform(&reference, HostTransform::from_translation([1.0, 2.0, 3.0]));
        assert_eq!(scene.get(&reference).unwrap().content_version, 0);
        scene.touch(&reference);
        assert_eq!(scene.get(&reference).unwrap().content_version, 1);
    }
}
