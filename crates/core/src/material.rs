use std::collections::{BTreeSet, HashMap};

use conduit_scene::HostMaterial;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeStorage;

pub const MATERIAL_ATTRIBUTE: &str = "unreal_material";
pub const MATERIAL_PARAMETER_PREFIX: &str = "unreal_material_parameter_";

/// Deduplicated materials in first-seen order plus a dense per-face index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialBinding {
    pub materials: Vec<Option<HostMaterial>>,
    pub face_indices: Vec<u32>,
}

impl MaterialBinding {
    /// Builds the binding from one material per face. Materials are keyed by path;
    /// faces without a material share one `None` entry.
    pub fn from_faces<'a, I>(faces: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a HostMaterial>>,
    {
        let mut binding = MaterialBinding::default();
        let mut lookup: HashMap<Option<&'a str>, u32> = HashMap::new();
        for material in faces {
            let key = material.map(|m| m.path.as_str());
            let next = binding.materials.len() as u32;
            let index = *lookup.entry(key).or_insert_with(|| {
                binding.materials.push(material.cloned());
                next
            });
            binding.face_indices.push(index);
        }
        binding
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn material_for_face(&self, face: usize) -> Option<&HostMaterial> {
        let index = *self.face_indices.get(face)? as usize;
        self.materials.get(index).and_then(|m| m.as_ref())
    }

    fn face_paths(&self, default_material: &str) -> Vec<String> {
        let paths: Vec<String> = self
            .materials
            .iter()
            .map(|m| match m {
                Some(material) => material.path.clone(),
                None => default_material.to_string(),
            })
            .collect();
        self.face_indices
            .iter()
            .map(|index| paths[*index as usize].clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaterialExport {
    /// Material path only.
    #[default]
    Minimal,
    /// Material path plus every scalar, vector, texture and bool parameter.
    Full,
}

impl MaterialExport {
    pub fn from_flag(export_parameters: bool) -> Self {
        if export_parameters {
            MaterialExport::Full
        } else {
            MaterialExport::Minimal
        }
    }
}

/// Per-face (primitive) attributes describing `binding`.
pub fn material_attributes(
    binding: &MaterialBinding,
    mode: MaterialExport,
    default_material: &str,
) -> Vec<(String, AttributeStorage)> {
    let mut attributes = vec![(
        MATERIAL_ATTRIBUTE.to_string(),
        AttributeStorage::String(binding.face_paths(default_material)),
    )];
    if mode == MaterialExport::Minimal {
        return attributes;
    }

    let mut scalar_names = BTreeSet::new();
    let mut vector_names = BTreeSet::new();
    let mut texture_names = BTreeSet::new();
    let mut bool_names = BTreeSet::new();
    for material in binding.materials.iter().flatten() {
        scalar_names.extend(material.scalar_params.keys().cloned());
        vector_names.extend(material.vector_params.keys().cloned());
        texture_names.extend(material.texture_params.keys().cloned());
        bool_names.extend(material.bool_params.keys().cloned());
    }

    let faces = binding.face_indices.len();
    let per_face = |face: usize| binding.material_for_face(face);

    for name in scalar_names {
        let values = (0..faces)
            .map(|face| {
                per_face(face)
                    .and_then(|m| m.scalar_params.get(&name).copied())
                    .unwrap_or(0.0)
            })
            .collect();
        attributes.push((parameter_name(&name), AttributeStorage::Float(values)));
    }
    for name in vector_names {
        let values = (0..faces)
            .map(|face| {
                per_face(face)
                    .and_then(|m| m.vector_params.get(&name).copied())
                    .unwrap_or([0.0; 4])
            })
            .collect();
        attributes.push((parameter_name(&name), AttributeStorage::Vec4(values)));
    }
    for name in texture_names {
        let values = (0..faces)
            .map(|face| {
                per_face(face)
                    .and_then(|m| m.texture_params.get(&name).cloned())
                    .unwrap_or_default()
            })
            .collect();
        attributes.push((parameter_name(&name), AttributeStorage::String(values)));
    }
    for name in bool_names {
        let values = (0..faces)
            .map(|face| {
                per_face(face)
                    .and_then(|m| m.bool_params.get(&name).copied())
                    .unwrap_or(false)
            })
            .collect();
        attributes.push((parameter_name(&name), AttributeStorage::Bool(values)));
    }
    attributes
}

fn parameter_name(name: &str) -> String {
    format!("{MATERIAL_PARAMETER_PREFIX}{name}")
}
