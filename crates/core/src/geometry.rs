use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeError, AttributeOwner, AttributeSet, AttributeStorage};
use crate::material::MaterialBinding;

/// Per-face vertex counts plus a flat vertex list indexing points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceTopology {
    pub face_counts: Vec<u32>,
    pub vertex_list: Vec<u32>,
}

impl FaceTopology {
    pub fn new(face_counts: Vec<u32>, vertex_list: Vec<u32>) -> Self {
        Self {
            face_counts,
            vertex_list,
        }
    }

    pub fn triangles(indices: Vec<u32>) -> Self {
        Self {
            face_counts: vec![3; indices.len() / 3],
            vertex_list: indices,
        }
    }

    /// One open or closed polyline through `count` points.
    pub fn polyline(count: usize) -> Self {
        if count == 0 {
            return Self::default();
        }
        Self {
            face_counts: vec![count as u32],
            vertex_list: (0..count as u32).collect(),
        }
    }

    /// Quads over a `width * height` grid of points in row-major order.
    pub fn grid(width: usize, height: usize) -> Self {
        let mut topology = Self::default();
        if width < 2 || height < 2 {
            return topology;
        }
        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let i0 = (y * width + x) as u32;
                let i1 = i0 + 1;
                let i2 = i1 + width as u32;
                let i3 = i0 + width as u32;
                topology.face_counts.push(4);
                topology.vertex_list.extend_from_slice(&[i0, i3, i2, i1]);
            }
        }
        topology
    }

    pub fn face_count(&self) -> usize {
        self.face_counts.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_list.len()
    }

    /// Checks `sum(face_counts) == len(vertex_list)` and every index `< point_count`.
    pub fn validate(&self, point_count: usize) -> Result<(), AttributeError> {
        let total: u64 = self.face_counts.iter().map(|c| u64::from(*c)).sum();
        if total != self.vertex_list.len() as u64 {
            return Err(AttributeError::InvalidTopology(format!(
                "face counts sum to {total} but vertex list has {} entries",
                self.vertex_list.len()
            )));
        }
        if let Some(bad) = self
            .vertex_list
            .iter()
            .find(|index| **index as usize >= point_count)
        {
            return Err(AttributeError::InvalidTopology(format!(
                "vertex index {bad} out of range for {point_count} points"
            )));
        }
        Ok(())
    }

    /// Appends `other`, offsetting its indices by `point_offset`.
    pub fn append(&mut self, other: &FaceTopology, point_offset: u32) {
        self.face_counts.extend_from_slice(&other.face_counts);
        self.vertex_list
            .extend(other.vertex_list.iter().map(|index| index + point_offset));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartKind {
    #[default]
    Mesh,
    Curve,
    Points,
}

/// One geometry part in engine convention, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartGeometry {
    pub kind: PartKind,
    pub positions: Vec<[f32; 3]>,
    pub topology: FaceTopology,
    pub attributes: AttributeSet,
    pub materials: Option<MaterialBinding>,
}

impl PartGeometry {
    pub fn new(kind: PartKind, positions: Vec<[f32; 3]>, topology: FaceTopology) -> Self {
        Self {
            kind,
            positions,
            topology,
            attributes: AttributeSet::default(),
            materials: None,
        }
    }

    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    pub fn owner_len(&self, owner: AttributeOwner) -> usize {
        match owner {
            AttributeOwner::Point => self.positions.len(),
            AttributeOwner::Vertex => self.topology.vertex_count(),
            AttributeOwner::Primitive => self.topology.face_count(),
            AttributeOwner::Detail => 1,
        }
    }

    pub fn set_attribute(
        &mut self,
        owner: AttributeOwner,
        name: impl Into<String>,
        storage: AttributeStorage,
    ) {
        self.attributes.insert(owner, name, storage);
    }

    pub fn validate(&self) -> Result<(), AttributeError> {
        self.topology.validate(self.positions.len())?;
        for (owner, name, storage) in self.attributes.iter() {
            let expected = self.owner_len(owner);
            if storage.len() != expected {
                return Err(AttributeError::InvalidLength {
                    name: name.to_string(),
                    owner,
                    expected,
                    actual: storage.len(),
                });
            }
        }
        if let Some(binding) = &self.materials {
            let expected = self.topology.face_count();
            if binding.face_indices.len() != expected {
                return Err(AttributeError::InvalidLength {
                    name: crate::material::MATERIAL_ATTRIBUTE.to_string(),
                    owner: AttributeOwner::Primitive,
                    expected,
                    actual: binding.face_indices.len(),
                });
            }
        }
        Ok(())
    }

    /// Concatenates `parts` into one part of the first part's kind. Point, vertex
    /// and primitive attributes survive only when every part carries them with the
    /// same storage; detail attributes only when they are equal everywhere.
    ///
    /// Each part is validated on its own first, since index offsets would hide an
    /// out-of-range index in any part but the last.
    pub fn merge(parts: &[PartGeometry]) -> Result<PartGeometry, AttributeError> {
        let Some(first) = parts.first() else {
            return Ok(PartGeometry::default());
        };
        for part in parts {
            part.validate()?;
        }
        let mut merged = PartGeometry {
            kind: first.kind,
            ..Default::default()
        };
        for part in parts {
            let offset = merged.positions.len() as u32;
            merged.positions.extend_from_slice(&part.positions);
            merged.topology.append(&part.topology, offset);
        }

        for owner in AttributeOwner::ALL {
            for (name, storage) in first.attributes.map(owner) {
                let others = &parts[1..];
                if owner == AttributeOwner::Detail {
                    if others
                        .iter()
                        .all(|part| part.attributes.get(owner, name) == Some(storage))
                    {
                        merged.set_attribute(owner, name.clone(), storage.clone());
                    }
                    continue;
                }
                let mut combined = storage.empty_like();
                let compatible = parts.iter().all(|part| {
                    part.attributes
                        .get(owner, name)
                        .is_some_and(|values| combined.extend_from(values))
                });
                if compatible {
                    merged.set_attribute(owner, name.clone(), combined);
                }
            }
        }

        if parts.iter().any(|part| part.materials.is_some()) {
            let faces = parts.iter().flat_map(|part| {
                (0..part.topology.face_count()).map(move |face| {
                    part.materials
                        .as_ref()
                        .and_then(|binding| binding.material_for_face(face))
                })
            });
            merged.materials = Some(MaterialBinding::from_faces(faces));
        }
        Ok(merged)
    }
}

/// Outcome of reading one host object.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Geometry(Box<PartGeometry>),
    /// No points; any previously uploaded node for the object must go away.
    Empty,
}

impl Extraction {
    pub fn from_part(part: PartGeometry) -> Self {
        if part.positions.is_empty() {
            Extraction::Empty
        } else {
            Extraction::Geometry(Box::new(part))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Extraction::Empty)
    }
}
