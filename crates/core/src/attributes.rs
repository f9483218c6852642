use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeOwner {
    Point,
    Vertex,
    Primitive,
    Detail,
}

impl AttributeOwner {
    /// Upload order used by the marshaller.
    pub const ALL: [AttributeOwner; 4] = [
        AttributeOwner::Point,
        AttributeOwner::Vertex,
        AttributeOwner::Primitive,
        AttributeOwner::Detail,
    ];
}

/// Storage kinds understood by the remote engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Float,
    Int,
    Int8,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeStorage {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Bool(Vec<bool>),
    String(Vec<String>),
    Vec2(Vec<[f32; 2]>),
    Vec3(Vec<[f32; 3]>),
    Vec4(Vec<[f32; 4]>),
}

impl AttributeStorage {
    /// Element count (tuples, not scalars).
    pub fn len(&self) -> usize {
        match self {
            AttributeStorage::Float(values) => values.len(),
            AttributeStorage::Int(values) => values.len(),
            AttributeStorage::Bool(values) => values.len(),
            AttributeStorage::String(values) => values.len(),
            AttributeStorage::Vec2(values) => values.len(),
            AttributeStorage::Vec3(values) => values.len(),
            AttributeStorage::Vec4(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tuple_size(&self) -> usize {
        match self {
            AttributeStorage::Float(_)
            | AttributeStorage::Int(_)
            | AttributeStorage::Bool(_)
            | AttributeStorage::String(_) => 1,
            AttributeStorage::Vec2(_) => 2,
            AttributeStorage::Vec3(_) => 3,
            AttributeStorage::Vec4(_) => 4,
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            AttributeStorage::Float(_)
            | AttributeStorage::Vec2(_)
            | AttributeStorage::Vec3(_)
            | AttributeStorage::Vec4(_) => StorageKind::Float,
            AttributeStorage::Int(_) => StorageKind::Int,
            AttributeStorage::Bool(_) => StorageKind::Int8,
            AttributeStorage::String(_) => StorageKind::String,
        }
    }

    /// Same variant, no elements.
    pub fn empty_like(&self) -> Self {
        match self {
            AttributeStorage::Float(_) => AttributeStorage::Float(Vec::new()),
            AttributeStorage::Int(_) => AttributeStorage::Int(Vec::new()),
            AttributeStorage::Bool(_) => AttributeStorage::Bool(Vec::new()),
            AttributeStorage::String(_) => AttributeStorage::String(Vec::new()),
            AttributeStorage::Vec2(_) => AttributeStorage::Vec2(Vec::new()),
            AttributeStorage::Vec3(_) => AttributeStorage::Vec3(Vec::new()),
            AttributeStorage::Vec4(_) => AttributeStorage::Vec4(Vec::new()),
        }
    }

    /// Appends `other` when both have the same variant; returns false otherwise.
    pub fn extend_from(&mut self, other: &AttributeStorage) -> bool {
        match (self, other) {
            (AttributeStorage::Float(out), AttributeStorage::Float(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::Int(out), AttributeStorage::Int(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::Bool(out), AttributeStorage::Bool(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::String(out), AttributeStorage::String(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::Vec2(out), AttributeStorage::Vec2(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::Vec3(out), AttributeStorage::Vec3(values)) => {
                out.extend_from_slice(values)
            }
            (AttributeStorage::Vec4(out), AttributeStorage::Vec4(values)) => {
                out.extend_from_slice(values)
            }
            _ => return false,
        }
        true
    }

    /// Flat buffer as the transport expects it.
    pub fn as_data(&self) -> AttributeData<'_> {
        match self {
            AttributeStorage::Float(values) => AttributeData::Float(values.clone()),
            AttributeStorage::Vec2(values) => AttributeData::Float(values.concat()),
            AttributeStorage::Vec3(values) => AttributeData::Float(values.concat()),
            AttributeStorage::Vec4(values) => AttributeData::Float(values.concat()),
            AttributeStorage::Int(values) => AttributeData::Int(values.as_slice()),
            AttributeStorage::Bool(values) => {
                AttributeData::Int8(values.iter().map(|v| i8::from(*v)).collect())
            }
            AttributeStorage::String(values) => AttributeData::String(values.as_slice()),
        }
    }
}

/// Flat attribute buffer handed to the transport. Float tuples are flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData<'a> {
    Float(Vec<f32>),
    Int(&'a [i32]),
    Int8(Vec<i8>),
    String(&'a [String]),
}

impl AttributeData<'_> {
    /// Scalar count, `count * tuple_size` for a well formed buffer.
    pub fn scalar_len(&self) -> usize {
        match self {
            AttributeData::Float(values) => values.len(),
            AttributeData::Int(values) => values.len(),
            AttributeData::Int8(values) => values.len(),
            AttributeData::String(values) => values.len(),
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self {
            AttributeData::Float(_) => StorageKind::Float,
            AttributeData::Int(_) => StorageKind::Int,
            AttributeData::Int8(_) => StorageKind::Int8,
            AttributeData::String(_) => StorageKind::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    InvalidLength {
        name: String,
        owner: AttributeOwner,
        expected: usize,
        actual: usize,
    },
    InvalidTopology(String),
}

/// Declaration of one attribute on a geometry part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub owner: AttributeOwner,
    pub storage: StorageKind,
    pub tuple_size: usize,
    pub count: usize,
}

impl AttributeInfo {
    pub fn for_storage(owner: AttributeOwner, storage: &AttributeStorage, count: usize) -> Self {
        Self {
            owner,
            storage: storage.storage_kind(),
            tuple_size: storage.tuple_size(),
            count,
        }
    }

    pub fn expected_scalars(&self) -> usize {
        self.count * self.tuple_size
    }
}

/// Named attribute arrays grouped by owner. Iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    point: BTreeMap<String, AttributeStorage>,
    vertex: BTreeMap<String, AttributeStorage>,
    primitive: BTreeMap<String, AttributeStorage>,
    detail: BTreeMap<String, AttributeStorage>,
}

impl AttributeSet {
    pub fn map(&self, owner: AttributeOwner) -> &BTreeMap<String, AttributeStorage> {
        match owner {
            AttributeOwner::Point => &self.point,
            AttributeOwner::Vertex => &self.vertex,
            AttributeOwner::Primitive => &self.primitive,
            AttributeOwner::Detail => &self.detail,
        }
    }

    pub fn map_mut(&mut self, owner: AttributeOwner) -> &mut BTreeMap<String, AttributeStorage> {
        match owner {
            AttributeOwner::Point => &mut self.point,
            AttributeOwner::Vertex => &mut self.vertex,
            AttributeOwner::Primitive => &mut self.primitive,
            AttributeOwner::Detail => &mut self.detail,
        }
    }

    pub fn insert(
        &mut self,
        owner: AttributeOwner,
        name: impl Into<String>,
        storage: AttributeStorage,
    ) -> Option<AttributeStorage> {
        self.map_mut(owner).insert(name.into(), storage)
    }

    pub fn get(&self, owner: AttributeOwner, name: &str) -> Option<&AttributeStorage> {
        self.map(owner).get(name)
    }

    pub fn remove(&mut self, owner: AttributeOwner, name: &str) -> Option<AttributeStorage> {
        self.map_mut(owner).remove(name)
    }

    pub fn len(&self) -> usize {
        AttributeOwner::ALL
            .iter()
            .map(|owner| self.map(*owner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeOwner, &str, &AttributeStorage)> {
        AttributeOwner::ALL.into_iter().flat_map(move |owner| {
            self.map(owner)
                .iter()
                .map(move |(name, storage)| (owner, name.as_str(), storage))
        })
    }
}
