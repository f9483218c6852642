use std::collections::{BTreeSet, HashMap};

use conduit_scene::{HostTransform, ObjectRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BridgeError;
use crate::transport::{RemoteNodeId, Transport, TransportCall};

/// Options that change the geometry produced for an object. Two identifiers with
/// different options map to different remote nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub import_as_reference: bool,
    pub import_as_reference_rot_scale: bool,
    pub import_as_reference_bbox: bool,
    pub import_as_reference_material: bool,
    pub export_lods: bool,
    pub lod_index: u32,
    pub export_material_parameters: bool,
    /// Per-slot offset baked into the object transform. `None` for identity.
    pub transform_offset: Option<TransformKey>,
}

/// Bit pattern of a transform, usable as part of a hashed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformKey([u32; 10]);

impl TransformKey {
    pub fn from_transform(transform: &HostTransform) -> Option<Self> {
        if transform.is_identity() {
            return None;
        }
        let mut bits = [0u32; 10];
        let values = transform
            .translation
            .iter()
            .chain(&transform.rotation)
            .chain(&transform.scale);
        for (slot, value) in bits.iter_mut().zip(values) {
            *slot = value.to_bits();
        }
        Some(Self(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierKind {
    Leaf,
    Reference,
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputIdentifier {
    pub object: ObjectRef,
    pub options: InputOptions,
    pub kind: IdentifierKind,
}

impl InputIdentifier {
    pub fn leaf(object: ObjectRef, options: InputOptions) -> Self {
        Self {
            object,
            options,
            kind: IdentifierKind::Leaf,
        }
    }

    pub fn reference(object: ObjectRef, options: InputOptions) -> Self {
        Self {
            object,
            options,
            kind: IdentifierKind::Reference,
        }
    }

    pub fn container(path: impl Into<String>) -> Self {
        Self {
            object: ObjectRef::new(path),
            options: InputOptions::default(),
            kind: IdentifierKind::Container,
        }
    }

    /// Node name used when the identifier is first materialized.
    pub fn default_node_name(&self) -> String {
        let base = self.object.name();
        let base = if base.is_empty() { "input" } else { base };
        match self.kind {
            IdentifierKind::Container => base.to_string(),
            IdentifierKind::Reference => format!("{base}_ref"),
            IdentifierKind::Leaf if self.options.export_lods => format!("{base}_lods"),
            IdentifierKind::Leaf if self.options.lod_index > 0 => {
                format!("{base}_lod{}", self.options.lod_index)
            }
            IdentifierKind::Leaf => base.to_string(),
        }
    }
}

impl std::fmt::Display for InputIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.object)
    }
}

/// Weak reference into the registry. Becomes stale when its entry is replaced or
/// removed, or when the registry is invalidated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub identifier: InputIdentifier,
    /// Geometry (or container) node.
    pub node_id: RemoteNodeId,
    /// Object node that owns `node_id`; deleting it removes the whole input.
    pub object_node_id: Option<RemoteNodeId>,
    pub parent: Option<NodeHandle>,
    pub deletable: bool,
    pub dirty: bool,
    pub content_version: u64,
    consumers: BTreeSet<String>,
}

impl RegistryEntry {
    /// Node to delete when tearing the entry down.
    pub fn root_node(&self) -> RemoteNodeId {
        self.object_node_id.unwrap_or(self.node_id)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<RegistryEntry>,
}

/// Maps input identifiers to remote nodes for one engine session. Sole owner of the
/// identifier-to-node association.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    index: HashMap<InputIdentifier, u32>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Handle for an existing entry that is not dirty.
    pub fn lookup(&self, identifier: &InputIdentifier) -> Option<NodeHandle> {
        let handle = self.find(identifier)?;
        match self.entry(handle) {
            Some(entry) if !entry.dirty => Some(handle),
            _ => None,
        }
    }

    /// Handle for an existing entry, dirty or not.
    pub fn find(&self, identifier: &InputIdentifier) -> Option<NodeHandle> {
        let index = *self.index.get(identifier)?;
        let slot = &self.slots[index as usize];
        slot.entry.as_ref()?;
        Some(NodeHandle {
            index,
            generation: slot.generation,
        })
    }

    pub fn entry(&self, handle: NodeHandle) -> Option<&RegistryEntry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: NodeHandle) -> Option<&mut RegistryEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Inserts or replaces the entry for `identifier`. Replacing with a different node
    /// id invalidates previously issued handles.
    pub fn register(
        &mut self,
        identifier: InputIdentifier,
        node_id: RemoteNodeId,
        object_node_id: Option<RemoteNodeId>,
        parent: Option<NodeHandle>,
        deletable: bool,
        content_version: u64,
    ) -> NodeHandle {
        if let Some(&index) = self.index.get(&identifier) {
            let slot = &mut self.slots[index as usize];
            let consumers = match slot.entry.take() {
                Some(previous) if previous.node_id == node_id => previous.consumers,
                Some(_) => {
                    slot.generation = slot.generation.wrapping_add(1);
                    BTreeSet::new()
                }
                None => BTreeSet::new(),
            };
            slot.entry = Some(RegistryEntry {
                identifier,
                node_id,
                object_node_id,
                parent,
                deletable,
                dirty: false,
                content_version,
                consumers,
            });
            return NodeHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        self.index.insert(identifier.clone(), index);
        slot.entry = Some(RegistryEntry {
            identifier,
            node_id,
            object_node_id,
            parent,
            deletable,
            dirty: false,
            content_version,
            consumers: BTreeSet::new(),
        });
        NodeHandle {
            index,
            generation: slot.generation,
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<RegistryEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.index.remove(&entry.identifier);
        self.free.push(handle.index);
        Some(entry)
    }

    pub fn mark_can_be_deleted(&mut self, handle: NodeHandle, deletable: bool) -> bool {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.deletable = deletable;
                true
            }
            None => false,
        }
    }

    pub fn can_be_deleted(&self, handle: NodeHandle) -> Option<bool> {
        self.entry(handle).map(|entry| entry.deletable)
    }

    pub fn node_id(&self, handle: NodeHandle) -> Option<RemoteNodeId> {
        self.entry(handle).map(|entry| entry.node_id)
    }

    /// Node id for `handle`, re-validated against the current session.
    pub fn validated_node_id(
        &self,
        handle: NodeHandle,
        transport: &dyn Transport,
    ) -> Result<RemoteNodeId, BridgeError> {
        let entry = self
            .entry(handle)
            .ok_or_else(|| BridgeError::StaleHandle(format!("{handle:?}")))?;
        if !transport.is_node_valid(entry.node_id) {
            return Err(BridgeError::StaleHandle(entry.identifier.to_string()));
        }
        Ok(entry.node_id)
    }

    /// Marks every identifier derived from `object` dirty.
    pub fn mark_object_dirty(&mut self, object: &ObjectRef) -> usize {
        let mut marked = 0;
        for slot in &mut self.slots {
            if let Some(entry) = slot.entry.as_mut() {
                if &entry.identifier.object == object
                    && entry.identifier.kind != IdentifierKind::Container
                {
                    entry.dirty = true;
                    marked += 1;
                }
            }
        }
        marked
    }

    /// Marks the entry dirty if its uploaded content version differs from `version`.
    pub fn note_content_version(&mut self, identifier: &InputIdentifier, version: u64) -> bool {
        let Some(handle) = self.find(identifier) else {
            return false;
        };
        match self.entry_mut(handle) {
            Some(entry) if entry.content_version != version => {
                entry.dirty = true;
                true
            }
            _ => false,
        }
    }

    pub fn add_consumer(&mut self, handle: NodeHandle, consumer: &str) -> bool {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.consumers.insert(consumer.to_string());
                true
            }
            None => false,
        }
    }

    /// Removes `consumer` and returns how many consumers remain.
    pub fn release_consumer(&mut self, handle: NodeHandle, consumer: &str) -> usize {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.consumers.remove(consumer);
                entry.consumers.len()
            }
            None => 0,
        }
    }

    /// Drops every entry without touching the remote engine. Used when the session
    /// resets and existing node ids no longer mean anything.
    pub fn invalidate(&mut self) {
        self.index.clear();
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        debug!("registry invalidated");
    }

    /// Materializes the container chain above `identifier`, one `subnet` per path
    /// component below `root`. Idempotent: existing valid containers are reused.
    pub fn ensure_parents_exist(
        &mut self,
        identifier: &InputIdentifier,
        root: &str,
        transport: &mut dyn Transport,
        deletable: bool,
    ) -> Result<Option<NodeHandle>, BridgeError> {
        let object_parent = match identifier.kind {
            IdentifierKind::Container => {
                let path = identifier.object.as_str();
                let Some(relative) = path.strip_prefix(root.trim_end_matches('/')) else {
                    return Ok(None);
                };
                ObjectRef::new(relative).parent_path().map(str::to_string)
            }
            _ => identifier.object.parent_path().map(str::to_string),
        };

        let root = root.trim_end_matches('/');
        let mut levels = vec![root.to_string()];
        if let Some(parent) = object_parent {
            let mut current = root.to_string();
            for component in parent.split('/').filter(|c| !c.is_empty()) {
                current.push('/');
                current.push_str(component);
                levels.push(current.clone());
            }
        }

        let mut parent_handle: Option<NodeHandle> = None;
        let mut parent_node: Option<RemoteNodeId> = None;
        for path in levels {
            let container = InputIdentifier::container(path);
            if let Some(handle) = self.find(&container) {
                if let Ok(node) = self.validated_node_id(handle, transport) {
                    if !deletable {
                        self.mark_can_be_deleted(handle, false);
                    }
                    parent_handle = Some(handle);
                    parent_node = Some(node);
                    continue;
                }
                self.remove(handle);
            }

            let name = container.default_node_name();
            let node = transport
                .create_node(parent_node, "subnet", &name)
                .map_err(|code| BridgeError::NodeCreationFailed {
                    name: name.clone(),
                    code,
                })?;
            debug!(container = %container.object, node = %node, "created container");
            let handle = self.register(container, node, None, parent_handle, deletable, 0);
            parent_handle = Some(handle);
            parent_node = Some(node);
        }
        Ok(parent_handle)
    }

    /// Tears down the node behind `handle` when allowed. Shared or non-deletable
    /// nodes stay in the remote graph and in the registry.
    pub fn destroy(
        &mut self,
        handle: NodeHandle,
        consumer: &str,
        transport: &mut dyn Transport,
    ) -> Result<bool, BridgeError> {
        let remaining = self.release_consumer(handle, consumer);
        let Some(entry) = self.entry(handle) else {
            return Ok(false);
        };
        if !entry.deletable || remaining > 0 {
            return Ok(false);
        }
        let root = entry.root_node();
        if transport.is_node_valid(root) {
            transport
                .delete_node(root)
                .map_err(|code| BridgeError::transport(TransportCall::DeleteNode, code))?;
        }
        self.remove(handle);
        Ok(true)
    }
}
