use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use conduit_scene::{HostTransform, ObjectRef, SceneObjectKind};
use serde::{Deserialize, Serialize};

use crate::registry::{InputIdentifier, InputOptions, NodeHandle, TransformKey};
use crate::transport::RemoteNodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
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

impl InputKind {
    /// Whether a top-level object of `kind` can be bound to this slot. Components
    /// below actors and blueprints are taken whatever their kind.
    pub fn accepts(self, kind: SceneObjectKind) -> bool {
        match self {
            InputKind::StaticMesh => kind == SceneObjectKind::StaticMesh,
            InputKind::SkeletalMesh => kind == SceneObjectKind::SkeletalMesh,
            InputKind::Spline => kind == SceneObjectKind::Spline,
            InputKind::Landscape => kind == SceneObjectKind::Landscape,
            InputKind::Actor => matches!(
                kind,
                SceneObjectKind::Actor | SceneObjectKind::Brush | SceneObjectKind::Camera
            ),
            InputKind::Blueprint => kind == SceneObjectKind::Blueprint,
            InputKind::Brush => kind == SceneObjectKind::Brush,
            InputKind::Camera => kind == SceneObjectKind::Camera,
            InputKind::DataTable => kind == SceneObjectKind::DataTable,
            InputKind::GeometryCollection => kind == SceneObjectKind::GeometryCollection,
            InputKind::InstancedMesh => kind == SceneObjectKind::InstancedMesh,
            InputKind::AssetReference => matches!(
                kind,
                SceneObjectKind::AssetReference
                    | SceneObjectKind::StaticMesh
                    | SceneObjectKind::SkeletalMesh
            ),
        }
    }
}

/// Per-slot flags. Everything that changes the produced geometry is forwarded into
/// the registry identifier through [`InputSlotOptions::input_options`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSlotOptions {
    /// Merge keeps each object's world transform instead of flattening to local.
    pub keep_world_transform: bool,
    pub pack_before_merge: bool,
    /// Applied on top of every object's world transform.
    pub transform_offset: HostTransform,
    pub export_materials_as_attributes: bool,
    pub import_as_reference: bool,
    pub import_as_reference_rot_scale: bool,
    pub import_as_reference_bbox: bool,
    pub import_as_reference_material: bool,
    pub export_lods: bool,
    pub lod_index: u32,
}

impl InputSlotOptions {
    pub fn input_options(&self) -> InputOptions {
        InputOptions {
            import_as_reference: self.import_as_reference,
            import_as_reference_rot_scale: self.import_as_reference_rot_scale,
            import_as_reference_bbox: self.import_as_reference_bbox,
            import_as_reference_material: self.import_as_reference_material,
            export_lods: self.export_lods,
            lod_index: self.lod_index,
            export_material_parameters: self.export_materials_as_attributes,
            transform_offset: TransformKey::from_transform(&self.transform_offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Clean,
    Dirty,
    Rebuilding,
    Disconnected,
    /// Non-retryable error; skipped until the slot is reconfigured.
    Failed,
}

/// Shared flag that abandons an in-flight rebuild of one slot.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One registry node a slot currently consumes.
#[derive(Debug, Clone)]
pub(crate) struct BoundInput {
    /// Object listed on the slot this node was produced for.
    pub source: ObjectRef,
    pub identifier: InputIdentifier,
    pub handle: NodeHandle,
    pub object_node: RemoteNodeId,
    pub geometry_node: RemoteNodeId,
    /// Object transform last sent, `None` for reference nodes which bake it.
    pub transform: Option<HostTransform>,
    pub content_version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputConnection {
    pub asset_node: RemoteNodeId,
    pub index: u32,
    pub merge: RemoteNodeId,
}

#[derive(Debug, Clone)]
pub struct InputSlot {
    name: String,
    kind: InputKind,
    objects: Vec<ObjectRef>,
    options: InputSlotOptions,
    state: SlotState,
    pending_kind: Option<InputKind>,
    cancel: CancelFlag,
    last_error: Option<String>,
    pub(crate) bound: Vec<BoundInput>,
    pub(crate) merge_node: Option<RemoteNodeId>,
    pub(crate) connection: Option<InputConnection>,
    /// Leaves that produced no geometry, with the version they had.
    pub(crate) empty_leaves: Vec<(InputIdentifier, u64)>,
    /// Session epoch the bound nodes belong to.
    pub(crate) epoch: u64,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            objects: Vec::new(),
            options: InputSlotOptions::default(),
            state: SlotState::Dirty,
            pending_kind: None,
            cancel: CancelFlag::new(),
            last_error: None,
            bound: Vec::new(),
            merge_node: None,
            connection: None,
            empty_leaves: Vec::new(),
            epoch: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn objects(&self) -> &[ObjectRef] {
        &self.objects
    }

    pub fn options(&self) -> &InputSlotOptions {
        &self.options
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn merge_node(&self) -> Option<RemoteNodeId> {
        self.merge_node
    }

    /// Object nodes currently feeding this slot's merge.
    pub fn input_nodes(&self) -> Vec<RemoteNodeId> {
        self.bound.iter().map(|bound| bound.object_node).collect()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn pending_kind(&self) -> Option<InputKind> {
        self.pending_kind
    }

    /// Any reconfiguration makes the slot dirty again, including after a failure
    /// or a disconnect.
    fn reconfigure(&mut self) {
        self.state = SlotState::Dirty;
        self.last_error = None;
        self.cancel.reset();
    }

    pub fn set_objects(&mut self, objects: Vec<ObjectRef>) {
        let mut unique: Vec<ObjectRef> = Vec::with_capacity(objects.len());
        for object in objects {
            if !unique.contains(&object) {
                unique.push(object);
            }
        }
        if unique != self.objects || self.state != SlotState::Clean {
            self.objects = unique;
            self.reconfigure();
        }
    }

    pub fn add_object(&mut self, object: ObjectRef) -> bool {
        if self.objects.contains(&object) {
            return false;
        }
        self.objects.push(object);
        self.reconfigure();
        true
    }

    pub fn remove_object(&mut self, object: &ObjectRef) -> bool {
        let before = self.objects.len();
        self.objects.retain(|existing| existing != object);
        if self.objects.len() == before {
            return false;
        }
        self.reconfigure();
        true
    }

    pub fn set_options(&mut self, options: InputSlotOptions) {
        if options != self.options {
            self.options = options;
            self.reconfigure();
        }
    }

    /// Failed and disconnected slots stay put; they need reconfiguring.
    pub fn mark_dirty(&mut self) {
        if matches!(self.state, SlotState::Clean | SlotState::Rebuilding) {
            self.state = SlotState::Dirty;
        }
    }

    pub(crate) fn set_state(&mut self, state: SlotState) {
        self.state = state;
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub(crate) fn take_pending_kind(&mut self) -> Option<InputKind> {
        self.pending_kind.take()
    }

    /// Switches kind and drops the object list, which only made sense for the old kind.
    pub(crate) fn apply_kind(&mut self, kind: InputKind) {
        self.kind = kind;
        self.objects.clear();
        self.reconfigure();
    }

    /// Consumer key used for registry reference counting.
    pub(crate) fn consumer(&self, asset: &str) -> String {
        format!("{asset}/{}", self.name)
    }
}

/// Host object owning a list of input slots, e.g. a placed asset.
#[derive(Debug, Clone)]
pub struct HostAsset {
    pub name: String,
    /// Node the slots' merges feed into. Created by the asset lifecycle.
    pub asset_node: Option<RemoteNodeId>,
    pub inputs: Vec<InputSlot>,
    /// Slots removed from `inputs` whose nodes still need tearing down.
    pub removed: Vec<InputSlot>,
}

impl HostAsset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_node: None,
            inputs: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Adds a slot, or returns the existing one with that name.
    pub fn add_input(&mut self, name: &str, kind: InputKind) -> &mut InputSlot {
        let index = match self.inputs.iter().position(|slot| slot.name == name) {
            Some(index) => index,
            None => {
                self.inputs.push(InputSlot::new(name, kind));
                self.inputs.len() - 1
            }
        };
        &mut self.inputs[index]
    }

    /// Moves the slot to `removed` as disconnected and cancels any rebuild in flight.
    pub fn remove_input(&mut self, name: &str) -> bool {
        let Some(index) = self.inputs.iter().position(|slot| slot.name == name) else {
            return false;
        };
        let mut slot = self.inputs.remove(index);
        slot.cancel.cancel();
        slot.state = SlotState::Disconnected;
        self.removed.push(slot);
        true
    }

    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputSlot> {
        self.inputs.iter_mut().find(|slot| slot.name == name)
    }

    /// Records a kind change; the translator tears down and rebuilds on its next pass.
    pub fn request_kind_change(&mut self, name: &str, kind: InputKind) -> bool {
        match self.input_mut(name) {
            Some(slot) if slot.kind != kind => {
                slot.pending_kind = Some(kind);
                slot.mark_dirty();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconfiguring_a_failed_slot_makes_it_dirty() {
        let mut slot = InputSlot::new("geo", InputKind::StaticMesh);
        slot.set_state(SlotState::Failed);
        slot.set_error(Some("bad".to_string()));
        slot.add_object(ObjectRef::new("/Game/Rock"));
        assert_eq!(slot.state(), SlotState::Dirty);
        assert!(slot.last_error().is_none());
    }

    #[test]
    fn set_objects_deduplicates_and_ignores_noops() {
        let mut slot = InputSlot::new("geo", InputKind::StaticMesh);
        let rock = ObjectRef::new("/Game/Rock");
        slot.set_objects(vec![rock.clone(), rock.clone()]);
        assert_eq!(slot.objects().len(), 1);
        slot.set_state(SlotState::Clean);
        slot.set_objects(vec![rock]);
        assert_eq!(slot.state(), SlotState::Clean);
    }

    #[test]
    fn remove_input_cancels_and_disconnects() {
        let mut asset = HostAsset::new("hda");
        let flag = asset.add_input("geo", InputKind::StaticMesh).cancel_flag();
        assert!(asset.remove_input("geo"));
        assert!(flag.is_cancelled());
        assert!(asset.inputs.is_empty());
        assert_eq!(asset.removed[0].state(), SlotState::Disconnected);
    }

    #[test]
    fn slot_options_feed_the_identifier() {
        let options = InputSlotOptions {
            export_materials_as_attributes: true,
            lod_index: 2,
            keep_world_transform: true,
            ..Default::default()
        };
        let input = options.input_options();
        assert!(input.export_material_parameters);
        assert_eq!(input.lod_index, 2);
    }

    #[test]
    fn asset_reference_slot_takes_meshes() {
        assert!(InputKind::AssetReference.accepts(SceneObjectKind::StaticMesh));
        assert!(!InputKind::StaticMesh.accepts(SceneObjectKind::Spline));
    }
}
