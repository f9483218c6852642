//! Drives extraction, upload and composition for every input slot of a host asset.
//!
//! Errors never escape a slot: each slot ends a pass with a [`SlotReport`] and the
//! remaining slots are processed regardless.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use conduit_scene::{
    Bounds, HostMesh, HostScene, HostTransform, ObjectRef, SceneObject, SceneObjectData,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compose::{self, ReferenceOptions, ReferenceTarget};
use crate::convert::EngineTransform;
use crate::error::BridgeError;
use crate::extract::{extractor_for, ExtractContext};
use crate::geometry::Extraction;
use crate::input::{BoundInput, CancelFlag, HostAsset, InputConnection, InputKind, InputSlot, SlotState};
use crate::marshal::{self, InputNode};
use crate::material::MaterialExport;
use crate::registry::{InputIdentifier, InputOptions, NodeHandle};
use crate::session::SessionContext;
use crate::transport::{RemoteNodeId, Transport, TransportCall};

const TRANSFORM_TOLERANCE: f32 = 1.0e-5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub slot: String,
    pub state: SlotState,
    pub success: bool,
    pub diagnostic: Option<String>,
    pub attribute_uploads: usize,
    pub transform_updates: usize,
    pub nodes_reused: usize,
    pub nodes_deleted: usize,
}

impl SlotReport {
    fn new(slot: &InputSlot) -> Self {
        Self {
            slot: slot.name().to_string(),
            state: slot.state(),
            success: true,
            diagnostic: None,
            attribute_uploads: 0,
            transform_updates: 0,
            nodes_reused: 0,
            nodes_deleted: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub slots: Vec<SlotReport>,
}

impl PassReport {
    pub fn success(&self) -> bool {
        self.slots.iter().all(|slot| slot.success)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotReport> {
        self.slots.iter().find(|slot| slot.slot == name)
    }

    pub fn attribute_uploads(&self) -> usize {
        self.slots.iter().map(|slot| slot.attribute_uploads).sum()
    }

    pub fn transform_updates(&self) -> usize {
        self.slots.iter().map(|slot| slot.transform_updates).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Re-validate every node against the session and reconnect every slot.
    Full,
    /// Trust cached state; only react to version and transform changes.
    Changed,
}

/// Object that produces one remote input node.
struct Leaf<'s> {
    source: &'s ObjectRef,
    object: &'s SceneObject,
    world: HostTransform,
    reference: bool,
}

impl Leaf<'_> {
    fn identifier(&self, options: &InputOptions) -> InputIdentifier {
        if self.reference {
            InputIdentifier::reference(self.object.reference.clone(), options.clone())
        } else {
            InputIdentifier::leaf(self.object.reference.clone(), options.clone())
        }
    }

    /// Content version as stored in the registry. Reference nodes bake their
    /// transform, so it is folded in.
    fn version(&self, transform: &HostTransform) -> u64 {
        if !self.reference {
            return self.object.content_version;
        }
        let mut hasher = DefaultHasher::new();
        self.object.content_version.hash(&mut hasher);
        for value in transform
            .translation
            .iter()
            .chain(&transform.rotation)
            .chain(&transform.scale)
        {
            value.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn flatten<'s>(
    source: &'s ObjectRef,
    object: &'s SceneObject,
    world: HostTransform,
    as_reference: bool,
    out: &mut Vec<Leaf<'s>>,
) {
    let reference = match &object.data {
        SceneObjectData::Actor(_) | SceneObjectData::Blueprint(_) => {
            for component in object.data.components() {
                let component_world = world.compose(&component.transform);
                flatten(source, component, component_world, as_reference, out);
            }
            return;
        }
        SceneObjectData::AssetReference(_) => true,
        SceneObjectData::StaticMesh(_) | SceneObjectData::SkeletalMesh(_) => as_reference,
        _ => false,
    };
    out.push(Leaf {
        source,
        object,
        world,
        reference,
    });
}

/// Leaves for every object on the slot that exists in `scene`. Actors and
/// blueprints expand into their components.
fn collect_leaves<'s>(slot: &InputSlot, scene: &'s HostScene) -> Result<Vec<Leaf<'s>>, BridgeError> {
    let as_reference =
        slot.options().import_as_reference || slot.kind() == InputKind::AssetReference;
    let mut leaves = Vec::new();
    for reference in slot.objects() {
        let Some(object) = scene.get(reference) else {
            debug!(slot = slot.name(), object = %reference, "object not in scene, skipped");
            continue;
        };
        if !slot.kind().accepts(object.kind()) {
            return Err(BridgeError::UnsupportedInputKind {
                slot: slot.kind(),
                object: object.kind(),
            });
        }
        flatten(&object.reference, object, object.transform, as_reference, &mut leaves);
    }
    Ok(leaves)
}

fn mesh_bounds(mesh: &HostMesh) -> Option<Bounds> {
    let (first, rest) = mesh.positions.split_first()?;
    let mut bounds = Bounds {
        min: *first,
        max: *first,
    };
    for p in rest {
        for axis in 0..3 {
            bounds.min[axis] = bounds.min[axis].min(p[axis]);
            bounds.max[axis] = bounds.max[axis].max(p[axis]);
        }
    }
    Some(bounds)
}

fn mesh_materials(mesh: &HostMesh) -> Vec<String> {
    mesh.materials
        .iter()
        .flatten()
        .map(|material| material.path.clone())
        .collect()
}

fn reference_target(object: &SceneObject, transform: HostTransform) -> ReferenceTarget {
    let (path, bounds, materials) = match &object.data {
        SceneObjectData::AssetReference(data) => (
            data.target.to_string(),
            data.bounds,
            data.materials.clone(),
        ),
        SceneObjectData::StaticMesh(data) => match data.lods.first() {
            Some(mesh) => (object.reference.to_string(), mesh_bounds(mesh), mesh_materials(mesh)),
            None => (object.reference.to_string(), None, Vec::new()),
        },
        SceneObjectData::SkeletalMesh(data) => (
            object.reference.to_string(),
            mesh_bounds(&data.mesh),
            mesh_materials(&data.mesh),
        ),
        _ => (object.reference.to_string(), None, Vec::new()),
    };
    ReferenceTarget {
        path,
        transform,
        bounds,
        materials,
    }
}

#[derive(Debug, Default)]
struct SlotWork {
    attribute_uploads: usize,
    transform_updates: usize,
    reused: usize,
    deleted: usize,
}

impl SlotWork {
    fn into_report(self, report: &mut SlotReport) {
        report.attribute_uploads += self.attribute_uploads;
        report.transform_updates += self.transform_updates;
        report.nodes_reused += self.reused;
        report.nodes_deleted += self.deleted;
    }
}

fn set_transform<T: Transport>(
    ctx: &mut SessionContext<T>,
    node: RemoteNodeId,
    transform: &HostTransform,
) -> Result<(), BridgeError> {
    let engine = EngineTransform::from_host(transform, ctx.settings.position_scale_factor);
    ctx.transport
        .set_object_transform(node, &engine)
        .map_err(|code| BridgeError::transport(TransportCall::SetObjectTransform, code))
}

/// Existing registry entry for `identifier` whose nodes are still alive. A stale
/// entry is dropped so the caller recreates the node.
fn live_entry<T: Transport>(
    ctx: &mut SessionContext<T>,
    identifier: &InputIdentifier,
) -> Option<(NodeHandle, InputNode, Option<NodeHandle>, bool)> {
    let handle = ctx.registry.find(identifier)?;
    let entry = ctx.registry.entry(handle)?;
    let input = InputNode {
        object_node: entry.root_node(),
        geometry_node: entry.node_id,
    };
    let parent = entry.parent;
    let deletable = entry.deletable;
    if ctx.transport.is_node_valid(input.object_node)
        && ctx.transport.is_node_valid(input.geometry_node)
    {
        return Some((handle, input, parent, deletable));
    }
    debug!(identifier = %identifier, "stale registry entry dropped");
    ctx.registry.remove(handle);
    None
}

/// Builds, refreshes or reuses the node for one leaf. Returns `None` when the
/// leaf has no geometry; any node it had is deleted.
#[allow(clippy::too_many_arguments)]
fn build_leaf<T: Transport>(
    leaf: &Leaf<'_>,
    slot_kind: InputKind,
    options: &InputOptions,
    offset: &HostTransform,
    previous: Option<&BoundInput>,
    consumer: &str,
    cancel: &CancelFlag,
    ctx: &mut SessionContext<T>,
    work: &mut SlotWork,
) -> Result<Option<BoundInput>, BridgeError> {
    let identifier = leaf.identifier(options);
    let transform = offset.compose(&leaf.world);
    let version = leaf.version(&transform);
    let deletable = ctx.settings.input_nodes_can_be_deleted;
    ctx.registry.note_content_version(&identifier, version);

    let bound = |handle, input: InputNode, transform: Option<HostTransform>| BoundInput {
        source: leaf.source.clone(),
        identifier: identifier.clone(),
        handle,
        object_node: input.object_node,
        geometry_node: input.geometry_node,
        transform,
        content_version: version,
    };

    if let Some(handle) = ctx.registry.lookup(&identifier) {
        if let Some((handle, input, _, _)) =
            live_entry(ctx, &identifier).filter(|(live, ..)| *live == handle)
        {
            ctx.registry.add_consumer(handle, consumer);
            if !deletable {
                ctx.registry.mark_can_be_deleted(handle, false);
            }
            work.reused += 1;
            if leaf.reference {
                return Ok(Some(bound(handle, input, None)));
            }
            let unchanged = previous
                .and_then(|previous| previous.transform)
                .is_some_and(|sent| sent.approx_eq(&transform, TRANSFORM_TOLERANCE));
            if !unchanged {
                set_transform(ctx, input.object_node, &transform)?;
                work.transform_updates += 1;
            }
            debug!(identifier = %identifier, node = %input.geometry_node, "reused input node");
            return Ok(Some(bound(handle, input, Some(transform))));
        }
    }

    let existing = live_entry(ctx, &identifier);
    let scale_factor = ctx.settings.position_scale_factor;

    let extraction = if leaf.reference {
        None
    } else {
        let extractor = extractor_for(&leaf.object.data).ok_or(BridgeError::UnsupportedInputKind {
            slot: slot_kind,
            object: leaf.object.kind(),
        })?;
        let extract_ctx = ExtractContext {
            options,
            scale_factor,
        };
        match extractor.extract(&leaf.world, &extract_ctx)? {
            Extraction::Geometry(part) => Some(part),
            Extraction::Empty => {
                if let Some((handle, input, _, entry_deletable)) = existing {
                    if entry_deletable {
                        ctx.transport
                            .delete_node(input.object_node)
                            .map_err(|code| BridgeError::transport(TransportCall::DeleteNode, code))?;
                        work.deleted += 1;
                    }
                    ctx.registry.remove(handle);
                }
                debug!(identifier = %identifier, "no geometry, nothing uploaded");
                return Ok(None);
            }
        }
    };

    let (existing_input, parent, keep_deletable) = match existing {
        Some((_, input, parent, entry_deletable)) => (Some(input), parent, entry_deletable),
        None => (None, None, true),
    };
    let parent = match existing_input {
        Some(_) => parent,
        None => ctx.registry.ensure_parents_exist(
            &identifier,
            &ctx.settings.root_container,
            &mut ctx.transport,
            deletable,
        )?,
    };
    let parent_node = parent.and_then(|handle| ctx.registry.node_id(handle));
    let name = identifier.default_node_name();

    let (input, created, stats) = match extraction {
        None => {
            let target = reference_target(leaf.object, transform);
            let reference_options = ReferenceOptions {
                rot_scale: options.import_as_reference_rot_scale,
                bbox: options.import_as_reference_bbox,
                material: options.import_as_reference_material,
            };
            let (input, stats) = compose::create_reference_node(
                &mut ctx.transport,
                existing_input,
                parent_node,
                &name,
                &target,
                reference_options,
                scale_factor,
            )?;
            (input, existing_input.is_none(), stats)
        }
        Some(part) => {
            let (input, created) = match existing_input {
                Some(input) => (input, false),
                None => (
                    marshal::create_input_node(&mut ctx.transport, &name, parent_node)?,
                    true,
                ),
            };
            let mode = MaterialExport::from_flag(options.export_material_parameters);
            match marshal::upload_part(
                &mut ctx.transport,
                input.geometry_node,
                &part,
                mode,
                &ctx.settings.default_material,
            ) {
                Ok(stats) => (input, created, stats),
                Err(err) => {
                    if created {
                        marshal::discard_node(&mut ctx.transport, input.object_node);
                    }
                    return Err(err);
                }
            }
        }
    };
    work.attribute_uploads += stats.attributes;

    if cancel.is_cancelled() {
        if created {
            marshal::discard_node(&mut ctx.transport, input.object_node);
        }
        return Err(BridgeError::Cancelled);
    }

    let sent_transform = if leaf.reference {
        None
    } else {
        if !created || !transform.is_identity() {
            if let Err(err) = set_transform(ctx, input.object_node, &transform) {
                if created {
                    marshal::discard_node(&mut ctx.transport, input.object_node);
                }
                return Err(err);
            }
            work.transform_updates += 1;
        }
        Some(transform)
    };

    let handle = ctx.registry.register(
        identifier.clone(),
        input.geometry_node,
        Some(input.object_node),
        parent,
        deletable && keep_deletable,
        version,
    );
    ctx.registry.add_consumer(handle, consumer);
    debug!(
        identifier = %identifier,
        node = %input.geometry_node,
        created,
        attributes = stats.attributes,
        "uploaded input node"
    );
    Ok(Some(bound(handle, input, sent_transform)))
}

fn merge_name(asset: &str, slot: &InputSlot) -> String {
    format!("{asset}_{}_merge", slot.name())
}

/// Keeps `bound` plus any previously bound node it does not replace, so a failed
/// rebuild still releases everything on teardown.
fn keep_partial(slot: &mut InputSlot, mut bound: Vec<BoundInput>) {
    for old in slot.bound.drain(..) {
        if !bound.iter().any(|b| b.identifier == old.identifier) {
            bound.push(old);
        }
    }
    slot.bound = bound;
}

fn rebuild_slot<T: Transport>(
    asset: &str,
    slot: &mut InputSlot,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
    work: &mut SlotWork,
) -> Result<(), BridgeError> {
    let consumer = slot.consumer(asset);
    let options = slot.options().input_options();
    let offset = slot.options().transform_offset;
    let cancel = slot.cancel_flag();
    let leaves = collect_leaves(slot, scene)?;
    // nodes bound from here on belong to this session, even if the rebuild fails
    slot.epoch = ctx.epoch();

    let mut bound: Vec<BoundInput> = Vec::with_capacity(leaves.len());
    let mut empty = Vec::new();
    for leaf in &leaves {
        if cancel.is_cancelled() {
            keep_partial(slot, bound);
            return Err(BridgeError::Cancelled);
        }
        let identifier = leaf.identifier(&options);
        let previous = slot
            .bound
            .iter()
            .find(|existing| existing.identifier == identifier);
        match build_leaf(
            leaf,
            slot.kind(),
            &options,
            &offset,
            previous,
            &consumer,
            &cancel,
            ctx,
            work,
        ) {
            Ok(Some(input)) => bound.push(input),
            Ok(None) => empty.push((identifier, leaf.version(&offset.compose(&leaf.world)))),
            Err(err) => {
                keep_partial(slot, bound);
                return Err(err);
            }
        }
    }

    for old in &slot.bound {
        if bound.iter().any(|b| b.identifier == old.identifier) {
            continue;
        }
        debug!(
            source = %old.source,
            node = %old.geometry_node,
            "input dropped from slot"
        );
        if ctx.registry.destroy(old.handle, &consumer, &mut ctx.transport)? {
            work.deleted += 1;
        }
    }

    let inputs: Vec<RemoteNodeId> = bound.iter().map(|b| b.object_node).collect();
    let current_merge = slot
        .merge_node
        .filter(|merge| ctx.transport.is_node_valid(*merge));
    if inputs.is_empty() {
        if let Some(merge) = current_merge {
            ctx.transport
                .delete_node(merge)
                .map_err(|code| BridgeError::transport(TransportCall::DeleteNode, code))?;
        }
        slot.merge_node = None;
    } else {
        let merge = match current_merge {
            Some(merge) if slot.input_nodes() == inputs => merge,
            _ => compose::create_merge(
                &mut ctx.transport,
                current_merge,
                &inputs,
                &merge_name(asset, slot),
                None,
            )?,
        };
        slot.merge_node = Some(merge);
        compose::set_merge_transform_type(
            &mut ctx.transport,
            merge,
            slot.options().keep_world_transform,
            slot.options().pack_before_merge,
        )?;
    }

    slot.bound = bound;
    slot.empty_leaves = empty;
    Ok(())
}

/// Decides whether a clean slot needs a rebuild. When only transforms moved they
/// are sent right away and the slot stays clean.
fn refresh_clean_slot<T: Transport>(
    slot: &mut InputSlot,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
    mode: PassMode,
    work: &mut SlotWork,
) -> Result<(), BridgeError> {
    let Ok(leaves) = collect_leaves(slot, scene) else {
        slot.mark_dirty();
        return Ok(());
    };
    let options = slot.options().input_options();
    let offset = slot.options().transform_offset;
    if leaves.len() != slot.bound.len() + slot.empty_leaves.len() {
        slot.mark_dirty();
        return Ok(());
    }
    if mode == PassMode::Full {
        let merge_alive = match slot.merge_node {
            Some(merge) => ctx.transport.is_node_valid(merge),
            None => slot.bound.is_empty(),
        };
        if !merge_alive {
            slot.mark_dirty();
            return Ok(());
        }
    }

    for leaf in &leaves {
        let identifier = leaf.identifier(&options);
        let version = leaf.version(&offset.compose(&leaf.world));
        if let Some((_, empty_version)) = slot.empty_leaves.iter().find(|(id, _)| *id == identifier) {
            if *empty_version != version {
                slot.mark_dirty();
                return Ok(());
            }
            continue;
        }
        let Some(bound) = slot.bound.iter().find(|b| b.identifier == identifier) else {
            slot.mark_dirty();
            return Ok(());
        };
        let entry_ok = ctx
            .registry
            .entry(bound.handle)
            .is_some_and(|entry| !entry.dirty && entry.content_version == version);
        let alive = mode == PassMode::Changed
            || ctx
                .registry
                .validated_node_id(bound.handle, &ctx.transport)
                .is_ok();
        if bound.content_version != version || !entry_ok || !alive {
            slot.mark_dirty();
            return Ok(());
        }
    }

    work.transform_updates += upload_input_transform(slot, scene, ctx)?;
    Ok(())
}

/// Sends object transforms that changed since the last upload without touching
/// geometry. Returns the number of transforms sent.
pub fn upload_input_transform<T: Transport>(
    slot: &mut InputSlot,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
) -> Result<usize, BridgeError> {
    let leaves = collect_leaves(slot, scene)?;
    let options = slot.options().input_options();
    let offset = slot.options().transform_offset;
    let mut sent = 0;
    for leaf in leaves.iter().filter(|leaf| !leaf.reference) {
        let identifier = leaf.identifier(&options);
        let transform = offset.compose(&leaf.world);
        let Some(bound) = slot.bound.iter_mut().find(|b| b.identifier == identifier) else {
            continue;
        };
        let unchanged = bound
            .transform
            .is_some_and(|current| current.approx_eq(&transform, TRANSFORM_TOLERANCE));
        if unchanged {
            continue;
        }
        set_transform(ctx, bound.object_node, &transform)?;
        bound.transform = Some(transform);
        sent += 1;
    }
    if sent > 0 {
        debug!(slot = slot.name(), sent, "object transforms updated");
    }
    Ok(sent)
}

/// Tears down everything the slot built: asset connection, its merge and every
/// node it consumes that no one else holds and that may be deleted. Shared nodes
/// are only released. Leaves the slot disconnected. Returns the number of input
/// nodes deleted.
pub fn disconnect_and_destroy<T: Transport>(
    asset: &str,
    slot: &mut InputSlot,
    ctx: &mut SessionContext<T>,
) -> Result<usize, BridgeError> {
    slot.set_state(SlotState::Disconnected);
    slot.empty_leaves.clear();
    if slot.epoch != ctx.epoch() {
        // nodes from an earlier session; their ids mean nothing now
        slot.bound.clear();
        slot.merge_node = None;
        slot.connection = None;
        return Ok(0);
    }

    let consumer = slot.consumer(asset);
    let mut first_error = None;
    if let Some(connection) = slot.connection.take() {
        if ctx.transport.is_node_valid(connection.asset_node) {
            if let Err(code) = ctx
                .transport
                .disconnect_node_input(connection.asset_node, connection.index)
            {
                first_error.get_or_insert(BridgeError::transport(
                    TransportCall::DisconnectNodeInput,
                    code,
                ));
            }
        }
    }

    let mut deleted = 0;
    for bound in slot.bound.drain(..) {
        match ctx.registry.destroy(bound.handle, &consumer, &mut ctx.transport) {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(merge) = slot.merge_node.take() {
        if ctx.transport.is_node_valid(merge) {
            if let Err(code) = ctx.transport.delete_node(merge) {
                first_error.get_or_insert(BridgeError::transport(TransportCall::DeleteNode, code));
            }
        }
    }

    debug!(slot = slot.name(), deleted, "slot torn down");
    match first_error {
        Some(err) => Err(err),
        None => Ok(deleted),
    }
}

/// Tears the slot down and switches it to `kind`. Identifiers depend on the kind,
/// so nothing carries over; the slot is dirty and empty afterwards.
pub fn change_input_type<T: Transport>(
    asset: &str,
    slot: &mut InputSlot,
    kind: InputKind,
    ctx: &mut SessionContext<T>,
) -> Result<usize, BridgeError> {
    let torn_down = disconnect_and_destroy(asset, slot, ctx);
    slot.apply_kind(kind);
    info!(slot = slot.name(), ?kind, "input type changed");
    torn_down
}

/// Wires the slot's merge into input `index` of `asset_node`, or clears that input
/// when the slot has nothing to offer. Returns whether a connection was made.
pub fn connect_input_node<T: Transport>(
    asset_node: RemoteNodeId,
    index: u32,
    slot: &mut InputSlot,
    ctx: &mut SessionContext<T>,
) -> Result<bool, BridgeError> {
    let merge = slot
        .merge_node
        .filter(|merge| ctx.transport.is_node_valid(*merge));
    match merge {
        Some(merge) => {
            let wanted = InputConnection {
                asset_node,
                index,
                merge,
            };
            if slot.connection == Some(wanted) {
                return Ok(false);
            }
            ctx.transport
                .connect_node_input(asset_node, index, merge)
                .map_err(|code| BridgeError::transport(TransportCall::ConnectNodeInput, code))?;
            slot.connection = Some(wanted);
            Ok(true)
        }
        None => {
            if let Some(old) = slot.connection.take() {
                if ctx.transport.is_node_valid(old.asset_node) {
                    ctx.transport
                        .disconnect_node_input(old.asset_node, old.index)
                        .map_err(|code| {
                            BridgeError::transport(TransportCall::DisconnectNodeInput, code)
                        })?;
                }
            }
            Ok(false)
        }
    }
}

fn trim_asset_inputs<T: Transport>(
    asset_node: RemoteNodeId,
    used: u32,
    ctx: &mut SessionContext<T>,
) -> Result<(), BridgeError> {
    let count = ctx
        .transport
        .node_input_count(asset_node)
        .map_err(|code| BridgeError::transport(TransportCall::DisconnectNodeInput, code))?;
    for index in used..count {
        ctx.transport
            .disconnect_node_input(asset_node, index)
            .map_err(|code| BridgeError::transport(TransportCall::DisconnectNodeInput, code))?;
    }
    Ok(())
}

fn fail_slot(slot: &mut InputSlot, report: &mut SlotReport, err: &BridgeError) {
    let state = if err.is_retryable() {
        SlotState::Dirty
    } else {
        SlotState::Failed
    };
    warn!(slot = slot.name(), error = %err, ?state, "input update failed");
    slot.set_state(state);
    slot.set_error(Some(err.to_string()));
    report.success = false;
    report.diagnostic = Some(err.to_string());
}

fn run_pass<T: Transport>(
    asset: &mut HostAsset,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
    mode: PassMode,
) -> PassReport {
    let mut report = PassReport::default();
    let asset_name = asset.name.clone();
    let asset_node = asset
        .asset_node
        .filter(|node| ctx.transport.is_node_valid(*node));

    for mut slot in asset.removed.drain(..) {
        let mut slot_report = SlotReport::new(&slot);
        match disconnect_and_destroy(&asset_name, &mut slot, ctx) {
            Ok(deleted) => slot_report.nodes_deleted = deleted,
            Err(err) => {
                warn!(slot = slot.name(), error = %err, "teardown of removed input failed");
                slot_report.success = false;
                slot_report.diagnostic = Some(err.to_string());
            }
        }
        slot_report.state = slot.state();
        report.slots.push(slot_report);
    }

    let budget = ctx.settings.rebuild_budget();
    let mut rebuilds = 0usize;
    for (index, slot) in asset.inputs.iter_mut().enumerate() {
        let mut slot_report = SlotReport::new(slot);
        let mut work = SlotWork::default();

        if let Some(kind) = slot.take_pending_kind() {
            match change_input_type(&asset_name, slot, kind, ctx) {
                Ok(deleted) => work.deleted += deleted,
                Err(err) => warn!(slot = slot.name(), error = %err, "teardown before type change failed"),
            }
        }

        if slot.epoch != ctx.epoch() && (!slot.bound.is_empty() || slot.merge_node.is_some()) {
            debug!(slot = slot.name(), "session changed, forgetting nodes");
            slot.bound.clear();
            slot.empty_leaves.clear();
            slot.merge_node = None;
            slot.connection = None;
            slot.mark_dirty();
        }

        match slot.state() {
            SlotState::Failed => {
                slot_report.success = false;
                slot_report.diagnostic = slot.last_error().map(str::to_string);
                report.slots.push(slot_report);
                continue;
            }
            SlotState::Disconnected => {
                report.slots.push(slot_report);
                continue;
            }
            SlotState::Clean => {
                if let Err(err) = refresh_clean_slot(slot, scene, ctx, mode, &mut work) {
                    warn!(slot = slot.name(), error = %err, "transform update failed");
                    slot.mark_dirty();
                }
            }
            SlotState::Dirty | SlotState::Rebuilding => {}
        }

        if matches!(slot.state(), SlotState::Dirty | SlotState::Rebuilding) {
            if budget.is_some_and(|budget| rebuilds >= budget) {
                slot.set_state(SlotState::Dirty);
                slot_report.diagnostic = Some("rebuild deferred to the next pass".to_string());
            } else {
                rebuilds += 1;
                slot.set_state(SlotState::Rebuilding);
                match rebuild_slot(&asset_name, slot, scene, ctx, &mut work) {
                    Ok(()) => {
                        slot.set_state(SlotState::Clean);
                        slot.set_error(None);
                    }
                    Err(BridgeError::Cancelled) => {
                        info!(slot = slot.name(), "rebuild cancelled, disconnecting");
                        match disconnect_and_destroy(&asset_name, slot, ctx) {
                            Ok(deleted) => work.deleted += deleted,
                            Err(err) => fail_slot(slot, &mut slot_report, &err),
                        }
                        slot.set_state(SlotState::Disconnected);
                        slot_report.diagnostic = Some(BridgeError::Cancelled.to_string());
                    }
                    Err(err) => fail_slot(slot, &mut slot_report, &err),
                }
            }
        }

        if let Some(asset_node) = asset_node {
            if slot.state() == SlotState::Clean {
                if let Err(err) = connect_input_node(asset_node, index as u32, slot, ctx) {
                    fail_slot(slot, &mut slot_report, &err);
                }
            }
        }

        work.into_report(&mut slot_report);
        slot_report.state = slot.state();
        report.slots.push(slot_report);
    }

    // removed slots shift later ones down, leaving their old top index wired
    if let Some(asset_node) = asset_node {
        if let Err(err) = trim_asset_inputs(asset_node, asset.inputs.len() as u32, ctx) {
            warn!(asset = %asset_name, error = %err, "could not trim asset inputs");
        }
    }

    info!(
        asset = %asset_name,
        slots = report.slots.len(),
        uploads = report.attribute_uploads(),
        transforms = report.transform_updates(),
        success = report.success(),
        "input pass finished"
    );
    report
}

/// Host hook for edits that do not bump the object's content version. Every node
/// built from `object` is re-uploaded by the next pass of each slot using it.
pub fn notify_object_changed<T: Transport>(
    object: &ObjectRef,
    ctx: &mut SessionContext<T>,
) -> usize {
    let marked = ctx.registry.mark_object_dirty(object);
    debug!(object = %object, marked, "object content changed");
    marked
}

/// Full synchronization: every node is re-validated against the session and every
/// slot is reconnected to the asset node.
pub fn update_inputs<T: Transport>(
    asset: &mut HostAsset,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
) -> PassReport {
    run_pass(asset, scene, ctx, PassMode::Full)
}

/// Incremental pass: rebuilds dirty slots and sends moved transforms, relying on
/// cached node state for everything else.
pub fn upload_changed_inputs<T: Transport>(
    asset: &mut HostAsset,
    scene: &HostScene,
    ctx: &mut SessionContext<T>,
) -> PassReport {
    run_pass(asset, scene, ctx, PassMode::Changed)
}

#[cfg(test)]
mod tests;
