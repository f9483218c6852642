use conduit_scene::{Bounds, HostTransform};
use tracing::{debug, warn};

use crate::attributes::{AttributeOwner, AttributeStorage};
use crate::convert::{host_to_engine_position, EngineTransform};
use crate::error::BridgeError;
use crate::geometry::{FaceTopology, PartGeometry, PartKind};
use crate::marshal::{self, InputNode, UploadStats};
use crate::material::MaterialExport;
use crate::transport::{RemoteNodeId, Transport, TransportCall};

pub const INSTANCE_ATTRIBUTE: &str = "unreal_instance";
pub const BBOX_MIN_ATTRIBUTE: &str = "unreal_bbox_min";
pub const BBOX_MAX_ATTRIBUTE: &str = "unreal_bbox_max";

/// Creates a merge node wired to exactly `inputs`. When `existing` is given, the old
/// merge node is deleted only after the new one is built and valid, so a failure
/// leaves the previous graph intact.
pub fn create_merge(
    transport: &mut dyn Transport,
    existing: Option<RemoteNodeId>,
    inputs: &[RemoteNodeId],
    name: &str,
    parent: Option<RemoteNodeId>,
) -> Result<RemoteNodeId, BridgeError> {
    let merge = marshal::create_node(transport, parent, "merge", name)?;
    if let Err(err) = set_merge_inputs(transport, merge, inputs) {
        marshal::discard_node(transport, merge);
        return Err(err);
    }
    if !transport.is_node_valid(merge) {
        return Err(BridgeError::StaleHandle(format!("merge {name}")));
    }
    if let Some(old) = existing.filter(|old| *old != merge) {
        if transport.is_node_valid(old) {
            if let Err(code) = transport.delete_node(old) {
                warn!(node = %old, ?code, "failed to delete previous merge node");
            }
        }
    }
    debug!(name, node = %merge, inputs = inputs.len(), "created merge");
    Ok(merge)
}

/// Connects `inputs` in order and disconnects any higher leftover input.
pub fn set_merge_inputs(
    transport: &mut dyn Transport,
    merge: RemoteNodeId,
    inputs: &[RemoteNodeId],
) -> Result<(), BridgeError> {
    for (index, input) in inputs.iter().enumerate() {
        transport
            .connect_node_input(merge, index as u32, *input)
            .map_err(|code| BridgeError::transport(TransportCall::ConnectNodeInput, code))?;
    }
    let current = transport
        .node_input_count(merge)
        .map_err(|code| BridgeError::transport(TransportCall::DisconnectNodeInput, code))?;
    for index in inputs.len() as u32..current {
        transport
            .disconnect_node_input(merge, index)
            .map_err(|code| BridgeError::transport(TransportCall::DisconnectNodeInput, code))?;
    }
    Ok(())
}

/// `xformtype` 1 keeps object world transforms, `pack` packs each input first.
pub fn set_merge_transform_type(
    transport: &mut dyn Transport,
    merge: RemoteNodeId,
    keep_world_transform: bool,
    pack_before_merge: bool,
) -> Result<(), BridgeError> {
    let map = |code| BridgeError::transport(TransportCall::SetParmInt, code);
    transport
        .set_parm_int(merge, "xformtype", i32::from(keep_world_transform))
        .map_err(map)?;
    transport
        .set_parm_int(merge, "pack", i32::from(pack_before_merge))
        .map_err(map)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTarget {
    pub path: String,
    pub transform: HostTransform,
    pub bounds: Option<Bounds>,
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceOptions {
    pub rot_scale: bool,
    pub bbox: bool,
    pub material: bool,
}

/// Single-point geometry describing `target` without transferring its mesh.
pub fn reference_part(
    target: &ReferenceTarget,
    options: ReferenceOptions,
    scale_factor: f32,
) -> PartGeometry {
    let position = host_to_engine_position(target.transform.translation, scale_factor);
    let mut part = PartGeometry::new(PartKind::Points, vec![position], FaceTopology::default());
    part.set_attribute(
        AttributeOwner::Point,
        INSTANCE_ATTRIBUTE,
        AttributeStorage::String(vec![target.path.clone()]),
    );
    if options.rot_scale {
        let engine = EngineTransform::from_host(&target.transform, scale_factor);
        part.set_attribute(
            AttributeOwner::Point,
            "rot",
            AttributeStorage::Vec4(vec![engine.rotation]),
        );
        part.set_attribute(
            AttributeOwner::Point,
            "scale",
            AttributeStorage::Vec3(vec![engine.scale]),
        );
    }
    if options.bbox {
        if let Some(bounds) = target.bounds {
            let a = host_to_engine_position(bounds.min, scale_factor);
            let b = host_to_engine_position(bounds.max, scale_factor);
            let min = [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])];
            let max = [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])];
            part.set_attribute(
                AttributeOwner::Point,
                BBOX_MIN_ATTRIBUTE,
                AttributeStorage::Vec3(vec![min]),
            );
            part.set_attribute(
                AttributeOwner::Point,
                BBOX_MAX_ATTRIBUTE,
                AttributeStorage::Vec3(vec![max]),
            );
        }
    }
    if options.material {
        for (index, material) in target.materials.iter().enumerate() {
            let name = if index == 0 {
                crate::material::MATERIAL_ATTRIBUTE.to_string()
            } else {
                format!("{}{index}", crate::material::MATERIAL_ATTRIBUTE)
            };
            part.set_attribute(
                AttributeOwner::Detail,
                name,
                AttributeStorage::String(vec![material.clone()]),
            );
        }
    }
    part
}

/// Creates (or refills `existing`) a reference node for `target`. A node created
/// here is deleted again if the upload fails.
pub fn create_reference_node(
    transport: &mut dyn Transport,
    existing: Option<InputNode>,
    parent: Option<RemoteNodeId>,
    name: &str,
    target: &ReferenceTarget,
    options: ReferenceOptions,
    scale_factor: f32,
) -> Result<(InputNode, UploadStats), BridgeError> {
    let (input, created) = match existing {
        Some(input) if transport.is_node_valid(input.geometry_node) => (input, false),
        _ => (marshal::create_input_node(transport, name, parent)?, true),
    };
    let part = reference_part(target, options, scale_factor);
    match marshal::upload_part(
        transport,
        input.geometry_node,
        &part,
        MaterialExport::Minimal,
        "",
    ) {
        Ok(stats) => Ok((input, stats)),
        Err(err) => {
            if created {
                marshal::discard_node(transport, input.object_node);
            }
            Err(err)
        }
    }
}
