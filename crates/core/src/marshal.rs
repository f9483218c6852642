use tracing::{debug, warn};

use crate::attributes::{AttributeInfo, AttributeOwner, AttributeStorage};
use crate::error::BridgeError;
use crate::geometry::PartGeometry;
use crate::material::{material_attributes, MaterialExport};
use crate::transport::{PartInfo, RemoteNodeId, Transport, TransportCall};

pub const POSITION_ATTRIBUTE: &str = "P";

/// Object node plus the editable geometry node inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputNode {
    pub object_node: RemoteNodeId,
    pub geometry_node: RemoteNodeId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub attributes: usize,
    pub points: usize,
    pub faces: usize,
}

fn call_err(call: TransportCall) -> impl FnOnce(crate::transport::ResultCode) -> BridgeError {
    move |code| BridgeError::transport(call, code)
}

pub fn create_node(
    transport: &mut dyn Transport,
    parent: Option<RemoteNodeId>,
    operator: &str,
    name: &str,
) -> Result<RemoteNodeId, BridgeError> {
    transport
        .create_node(parent, operator, name)
        .map_err(|code| BridgeError::NodeCreationFailed {
            name: name.to_string(),
            code,
        })
}

/// Deletes a node left behind by a failed build. Failures are only logged since
/// the caller is already returning the original error.
pub(crate) fn discard_node(transport: &mut dyn Transport, node: RemoteNodeId) {
    if let Err(code) = transport.delete_node(node) {
        warn!(node = %node, ?code, "could not delete abandoned node");
    }
}

/// Creates a `geo` object node under `parent` and an editable `null` node inside it.
/// A half-built pair is removed again when the second step fails.
pub fn create_input_node(
    transport: &mut dyn Transport,
    name: &str,
    parent: Option<RemoteNodeId>,
) -> Result<InputNode, BridgeError> {
    let object_node = create_node(transport, parent, "geo", name)?;
    let geometry_node = match create_node(transport, Some(object_node), "null", "input") {
        Ok(node) => node,
        Err(err) => {
            discard_node(transport, object_node);
            return Err(err);
        }
    };
    if let Err(code) = transport.set_node_display(geometry_node, true) {
        discard_node(transport, object_node);
        return Err(BridgeError::transport(TransportCall::SetNodeDisplay, code));
    }
    debug!(name, object = %object_node, geometry = %geometry_node, "created input node");
    Ok(InputNode {
        object_node,
        geometry_node,
    })
}

pub fn define_geometry_part(
    transport: &mut dyn Transport,
    node: RemoteNodeId,
    info: &PartInfo,
) -> Result<(), BridgeError> {
    transport
        .set_part_info(node, info)
        .map_err(call_err(TransportCall::SetPartInfo))
}

pub fn add_attribute(
    transport: &mut dyn Transport,
    node: RemoteNodeId,
    name: &str,
    info: &AttributeInfo,
) -> Result<(), BridgeError> {
    transport
        .add_attribute(node, name, info)
        .map_err(call_err(TransportCall::AddAttribute))
}

/// Sends `storage` for a previously added attribute. The buffer must hold exactly
/// `info.count` tuples of `info.tuple_size`; nothing is sent otherwise.
pub fn set_attribute_data(
    transport: &mut dyn Transport,
    node: RemoteNodeId,
    name: &str,
    info: &AttributeInfo,
    storage: &AttributeStorage,
) -> Result<(), BridgeError> {
    let data = storage.as_data();
    if data.scalar_len() != info.expected_scalars() || storage.tuple_size() != info.tuple_size {
        return Err(BridgeError::AttributeLengthMismatch {
            name: name.to_string(),
            owner: info.owner,
            expected: info.expected_scalars(),
            actual: data.scalar_len(),
        });
    }
    transport
        .set_attribute_data(node, name, info, &data)
        .map_err(call_err(TransportCall::SetAttributeData))
}

/// Declares and fills one attribute whose owner has `count` elements.
pub fn upload_attribute(
    transport: &mut dyn Transport,
    node: RemoteNodeId,
    owner: AttributeOwner,
    count: usize,
    name: &str,
    storage: &AttributeStorage,
) -> Result<(), BridgeError> {
    if storage.len() != count {
        return Err(BridgeError::AttributeLengthMismatch {
            name: name.to_string(),
            owner,
            expected: count * storage.tuple_size(),
            actual: storage.len() * storage.tuple_size(),
        });
    }
    let info = AttributeInfo::for_storage(owner, storage, count);
    add_attribute(transport, node, name, &info)?;
    set_attribute_data(transport, node, name, &info, storage)
}

pub fn commit(transport: &mut dyn Transport, node: RemoteNodeId) -> Result<(), BridgeError> {
    transport
        .commit_geo(node)
        .map_err(call_err(TransportCall::CommitGeo))
}

/// Full upload of one part: part info, `P`, topology, attributes by owner, material
/// attributes, commit. Owner lengths are checked before any remote call.
pub fn upload_part(
    transport: &mut dyn Transport,
    node: RemoteNodeId,
    part: &PartGeometry,
    materials: MaterialExport,
    default_material: &str,
) -> Result<UploadStats, BridgeError> {
    part.validate()?;
    let material_attrs = part
        .materials
        .as_ref()
        .map(|binding| material_attributes(binding, materials, default_material))
        .unwrap_or_default();

    let info = PartInfo {
        kind: part.kind,
        point_count: part.point_count(),
        vertex_count: part.topology.vertex_count(),
        face_count: part.topology.face_count(),
    };
    define_geometry_part(transport, node, &info)?;

    let mut stats = UploadStats {
        attributes: 0,
        points: info.point_count,
        faces: info.face_count,
    };

    let positions = AttributeStorage::Vec3(part.positions.clone());
    upload_attribute(
        transport,
        node,
        AttributeOwner::Point,
        info.point_count,
        POSITION_ATTRIBUTE,
        &positions,
    )?;
    stats.attributes += 1;

    if info.vertex_count > 0 {
        transport
            .set_vertex_list(node, &part.topology.vertex_list)
            .map_err(call_err(TransportCall::SetVertexList))?;
    }
    if info.face_count > 0 {
        transport
            .set_face_counts(node, &part.topology.face_counts)
            .map_err(call_err(TransportCall::SetFaceCounts))?;
    }

    for (owner, name, storage) in part.attributes.iter() {
        upload_attribute(transport, node, owner, part.owner_len(owner), name, storage)?;
        stats.attributes += 1;
    }
    for (name, storage) in &material_attrs {
        upload_attribute(
            transport,
            node,
            AttributeOwner::Primitive,
            info.face_count,
            name,
            storage,
        )?;
        stats.attributes += 1;
    }

    commit(transport, node)?;
    debug!(node = %node, points = stats.points, attributes = stats.attributes, "committed part");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FaceTopology, PartKind};
    use crate::material::MaterialBinding;
    use crate::memory::MemoryTransport;
    use conduit_scene::HostMaterial;

    fn triangle() -> PartGeometry {
        PartGeometry::new(
            PartKind::Mesh,
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            FaceTopology::triangles(vec![0, 1, 2]),
        )
    }

    #[test]
    fn upload_part_commits_geometry() {
        let mut engine = MemoryTransport::new();
        let input = create_input_node(&mut engine, "tri", None).unwrap();
        let mut part = triangle();
        part.set_attribute(
            AttributeOwner::Vertex,
            "N",
            AttributeStorage::Vec3(vec![[0.0, 1.0, 0.0]; 3]),
        );
        let material = HostMaterial::new("/Game/M_Rock");
        part.materials = Some(MaterialBinding::from_faces([Some(&material)]));

        let stats = upload_part(
            &mut engine,
            input.geometry_node,
            &part,
            MaterialExport::Minimal,
            "",
        )
        .unwrap();
        assert_eq!(stats.attributes, 3);

        let node = engine.node(input.geometry_node).unwrap();
        let geometry = node.geometry.as_ref().unwrap();
        assert_eq!(geometry.vertex_list, vec![0, 1, 2]);
        assert_eq!(geometry.face_counts, vec![3]);
        let materials = geometry
            .attribute(AttributeOwner::Primitive, "unreal_material")
            .unwrap();
        assert_eq!(materials.strings().unwrap(), ["/Game/M_Rock".to_string()]);
    }

    #[test]
    fn length_mismatch_is_caught_before_the_remote_call() {
        let mut engine = MemoryTransport::new();
        let input = create_input_node(&mut engine, "tri", None).unwrap();
        let mut part = triangle();
        part.set_attribute(
            AttributeOwner::Point,
            "Cd",
            AttributeStorage::Vec3(vec![[1.0; 3]; 2]),
        );
        engine.reset_counters();

        let result = upload_part(
            &mut engine,
            input.geometry_node,
            &part,
            MaterialExport::Minimal,
            "",
        );
        assert!(matches!(
            result,
            Err(BridgeError::AttributeLengthMismatch { .. })
        ));
        assert_eq!(engine.call_count(TransportCall::SetAttributeData), 0);
        assert_eq!(engine.call_count(TransportCall::SetPartInfo), 0);
    }

    #[test]
    fn set_attribute_data_checks_tuple_count() {
        let mut engine = MemoryTransport::new();
        let node = engine.create_node(None, "null", "sop").unwrap();
        let info = AttributeInfo {
            owner: AttributeOwner::Point,
            storage: crate::attributes::StorageKind::Float,
            tuple_size: 3,
            count: 4,
        };
        let storage = AttributeStorage::Vec3(vec![[0.0; 3]; 3]);
        let result = set_attribute_data(&mut engine, node, "P", &info, &storage);
        assert_eq!(
            result,
            Err(BridgeError::AttributeLengthMismatch {
                name: "P".to_string(),
                owner: AttributeOwner::Point,
                expected: 12,
                actual: 9,
            })
        );
    }

    #[test]
    fn failed_create_reports_node_creation_failure() {
        let mut engine = MemoryTransport::new();
        engine.fail_call(
            TransportCall::CreateNode,
            crate::transport::ResultCode::Failure,
        );
        let result = create_input_node(&mut engine, "rock", None);
        assert!(matches!(
            result,
            Err(BridgeError::NodeCreationFailed { .. })
        ));
        assert_eq!(engine.node_count(), 0);
    }

    #[test]
    fn failed_cleanup_keeps_the_original_error() {
        let mut engine = MemoryTransport::new();
        engine.fail_call(
            TransportCall::SetNodeDisplay,
            crate::transport::ResultCode::Failure,
        );
        engine.fail_call(TransportCall::DeleteNode, crate::transport::ResultCode::Failure);
        let result = create_input_node(&mut engine, "rock", None);
        assert!(matches!(
            result,
            Err(BridgeError::Transport {
                call: TransportCall::SetNodeDisplay,
                ..
            })
        ));
        assert_eq!(engine.call_count(TransportCall::DeleteNode), 1);
        assert_eq!(engine.node_count(), 2);
    }
}
