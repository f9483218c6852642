use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeData, AttributeInfo};
use crate::convert::EngineTransform;
use crate::geometry::PartKind;

/// Node id inside the remote engine's graph. Only meaningful within one session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteNodeId(pub i32);

impl fmt::Display for RemoteNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-success codes returned by the remote engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Failure,
    InvalidArgument,
    InvalidSession,
    NodeInvalid,
    AlreadyExists,
}

pub type TransportResult<T> = Result<T, ResultCode>;

/// Names every transport entry point; used in errors, counters and fault injection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportCall {
    CreateNode,
    DeleteNode,
    ConnectNodeInput,
    DisconnectNodeInput,
    SetNodeDisplay,
    SetObjectTransform,
    SetParmInt,
    SetPartInfo,
    AddAttribute,
    SetAttributeData,
    SetVertexList,
    SetFaceCounts,
    CommitGeo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub kind: PartKind,
    pub point_count: usize,
    pub vertex_count: usize,
    pub face_count: usize,
}

/// Synchronous call interface to one remote engine session.
///
/// Calls on one session are strictly ordered; implementations are not required to be
/// reentrant and the core never issues calls from more than one thread.
pub trait Transport {
    fn create_node(
        &mut self,
        parent: Option<RemoteNodeId>,
        operator: &str,
        name: &str,
    ) -> TransportResult<RemoteNodeId>;

    /// Deletes `node` and everything below it.
    fn delete_node(&mut self, node: RemoteNodeId) -> TransportResult<()>;

    fn is_node_valid(&self, node: RemoteNodeId) -> bool;

    fn parent_node(&self, node: RemoteNodeId) -> TransportResult<Option<RemoteNodeId>>;

    fn connect_node_input(
        &mut self,
        node: RemoteNodeId,
        input_index: u32,
        upstream: RemoteNodeId,
    ) -> TransportResult<()>;

    fn disconnect_node_input(&mut self, node: RemoteNodeId, input_index: u32)
        -> TransportResult<()>;

    fn node_input_count(&self, node: RemoteNodeId) -> TransportResult<u32>;

    fn set_node_display(&mut self, node: RemoteNodeId, on: bool) -> TransportResult<()>;

    fn set_object_transform(
        &mut self,
        node: RemoteNodeId,
        transform: &EngineTransform,
    ) -> TransportResult<()>;

    fn set_parm_int(&mut self, node: RemoteNodeId, name: &str, value: i32) -> TransportResult<()>;

    fn set_part_info(&mut self, node: RemoteNodeId, info: &PartInfo) -> TransportResult<()>;

    fn add_attribute(
        &mut self,
        node: RemoteNodeId,
        name: &str,
        info: &AttributeInfo,
    ) -> TransportResult<()>;

    fn set_attribute_data(
        &mut self,
        node: RemoteNodeId,
        name: &str,
        info: &AttributeInfo,
        data: &AttributeData<'_>,
    ) -> TransportResult<()>;

    fn set_vertex_list(&mut self, node: RemoteNodeId, vertices: &[u32]) -> TransportResult<()>;

    fn set_face_counts(&mut self, node: RemoteNodeId, counts: &[u32]) -> TransportResult<()>;

    /// Makes the pending part visible to cooks.
    fn commit_geo(&mut self, node: RemoteNodeId) -> TransportResult<()>;
}
