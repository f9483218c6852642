//! In-process engine that records the node graph built through [`Transport`].
//! Backs the headless driver and every translator test.

use std::collections::BTreeMap;

use crate::attributes::{AttributeData, AttributeInfo, AttributeOwner, StorageKind};
use crate::convert::EngineTransform;
use crate::input::CancelFlag;
use crate::transport::{
    PartInfo, RemoteNodeId, ResultCode, Transport, TransportCall, TransportResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StoredData {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Int8(Vec<i8>),
    String(Vec<String>),
}

impl From<&AttributeData<'_>> for StoredData {
    fn from(data: &AttributeData<'_>) -> Self {
        match data {
            AttributeData::Float(values) => StoredData::Float(values.clone()),
            AttributeData::Int(values) => StoredData::Int(values.to_vec()),
            AttributeData::Int8(values) => StoredData::Int8(values.clone()),
            AttributeData::String(values) => StoredData::String(values.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttribute {
    pub info: AttributeInfo,
    pub data: Option<StoredData>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredPart {
    pub info: Option<PartInfo>,
    pub attributes: BTreeMap<(AttributeOwner, String), StoredAttribute>,
    pub vertex_list: Vec<u32>,
    pub face_counts: Vec<u32>,
}

impl StoredPart {
    pub fn attribute(&self, owner: AttributeOwner, name: &str) -> Option<&StoredAttribute> {
        self.attributes.get(&(owner, name.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub id: RemoteNodeId,
    pub parent: Option<RemoteNodeId>,
    pub operator: String,
    pub name: String,
    pub inputs: BTreeMap<u32, RemoteNodeId>,
    pub display: bool,
    pub transform: Option<EngineTransform>,
    pub int_parms: BTreeMap<String, i32>,
    pub pending: StoredPart,
    pub geometry: Option<StoredPart>,
}

#[derive(Debug, Clone)]
struct Fault {
    call: TransportCall,
    node_name: Option<String>,
    code: ResultCode,
    once: bool,
}

#[derive(Debug)]
pub struct MemoryTransport {
    nodes: BTreeMap<RemoteNodeId, MemoryNode>,
    next_node_id: i32,
    calls: BTreeMap<TransportCall, u64>,
    faults: Vec<Fault>,
    cancel_hook: Option<(TransportCall, CancelFlag)>,
    session: u64,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_node_id: 1,
            calls: BTreeMap::new(),
            faults: Vec::new(),
            cancel_hook: None,
            session: 1,
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn node(&self, id: RemoteNodeId) -> Option<&MemoryNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, id: RemoteNodeId) -> Vec<RemoteNodeId> {
        self.nodes
            .values()
            .filter(|node| node.parent == Some(id))
            .map(|node| node.id)
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&MemoryNode> {
        self.nodes.values().find(|node| node.name == name)
    }

    /// Inputs of `node` in index order.
    pub fn inputs(&self, id: RemoteNodeId) -> Vec<RemoteNodeId> {
        self.nodes
            .get(&id)
            .map(|node| node.inputs.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self, call: TransportCall) -> u64 {
        self.calls.get(&call).copied().unwrap_or(0)
    }

    pub fn call_counts(&self) -> &BTreeMap<TransportCall, u64> {
        &self.calls
    }

    pub fn reset_counters(&mut self) {
        self.calls.clear();
    }

    /// Fails the next `call` with `code`.
    pub fn fail_call(&mut self, call: TransportCall, code: ResultCode) {
        self.faults.push(Fault {
            call,
            node_name: None,
            code,
            once: true,
        });
    }

    /// Fails every `call` on nodes whose path (`parent/child` names) contains
    /// `fragment` until cleared.
    pub fn fail_call_for(&mut self, call: TransportCall, fragment: &str, code: ResultCode) {
        self.faults.push(Fault {
            call,
            node_name: Some(fragment.to_string()),
            code,
            once: false,
        });
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
        self.cancel_hook = None;
    }

    /// Raises `flag` the next time `call` is issued, as if the host cancelled the
    /// rebuild while the engine was busy.
    pub fn cancel_on(&mut self, call: TransportCall, flag: CancelFlag) {
        self.cancel_hook = Some((call, flag));
    }

    pub fn node_path(&self, id: RemoteNodeId) -> Option<String> {
        let node = self.nodes.get(&id)?;
        match node.parent.and_then(|parent| self.node_path(parent)) {
            Some(parent) => Some(format!("{parent}/{}", node.name)),
            None => Some(node.name.clone()),
        }
    }

    /// Simulates a restarted engine: every node disappears and old ids stay invalid.
    pub fn reset_session(&mut self) {
        self.nodes.clear();
        self.session += 1;
    }

    fn record(&mut self, call: TransportCall, name: Option<&str>) -> TransportResult<()> {
        *self.calls.entry(call).or_default() += 1;
        if let Some((hook, flag)) = &self.cancel_hook {
            if *hook == call {
                flag.cancel();
                self.cancel_hook = None;
            }
        }
        let hit = self.faults.iter().position(|fault| {
            fault.call == call
                && match (&fault.node_name, name) {
                    (None, _) => true,
                    (Some(fragment), Some(name)) => name.contains(fragment.as_str()),
                    (Some(_), None) => false,
                }
        });
        if let Some(index) = hit {
            let code = self.faults[index].code;
            if self.faults[index].once {
                self.faults.remove(index);
            }
            return Err(code);
        }
        Ok(())
    }

    fn record_on(&mut self, call: TransportCall, node: RemoteNodeId) -> TransportResult<()> {
        let name = self.node_path(node);
        self.record(call, name.as_deref())?;
        if name.is_none() {
            return Err(ResultCode::NodeInvalid);
        }
        Ok(())
    }

    fn node_mut(&mut self, id: RemoteNodeId) -> TransportResult<&mut MemoryNode> {
        self.nodes.get_mut(&id).ok_or(ResultCode::NodeInvalid)
    }

    fn alloc_node_id(&mut self) -> RemoteNodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        RemoteNodeId(id)
    }

    fn collect_subtree(&self, root: RemoteNodeId, out: &mut Vec<RemoteNodeId>) {
        out.push(root);
        for child in self.children(root) {
            self.collect_subtree(child, out);
        }
    }
}

impl Transport for MemoryTransport {
    fn create_node(
        &mut self,
        parent: Option<RemoteNodeId>,
        operator: &str,
        name: &str,
    ) -> TransportResult<RemoteNodeId> {
        self.record(TransportCall::CreateNode, Some(name))?;
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(ResultCode::NodeInvalid);
            }
        }
        let id = self.alloc_node_id();
        self.nodes.insert(
            id,
            MemoryNode {
                id,
                parent,
                operator: operator.to_string(),
                name: name.to_string(),
                inputs: BTreeMap::new(),
                display: false,
                transform: None,
                int_parms: BTreeMap::new(),
                pending: StoredPart::default(),
                geometry: None,
            },
        );
        Ok(id)
    }

    fn delete_node(&mut self, node: RemoteNodeId) -> TransportResult<()> {
        self.record_on(TransportCall::DeleteNode, node)?;
        let mut doomed = Vec::new();
        self.collect_subtree(node, &mut doomed);
        for id in &doomed {
            self.nodes.remove(id);
        }
        for other in self.nodes.values_mut() {
            other.inputs.retain(|_, upstream| !doomed.contains(upstream));
        }
        Ok(())
    }

    fn is_node_valid(&self, node: RemoteNodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn parent_node(&self, node: RemoteNodeId) -> TransportResult<Option<RemoteNodeId>> {
        self.nodes
            .get(&node)
            .map(|n| n.parent)
            .ok_or(ResultCode::NodeInvalid)
    }

    fn connect_node_input(
        &mut self,
        node: RemoteNodeId,
        input_index: u32,
        upstream: RemoteNodeId,
    ) -> TransportResult<()> {
        self.record_on(TransportCall::ConnectNodeInput, node)?;
        if !self.nodes.contains_key(&upstream) {
            return Err(ResultCode::NodeInvalid);
        }
        self.node_mut(node)?.inputs.insert(input_index, upstream);
        Ok(())
    }

    fn disconnect_node_input(
        &mut self,
        node: RemoteNodeId,
        input_index: u32,
    ) -> TransportResult<()> {
        self.record_on(TransportCall::DisconnectNodeInput, node)?;
        self.node_mut(node)?.inputs.remove(&input_index);
        Ok(())
    }

    fn node_input_count(&self, node: RemoteNodeId) -> TransportResult<u32> {
        let node = self.nodes.get(&node).ok_or(ResultCode::NodeInvalid)?;
        Ok(node
            .inputs
            .keys()
            .next_back()
            .map(|last| last + 1)
            .unwrap_or(0))
    }

    fn set_node_display(&mut self, node: RemoteNodeId, on: bool) -> TransportResult<()> {
        self.record_on(TransportCall::SetNodeDisplay, node)?;
        let parent = self.node_mut(node)?.parent;
        if on {
            for sibling in self.nodes.values_mut() {
                if sibling.parent == parent {
                    sibling.display = false;
                }
            }
        }
        self.node_mut(node)?.display = on;
        Ok(())
    }

    fn set_object_transform(
        &mut self,
        node: RemoteNodeId,
        transform: &EngineTransform,
    ) -> TransportResult<()> {
        self.record_on(TransportCall::SetObjectTransform, node)?;
        self.node_mut(node)?.transform = Some(*transform);
        Ok(())
    }

    fn set_parm_int(&mut self, node: RemoteNodeId, name: &str, value: i32) -> TransportResult<()> {
        self.record_on(TransportCall::SetParmInt, node)?;
        self.node_mut(node)?
            .int_parms
            .insert(name.to_string(), value);
        Ok(())
    }

    fn set_part_info(&mut self, node: RemoteNodeId, info: &PartInfo) -> TransportResult<()> {
        self.record_on(TransportCall::SetPartInfo, node)?;
        let target = self.node_mut(node)?;
        target.pending = StoredPart {
            info: Some(*info),
            ..StoredPart::default()
        };
        Ok(())
    }

    fn add_attribute(
        &mut self,
        node: RemoteNodeId,
        name: &str,
        info: &AttributeInfo,
    ) -> TransportResult<()> {
        self.record_on(TransportCall::AddAttribute, node)?;
        let target = self.node_mut(node)?;
        if target.pending.info.is_none() {
            return Err(ResultCode::InvalidArgument);
        }
        target.pending.attributes.insert(
            (info.owner, name.to_string()),
            StoredAttribute {
                info: *info,
                data: None,
            },
        );
        Ok(())
    }

    fn set_attribute_data(
        &mut self,
        node: RemoteNodeId,
        name: &str,
        info: &AttributeInfo,
        data: &AttributeData<'_>,
    ) -> TransportResult<()> {
        self.record_on(TransportCall::SetAttributeData, node)?;
        let target = self.node_mut(node)?;
        let Some(stored) = target
            .pending
            .attributes
            .get_mut(&(info.owner, name.to_string()))
        else {
            return Err(ResultCode::InvalidArgument);
        };
        if stored.info != *info
            || data.scalar_len() != info.expected_scalars()
            || data.storage_kind() != info.storage
        {
            return Err(ResultCode::InvalidArgument);
        }
        stored.data = Some(StoredData::from(data));
        Ok(())
    }

    fn set_vertex_list(&mut self, node: RemoteNodeId, vertices: &[u32]) -> TransportResult<()> {
        self.record_on(TransportCall::SetVertexList, node)?;
        let target = self.node_mut(node)?;
        match target.pending.info {
            Some(info) if info.vertex_count == vertices.len() => {
                target.pending.vertex_list = vertices.to_vec();
                Ok(())
            }
            _ => Err(ResultCode::InvalidArgument),
        }
    }

    fn set_face_counts(&mut self, node: RemoteNodeId, counts: &[u32]) -> TransportResult<()> {
        self.record_on(TransportCall::SetFaceCounts, node)?;
        let target = self.node_mut(node)?;
        match target.pending.info {
            Some(info) if info.face_count == counts.len() => {
                target.pending.face_counts = counts.to_vec();
                Ok(())
            }
            _ => Err(ResultCode::InvalidArgument),
        }
    }

    fn commit_geo(&mut self, node: RemoteNodeId) -> TransportResult<()> {
        self.record_on(TransportCall::CommitGeo, node)?;
        let target = self.node_mut(node)?;
        if target.pending.info.is_none() {
            return Err(ResultCode::InvalidArgument);
        }
        let incomplete = target
            .pending
            .attributes
            .values()
            .any(|attribute| attribute.data.is_none());
        if incomplete {
            return Err(ResultCode::InvalidArgument);
        }
        target.geometry = Some(std::mem::take(&mut target.pending));
        Ok(())
    }
}

impl StoredAttribute {
    pub fn floats(&self) -> Option<&[f32]> {
        match &self.data {
            Some(StoredData::Float(values)) => Some(values),
            _ => None,
        }
    }

    pub fn strings(&self) -> Option<&[String]> {
        match &self.data {
            Some(StoredData::String(values)) => Some(values),
            _ => None,
        }
    }

    pub fn ints(&self) -> Option<&[i32]> {
        match &self.data {
            Some(StoredData::Int(values)) => Some(values),
            _ => None,
        }
    }

    pub fn storage(&self) -> StorageKind {
        self.info.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PartKind;

    #[test]
    fn delete_removes_subtree_and_connections() {
        let mut engine = MemoryTransport::new();
        let obj = engine.create_node(None, "geo", "obj").unwrap();
        let sop = engine.create_node(Some(obj), "null", "sop").unwrap();
        let merge = engine.create_node(None, "merge", "merge").unwrap();
        engine.connect_node_input(merge, 0, sop).unwrap();

        engine.delete_node(obj).unwrap();
        assert!(!engine.is_node_valid(obj));
        assert!(!engine.is_node_valid(sop));
        assert!(engine.inputs(merge).is_empty());
    }

    #[test]
    fn attribute_data_must_match_declared_count() {
        let mut engine = MemoryTransport::new();
        let node = engine.create_node(None, "null", "sop").unwrap();
        engine
            .set_part_info(
                node,
                &PartInfo {
                    kind: PartKind::Mesh,
                    point_count: 2,
                    vertex_count: 0,
                    face_count: 0,
                },
            )
            .unwrap();
        let info = AttributeInfo {
            owner: AttributeOwner::Point,
            storage: StorageKind::Float,
            tuple_size: 3,
            count: 2,
        };
        engine.add_attribute(node, "P", &info).unwrap();
        let short = AttributeData::Float(vec![0.0; 3]);
        assert_eq!(
            engine.set_attribute_data(node, "P", &info, &short),
            Err(ResultCode::InvalidArgument)
        );
        let full = AttributeData::Float(vec![0.0; 6]);
        assert!(engine.set_attribute_data(node, "P", &info, &full).is_ok());
        assert!(engine.commit_geo(node).is_ok());
        assert!(engine.node(node).unwrap().geometry.is_some());
    }

    #[test]
    fn faults_fire_once_or_by_name() {
        let mut engine = MemoryTransport::new();
        engine.fail_call(TransportCall::CreateNode, ResultCode::Failure);
        assert_eq!(
            engine.create_node(None, "geo", "a"),
            Err(ResultCode::Failure)
        );
        assert!(engine.create_node(None, "geo", "a").is_ok());

        engine.fail_call_for(TransportCall::CreateNode, "bad", ResultCode::Failure);
        assert!(engine.create_node(None, "geo", "good").is_ok());
        assert!(engine.create_node(None, "geo", "bad_rock").is_err());
        assert!(engine.create_node(None, "geo", "bad_rock").is_err());
        assert_eq!(engine.call_count(TransportCall::CreateNode), 5);
    }

    #[test]
    fn reset_session_invalidates_old_ids() {
        let mut engine = MemoryTransport::new();
        let node = engine.create_node(None, "geo", "a").unwrap();
        engine.reset_session();
        assert!(!engine.is_node_valid(node));
        let fresh = engine.create_node(None, "geo", "a").unwrap();
        assert_ne!(fresh, node);
    }
}
