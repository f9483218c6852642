mod attributes;
mod compose;
mod convert;
mod error;
mod extract;
mod geometry;
mod input;
mod marshal;
mod material;
mod memory;
mod parallel;
mod registry;
mod session;
mod settings;
mod transport;
mod translator;

pub use attributes::{
    AttributeData, AttributeError, AttributeInfo, AttributeOwner, AttributeSet, AttributeStorage,
    StorageKind,
};
pub use compose::{
    create_merge, create_reference_node, reference_part, set_merge_inputs,
    set_merge_transform_type, ReferenceOptions, ReferenceTarget, BBOX_MAX_ATTRIBUTE,
    BBOX_MIN_ATTRIBUTE, INSTANCE_ATTRIBUTE,
};
pub use convert::{
    engine_to_host_position, host_to_engine_position, host_to_engine_uv, host_to_engine_vector,
    EngineTransform, NormalTransform, DEFAULT_POSITION_SCALE,
};
pub use error::BridgeError;
pub use extract::{
    extractor_for, ExtractContext, GeometryExtractor, BONE_INDEX_ATTRIBUTE, BONE_WEIGHT_ATTRIBUTE,
    BRUSH_TEXEL_SCALE, CURVE_CLOSED_ATTRIBUTE, DATA_TABLE_COLUMN_PREFIX, DATA_TABLE_ROW_NAME,
    DATA_TABLE_ROW_STRUCT, HEIGHT_ATTRIBUTE, LOD_ATTRIBUTE, PIECE_ATTRIBUTE, SKELETON_ATTRIBUTE,
};
pub use geometry::{Extraction, FaceTopology, PartGeometry, PartKind};
pub use input::{CancelFlag, HostAsset, InputKind, InputSlot, InputSlotOptions, SlotState};
pub use marshal::{
    add_attribute, commit, create_input_node, create_node, define_geometry_part,
    set_attribute_data, upload_attribute, upload_part, InputNode, UploadStats,
    POSITION_ATTRIBUTE,
};
pub use material::{
    material_attributes, MaterialBinding, MaterialExport, MATERIAL_ATTRIBUTE,
    MATERIAL_PARAMETER_PREFIX,
};
pub use memory::{MemoryNode, MemoryTransport, StoredAttribute, StoredData, StoredPart};
pub use registry::{
    IdentifierKind, InputIdentifier, InputOptions, NodeHandle, NodeRegistry, RegistryEntry,
    TransformKey,
};
pub use session::SessionContext;
pub use settings::{BridgeSettings, DEFAULT_MATERIAL};
pub use translator::{
    change_input_type, connect_input_node, disconnect_and_destroy, notify_object_changed,
    update_inputs, upload_changed_inputs, upload_input_transform, PassReport, SlotReport,
};
pub use transport::{PartInfo, RemoteNodeId, ResultCode, Transport, TransportCall, TransportResult};
