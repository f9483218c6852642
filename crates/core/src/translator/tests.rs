use conduit_scene::{
    ActorData, HostMesh, HostScene, HostTransform, ObjectRef, SceneObject, SceneObjectData,
    SplineData, StaticMeshData,
};

use super::{
    build_leaf, disconnect_and_destroy, notify_object_changed, update_inputs,
    upload_changed_inputs, Leaf, SlotWork,
};
use crate::attributes::AttributeOwner;
use crate::compose::INSTANCE_ATTRIBUTE;
use crate::error::BridgeError;
use crate::geometry::PartKind;
use crate::input::{CancelFlag, HostAsset, InputKind, InputSlotOptions, SlotState};
use crate::memory::MemoryTransport;
use crate::registry::InputOptions;
use crate::session::SessionContext;
use crate::settings::BridgeSettings;
use crate::transport::{RemoteNodeId, ResultCode, Transport, TransportCall};

fn triangle() -> HostMesh {
    HostMesh::triangles(
        vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]],
        vec![0, 1, 2],
    )
}

fn mesh_object(path: &str) -> SceneObject {
    SceneObject::new(
        path,
        SceneObjectData::StaticMesh(StaticMeshData {
            lods: vec![triangle()],
        }),
    )
}

fn session() -> SessionContext<MemoryTransport> {
    session_with(BridgeSettings::default())
}

fn session_with(settings: BridgeSettings) -> SessionContext<MemoryTransport> {
    SessionContext::new(MemoryTransport::new(), settings)
}

/// Asset with a live asset node and one slot per `(name, kind, object)`.
fn asset_with(
    ctx: &mut SessionContext<MemoryTransport>,
    slots: &[(&str, InputKind, &str)],
) -> HostAsset {
    let mut asset = HostAsset::new("hda");
    asset.asset_node = Some(ctx.transport.create_node(None, "hda", "hda").unwrap());
    for (name, kind, object) in slots {
        let slot = asset.add_input(name, *kind);
        slot.set_objects(vec![ObjectRef::new(*object)]);
    }
    asset
}

fn geo_nodes_named(engine: &MemoryTransport, name: &str) -> usize {
    engine
        .nodes()
        .filter(|node| node.operator == "geo" && node.name == name)
        .count()
}

#[test]
fn first_pass_uploads_merges_and_connects() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());

    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.state(), SlotState::Clean);
    let merge = slot.merge_node().unwrap();
    let rock = ctx.transport.find_by_name("Rock").unwrap().id;
    assert_eq!(ctx.transport.inputs(merge), vec![rock]);
    assert_eq!(ctx.transport.inputs(asset.asset_node.unwrap()), vec![merge]);
    assert_eq!(
        ctx.transport.node(merge).unwrap().int_parms.get("xformtype"),
        Some(&0)
    );
    assert!(report.slot("geo").unwrap().attribute_uploads > 0);
    // identity transforms are not sent
    assert_eq!(ctx.transport.call_count(TransportCall::SetObjectTransform), 0);
}

#[test]
fn unchanged_inputs_are_reused_without_uploads() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);
    let merge = asset.input("geo").unwrap().merge_node();

    ctx.transport.reset_counters();
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(ctx.transport.call_count(TransportCall::SetAttributeData), 0);
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
    assert_eq!(ctx.transport.call_count(TransportCall::ConnectNodeInput), 0);
    assert_eq!(asset.input("geo").unwrap().merge_node(), merge);
}

#[test]
fn moved_object_only_sends_its_transform() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let rock = ObjectRef::new("/Game/Rock.Rock");
    scene.insert(mesh_object(rock.as_str()));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);

    ctx.transport.reset_counters();
    scene.set_transform(&rock, HostTransform::from_translation([100.0, 0.0, 0.0]));
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);

    assert_eq!(report.transform_updates(), 1);
    assert_eq!(ctx.transport.call_count(TransportCall::SetObjectTransform), 1);
    assert_eq!(ctx.transport.call_count(TransportCall::SetAttributeData), 0);
    assert_eq!(asset.input("geo").unwrap().state(), SlotState::Clean);

    let node = ctx.transport.find_by_name("Rock").unwrap();
    let position = node.transform.unwrap().position;
    assert!((position[0] - 1.0).abs() < 1.0e-4);
    assert!(position[1].abs() < 1.0e-4);
    assert!(position[2].abs() < 1.0e-4);

    ctx.transport.reset_counters();
    upload_changed_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(ctx.transport.call_count(TransportCall::SetObjectTransform), 0);
}

#[test]
fn content_change_refills_the_same_node() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let rock = ObjectRef::new("/Game/Rock.Rock");
    scene.insert(mesh_object(rock.as_str()));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);
    let before = asset.input("geo").unwrap().input_nodes();

    ctx.transport.reset_counters();
    scene.touch(&rock);
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);

    assert!(report.success());
    assert!(ctx.transport.call_count(TransportCall::SetAttributeData) > 0);
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
    assert_eq!(asset.input("geo").unwrap().input_nodes(), before);
}

#[test]
fn failing_slot_does_not_stop_the_others() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    scene.insert(mesh_object("/Game/Tree.Tree"));
    let mut bad = triangle();
    bad.uv_sets = vec![vec![[0.0, 0.0]; 2]];
    scene.insert(SceneObject::new(
        "/Game/Bad.Bad",
        SceneObjectData::StaticMesh(StaticMeshData { lods: vec![bad] }),
    ));
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/Rock.Rock"),
            ("b", InputKind::StaticMesh, "/Game/Bad.Bad"),
            ("c", InputKind::StaticMesh, "/Game/Tree.Tree"),
        ],
    );

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(!report.success());
    assert!(report.slot("a").unwrap().success);
    assert!(report.slot("c").unwrap().success);
    let failed = report.slot("b").unwrap();
    assert!(!failed.success);
    assert!(failed.diagnostic.as_deref().unwrap().contains("uv"));

    assert_eq!(asset.input("a").unwrap().state(), SlotState::Clean);
    assert_eq!(asset.input("b").unwrap().state(), SlotState::Failed);
    assert_eq!(asset.input("c").unwrap().state(), SlotState::Clean);
    assert!(ctx.transport.find_by_name("Bad").is_none());

    // failed slots are skipped until reconfigured
    ctx.transport.reset_counters();
    update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
    assert_eq!(asset.input("b").unwrap().state(), SlotState::Failed);

    scene.replace_data(
        &ObjectRef::new("/Game/Bad.Bad"),
        SceneObjectData::StaticMesh(StaticMeshData {
            lods: vec![triangle()],
        }),
    );
    asset
        .input_mut("b")
        .unwrap()
        .set_objects(vec![ObjectRef::new("/Game/Bad.Bad")]);
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(asset.input("b").unwrap().state(), SlotState::Clean);
}

#[test]
fn object_without_geometry_removes_its_node() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let rock = ObjectRef::new("/Game/Rock.Rock");
    scene.insert(mesh_object(rock.as_str()));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);
    let object_node = asset.input("geo").unwrap().input_nodes()[0];
    let merge = asset.input("geo").unwrap().merge_node().unwrap();

    scene.replace_data(
        &rock,
        SceneObjectData::StaticMesh(StaticMeshData { lods: Vec::new() }),
    );
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());

    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.state(), SlotState::Clean);
    assert!(slot.merge_node().is_none());
    assert!(!ctx.transport.is_node_valid(object_node));
    assert!(!ctx.transport.is_node_valid(merge));
    assert!(ctx.transport.inputs(asset.asset_node.unwrap()).is_empty());

    ctx.transport.reset_counters();
    update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
}

#[test]
fn deleted_remote_node_is_rebuilt_on_full_pass() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);
    let old = asset.input("geo").unwrap().input_nodes()[0];

    ctx.transport.delete_node(old).unwrap();
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());

    let slot = asset.input("geo").unwrap();
    let fresh = slot.input_nodes()[0];
    assert_ne!(fresh, old);
    assert!(ctx.transport.is_node_valid(fresh));
    let merge = slot.merge_node().unwrap();
    assert_eq!(ctx.transport.inputs(merge), vec![fresh]);
    assert_eq!(ctx.transport.inputs(asset.asset_node.unwrap()), vec![merge]);
}

#[test]
fn cancelled_rebuild_leaves_no_nodes_behind() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    let flag = asset.input("geo").unwrap().cancel_flag();
    ctx.transport.cancel_on(TransportCall::CommitGeo, flag);

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.state(), SlotState::Disconnected);
    assert!(slot.merge_node().is_none());
    assert!(report.slot("geo").unwrap().diagnostic.is_some());
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 0);

    asset
        .input_mut("geo")
        .unwrap()
        .set_objects(vec![ObjectRef::new("/Game/Rock.Rock")]);
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(asset.input("geo").unwrap().state(), SlotState::Clean);
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 1);
}

#[test]
fn session_reset_rebuilds_without_deleting() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);

    ctx.transport.reset_session();
    ctx.reset_session();
    ctx.transport.reset_counters();
    let report = update_inputs(&mut asset, &scene, &mut ctx);

    assert!(report.success());
    assert_eq!(ctx.transport.call_count(TransportCall::DeleteNode), 0);
    assert!(ctx.transport.call_count(TransportCall::CreateNode) > 0);
    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.state(), SlotState::Clean);
    assert!(ctx.transport.is_node_valid(slot.input_nodes()[0]));
}

#[test]
fn rebuild_budget_spreads_slots_over_passes() {
    let settings = BridgeSettings {
        max_slot_rebuilds_per_pass: 1,
        ..Default::default()
    };
    let mut ctx = session_with(settings);
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    scene.insert(mesh_object("/Game/Tree.Tree"));
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/Rock.Rock"),
            ("b", InputKind::StaticMesh, "/Game/Tree.Tree"),
        ],
    );

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(asset.input("a").unwrap().state(), SlotState::Clean);
    assert_eq!(asset.input("b").unwrap().state(), SlotState::Dirty);
    assert!(report.slot("b").unwrap().diagnostic.is_some());

    update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(asset.input("b").unwrap().state(), SlotState::Clean);
}

#[test]
fn kind_change_tears_down_and_starts_empty() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    scene.insert(SceneObject::new(
        "/Level/Path",
        SceneObjectData::Spline(SplineData {
            points: vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [100.0, 100.0, 0.0]],
            closed: false,
            rotations: None,
            scales: None,
        }),
    ));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);

    assert!(asset.request_kind_change("geo", InputKind::Spline));
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(report.slot("geo").unwrap().nodes_deleted, 1);
    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.kind(), InputKind::Spline);
    assert!(slot.objects().is_empty());
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 0);

    asset
        .input_mut("geo")
        .unwrap()
        .add_object(ObjectRef::new("/Level/Path"));
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    let path = ctx.transport.find_by_name("Path").unwrap().id;
    let geometry = ctx.transport.children(path)[0];
    let part = ctx.transport.node(geometry).unwrap().geometry.clone().unwrap();
    assert_eq!(part.info.unwrap().kind, PartKind::Curve);
}

#[test]
fn shared_node_survives_until_last_consumer_leaves() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/Rock.Rock"),
            ("b", InputKind::StaticMesh, "/Game/Rock.Rock"),
        ],
    );
    update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 1);
    let rock = asset.input("a").unwrap().input_nodes()[0];
    assert_eq!(asset.input("b").unwrap().input_nodes(), vec![rock]);

    asset.remove_input("a");
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert!(ctx.transport.is_node_valid(rock));

    asset.remove_input("b");
    update_inputs(&mut asset, &scene, &mut ctx);
    assert!(!ctx.transport.is_node_valid(rock));
}

#[test]
fn slots_with_different_offsets_keep_their_own_transform() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/Rock.Rock"),
            ("b", InputKind::StaticMesh, "/Game/Rock.Rock"),
        ],
    );
    let slot = asset.input_mut("b").unwrap();
    slot.set_options(InputSlotOptions {
        transform_offset: HostTransform::from_translation([500.0, 0.0, 0.0]),
        ..Default::default()
    });

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    let a = asset.input("a").unwrap().input_nodes()[0];
    let b = asset.input("b").unwrap().input_nodes()[0];
    assert_ne!(a, b);
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 2);

    assert!(ctx.transport.node(a).unwrap().transform.is_none());
    let moved = ctx.transport.node(b).unwrap().transform.unwrap().position;
    assert!((moved[0] - 5.0).abs() < 1.0e-4);

    ctx.transport.reset_counters();
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(ctx.transport.call_count(TransportCall::SetObjectTransform), 0);
    assert!(ctx.transport.node(a).unwrap().transform.is_none());
}

#[test]
fn transport_failure_leaves_the_slot_dirty() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Crate.Crate"));
    let mut asset = asset_with(
        &mut ctx,
        &[("geo", InputKind::StaticMesh, "/Game/Crate.Crate")],
    );
    ctx.transport
        .fail_call_for(TransportCall::SetAttributeData, "Crate", ResultCode::Failure);

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(!report.success());
    assert_eq!(asset.input("geo").unwrap().state(), SlotState::Dirty);
    assert_eq!(geo_nodes_named(&ctx.transport, "Crate"), 0);

    ctx.transport.clear_faults();
    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(asset.input("geo").unwrap().state(), SlotState::Clean);
}

#[test]
fn wrong_object_kind_fails_the_slot() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(SceneObject::new(
        "/Level/Path",
        SceneObjectData::Spline(SplineData {
            points: vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]],
            closed: false,
            rotations: None,
            scales: None,
        }),
    ));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Level/Path")]);

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(!report.success());
    assert_eq!(asset.input("geo").unwrap().state(), SlotState::Failed);
}

#[test]
fn actor_components_become_separate_inputs() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let actor = SceneObject::new(
        "/Level/Crates",
        SceneObjectData::Actor(ActorData {
            components: vec![
                mesh_object("/Level/CrateA"),
                mesh_object("/Level/CrateB")
                    .with_transform(HostTransform::from_translation([0.0, 100.0, 0.0])),
            ],
        }),
    )
    .with_transform(HostTransform::from_translation([100.0, 0.0, 0.0]));
    scene.insert(actor);
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::Actor, "/Level/Crates")]);

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    let slot = asset.input("geo").unwrap();
    assert_eq!(slot.input_nodes().len(), 2);
    assert_eq!(
        ctx.transport.inputs(slot.merge_node().unwrap()),
        slot.input_nodes()
    );

    let b = ctx.transport.find_by_name("CrateB").unwrap();
    let position = b.transform.unwrap().position;
    assert!((position[0] - 1.0).abs() < 1.0e-4);
    assert!(position[1].abs() < 1.0e-4);
    assert!((position[2] - 1.0).abs() < 1.0e-4);
}

#[test]
fn reference_input_carries_the_asset_path() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let rock = ObjectRef::new("/Game/Rock.Rock");
    scene.insert(mesh_object(rock.as_str()));
    let mut asset = asset_with(
        &mut ctx,
        &[("refs", InputKind::AssetReference, "/Game/Rock.Rock")],
    );

    let report = update_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    let node = ctx.transport.find_by_name("Rock_ref").unwrap().id;
    let geometry = ctx.transport.children(node)[0];
    let part = ctx.transport.node(geometry).unwrap().geometry.clone().unwrap();
    let path = part
        .attribute(AttributeOwner::Point, INSTANCE_ATTRIBUTE)
        .unwrap();
    assert_eq!(path.strings().unwrap(), ["/Game/Rock.Rock".to_string()]);

    // the transform is baked into the point, so moving re-uploads in place
    ctx.transport.reset_counters();
    scene.set_transform(&rock, HostTransform::from_translation([100.0, 0.0, 0.0]));
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
    assert_eq!(ctx.transport.call_count(TransportCall::SetObjectTransform), 0);
    assert!(ctx.transport.call_count(TransportCall::SetAttributeData) > 0);
}

#[test]
fn disconnect_and_destroy_clears_everything() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    update_inputs(&mut asset, &scene, &mut ctx);
    let asset_node = asset.asset_node.unwrap();
    let merge = asset.input("geo").unwrap().merge_node().unwrap();

    let slot = asset.input_mut("geo").unwrap();
    let deleted = disconnect_and_destroy("hda", slot, &mut ctx).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(slot.state(), SlotState::Disconnected);
    assert!(slot.input_nodes().is_empty());
    assert!(!ctx.transport.is_node_valid(merge));
    assert!(ctx.transport.inputs(asset_node).is_empty());
    assert_eq!(geo_nodes_named(&ctx.transport, "Rock"), 0);
}

#[test]
fn full_pass_drops_stray_asset_inputs() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    scene.insert(mesh_object("/Game/Rock.Rock"));
    let mut asset = asset_with(&mut ctx, &[("geo", InputKind::StaticMesh, "/Game/Rock.Rock")]);
    let asset_node = asset.asset_node.unwrap();
    let stray: RemoteNodeId = ctx.transport.create_node(None, "null", "stray").unwrap();
    ctx.transport.connect_node_input(asset_node, 3, stray).unwrap();

    update_inputs(&mut asset, &scene, &mut ctx);
    assert_eq!(ctx.transport.node_input_count(asset_node).unwrap(), 1);
}

#[test]
fn changed_pass_after_removal_rewires_shifted_slots() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    for path in ["/Game/A.A", "/Game/B.B", "/Game/C.C"] {
        scene.insert(mesh_object(path));
    }
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/A.A"),
            ("b", InputKind::StaticMesh, "/Game/B.B"),
            ("c", InputKind::StaticMesh, "/Game/C.C"),
        ],
    );
    update_inputs(&mut asset, &scene, &mut ctx);
    let asset_node = asset.asset_node.unwrap();
    assert_eq!(ctx.transport.node_input_count(asset_node).unwrap(), 3);

    asset.remove_input("a");
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);
    assert!(report.success());

    let b = asset.input("b").unwrap().merge_node().unwrap();
    let c = asset.input("c").unwrap().merge_node().unwrap();
    assert_eq!(ctx.transport.inputs(asset_node), vec![b, c]);
    assert_eq!(ctx.transport.node_input_count(asset_node).unwrap(), 2);
}

#[test]
fn changed_object_is_reuploaded_into_its_node() {
    let mut ctx = session();
    let mut scene = HostScene::new();
    let rock = ObjectRef::new("/Game/Rock.Rock");
    scene.insert(mesh_object(rock.as_str()));
    let mut asset = asset_with(
        &mut ctx,
        &[
            ("a", InputKind::StaticMesh, "/Game/Rock.Rock"),
            ("b", InputKind::StaticMesh, "/Game/Rock.Rock"),
        ],
    );
    update_inputs(&mut asset, &scene, &mut ctx);
    let node = asset.input("a").unwrap().input_nodes()[0];

    ctx.transport.reset_counters();
    assert_eq!(notify_object_changed(&rock, &mut ctx), 1);
    assert_eq!(notify_object_changed(&ObjectRef::new("/Game/Other"), &mut ctx), 0);
    let report = upload_changed_inputs(&mut asset, &scene, &mut ctx);

    assert!(report.success());
    assert!(report.attribute_uploads() > 0);
    assert_eq!(ctx.transport.call_count(TransportCall::CreateNode), 0);
    assert_eq!(asset.input("a").unwrap().input_nodes(), vec![node]);
    assert_eq!(asset.input("b").unwrap().input_nodes(), vec![node]);
    assert_eq!(asset.input("a").unwrap().state(), SlotState::Clean);
}

#[test]
fn leaf_without_extractor_names_its_slot_kind() {
    let mut ctx = session();
    let object = SceneObject::new(
        "/Level/Bp.Bp",
        SceneObjectData::Blueprint(Default::default()),
    );
    let leaf = Leaf {
        source: &object.reference,
        object: &object,
        world: HostTransform::IDENTITY,
        reference: false,
    };
    let result = build_leaf(
        &leaf,
        InputKind::Blueprint,
        &InputOptions::default(),
        &HostTransform::IDENTITY,
        None,
        "hda/bp",
        &CancelFlag::new(),
        &mut ctx,
        &mut SlotWork::default(),
    );
    assert!(matches!(
        result,
        Err(BridgeError::UnsupportedInputKind {
            slot: InputKind::Blueprint,
            ..
        })
    ));
    assert_eq!(ctx.transport.node_count(), 0);
}
