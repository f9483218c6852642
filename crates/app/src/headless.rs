use std::path::{Path, PathBuf};
use std::process;

use conduit_core::{
    update_inputs, upload_changed_inputs, BridgeSettings, HostAsset, InputKind,
    InputSlotOptions, MemoryTransport, PassReport, SessionContext, Transport,
};
use conduit_scene::{
    HostMesh, HostScene, HostTransform, ObjectRef, SceneObject, SceneObjectData, StaticMeshData,
};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::logging::parse_level;

#[derive(Debug, Deserialize)]
struct HeadlessPlan {
    #[serde(default)]
    settings: BridgeSettings,
    #[serde(default)]
    objects: Vec<SceneObject>,
    #[serde(default)]
    assets: Vec<PlanAsset>,
    #[serde(default = "default_passes")]
    passes: Vec<PlanPass>,
}

#[derive(Debug, Deserialize)]
struct PlanAsset {
    name: String,
    #[serde(default)]
    inputs: Vec<PlanInput>,
}

#[derive(Debug, Deserialize)]
struct PlanInput {
    name: String,
    kind: InputKind,
    #[serde(default)]
    objects: Vec<ObjectRef>,
    #[serde(default)]
    options: InputSlotOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PassMode {
    #[default]
    Full,
    Changed,
}

#[derive(Debug, Default, Deserialize)]
struct PlanPass {
    #[serde(default)]
    mode: PassMode,
    /// Applied before the pass runs.
    #[serde(default)]
    edits: Vec<PlanEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum PlanEdit {
    SetTransform {
        object: ObjectRef,
        transform: HostTransform,
    },
    Touch {
        object: ObjectRef,
    },
    RemoveObject {
        object: ObjectRef,
    },
    ChangeKind {
        asset: String,
        input: String,
        kind: InputKind,
    },
    RemoveInput {
        asset: String,
        input: String,
    },
    ResetSession,
}

#[derive(Debug, Serialize)]
struct PassOutput<'a> {
    pass: usize,
    asset: &'a str,
    report: PassReport,
}

pub(crate) struct HeadlessArgs {
    pub plan_path: Option<PathBuf>,
    pub print: bool,
    pub log_level: Level,
}

pub(crate) fn parse_args(args: &[String]) -> Result<HeadlessArgs, String> {
    let mut parsed = HeadlessArgs {
        plan_path: None,
        print: true,
        log_level: Level::INFO,
    };
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--headless" | "-headless" => {}
            "--plan" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--plan requires a path".to_string())?;
                parsed.plan_path = Some(PathBuf::from(value));
            }
            "--quiet" => {
                parsed.print = false;
            }
            "--log" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--log requires a level".to_string())?;
                parsed.log_level =
                    parse_level(value).ok_or_else(|| format!("unknown log level {value}"))?;
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(parsed)
}

fn print_help() {
    println!(
        "Runs input passes against an in-memory engine session.\n  --plan <path>\n  --log <error|warn|info|debug|trace>\n  --quiet"
    );
}

pub(crate) fn run(args: &HeadlessArgs) -> Result<bool, String> {
    let plan = match &args.plan_path {
        Some(path) => load_plan(path)?,
        None => default_plan(),
    };
    let outputs = run_plan(plan)?;
    let success = outputs.iter().all(|output| output.report.success());

    if args.print {
        let rows: Vec<PassOutput<'_>> = outputs
            .iter()
            .map(|output| PassOutput {
                pass: output.pass,
                asset: &output.asset,
                report: output.report.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&rows).map_err(|err| err.to_string())?;
        println!("{json}");
    }
    tracing::info!(passes = outputs.len(), success, "headless: completed");
    Ok(success)
}

fn load_plan(path: &Path) -> Result<HeadlessPlan, String> {
    let data = std::fs::read(path).map_err(|err| err.to_string())?;
    serde_json::from_slice(&data).map_err(|err| err.to_string())
}

fn default_passes() -> Vec<PlanPass> {
    vec![PlanPass::default()]
}

fn default_plan() -> HeadlessPlan {
    let rock = SceneObject::new(
        "/Game/Props/Rock.Rock",
        SceneObjectData::StaticMesh(StaticMeshData {
            lods: vec![HostMesh::triangles(
                vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]],
                vec![0, 1, 2],
            )],
        }),
    );
    HeadlessPlan {
        settings: BridgeSettings::default(),
        objects: vec![rock],
        assets: vec![PlanAsset {
            name: "asset".to_string(),
            inputs: vec![PlanInput {
                name: "geo".to_string(),
                kind: InputKind::StaticMesh,
                objects: vec![ObjectRef::new("/Game/Props/Rock.Rock")],
                options: InputSlotOptions::default(),
            }],
        }],
        passes: vec![
            PlanPass::default(),
            PlanPass {
                mode: PassMode::Changed,
                edits: vec![PlanEdit::SetTransform {
                    object: ObjectRef::new("/Game/Props/Rock.Rock"),
                    transform: HostTransform::from_translation([200.0, 0.0, 0.0]),
                }],
            },
        ],
    }
}

struct Output {
    pass: usize,
    asset: String,
    report: PassReport,
}

fn create_asset_nodes(
    ctx: &mut SessionContext<MemoryTransport>,
    assets: &mut [HostAsset],
) -> Result<(), String> {
    for asset in assets {
        let node = ctx
            .transport
            .create_node(None, "hda", &asset.name)
            .map_err(|code| format!("could not create asset node {}: {code:?}", asset.name))?;
        asset.asset_node = Some(node);
    }
    Ok(())
}

fn find_asset<'a>(assets: &'a mut [HostAsset], name: &str) -> Result<&'a mut HostAsset, String> {
    assets
        .iter_mut()
        .find(|asset| asset.name == name)
        .ok_or_else(|| format!("unknown asset {name}"))
}

fn apply_edit(
    edit: PlanEdit,
    scene: &mut HostScene,
    assets: &mut [HostAsset],
    ctx: &mut SessionContext<MemoryTransport>,
) -> Result<(), String> {
    match edit {
        PlanEdit::SetTransform { object, transform } => {
            if !scene.set_transform(&object, transform) {
                return Err(format!("unknown object {object}"));
            }
        }
        PlanEdit::Touch { object } => {
            if !scene.touch(&object) {
                return Err(format!("unknown object {object}"));
            }
        }
        PlanEdit::RemoveObject { object } => {
            scene.remove(&object);
        }
        PlanEdit::ChangeKind { asset, input, kind } => {
            let asset = find_asset(assets, &asset)?;
            asset.request_kind_change(&input, kind);
        }
        PlanEdit::RemoveInput { asset, input } => {
            let asset = find_asset(assets, &asset)?;
            if !asset.remove_input(&input) {
                return Err(format!("unknown input {input}"));
            }
        }
        PlanEdit::ResetSession => {
            ctx.transport.reset_session();
            ctx.reset_session();
            create_asset_nodes(ctx, assets)?;
        }
    }
    Ok(())
}

fn run_plan(plan: HeadlessPlan) -> Result<Vec<Output>, String> {
    let mut ctx = SessionContext::new(MemoryTransport::new(), plan.settings);
    let mut scene = HostScene::new();
    for object in plan.objects {
        scene.insert(object);
    }

    let mut assets: Vec<HostAsset> = plan
        .assets
        .into_iter()
        .map(|planned| {
            let mut asset = HostAsset::new(planned.name);
            for input in planned.inputs {
                let slot = asset.add_input(&input.name, input.kind);
                slot.set_options(input.options);
                slot.set_objects(input.objects);
            }
            asset
        })
        .collect();
    create_asset_nodes(&mut ctx, &mut assets)?;

    let mut outputs = Vec::new();
    for (index, pass) in plan.passes.into_iter().enumerate() {
        for edit in pass.edits {
            apply_edit(edit, &mut scene, &mut assets, &mut ctx)?;
        }
        for asset in &mut assets {
            let report = match pass.mode {
                PassMode::Full => update_inputs(asset, &scene, &mut ctx),
                PassMode::Changed => upload_changed_inputs(asset, &scene, &mut ctx),
            };
            outputs.push(Output {
                pass: index,
                asset: asset.name.clone(),
                report,
            });
        }
    }
    tracing::debug!(nodes = ctx.transport.node_count(), "headless: final engine state");
    Ok(outputs)
}
