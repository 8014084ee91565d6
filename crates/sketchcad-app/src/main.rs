//! SketchCAD 无界面主程序
//!
//! 用法：`sketchcad [config.json] [script.json]`
//!
//! 脚本是一个步骤数组，每个步骤要么是编辑命令，要么是交互动作：
//!
//! ```json
//! [
//!   {"type": "draw_rect", "center": [0, 0, 0], "width": 2, "height": 1},
//!   {"type": "select_point", "point": [0, 0, 0]},
//!   {"type": "extrude_selection", "height": 3},
//!   {"type": "undo"}
//! ]
//! ```
//!
//! 回放结束后在后台构建几何缓冲区，提交给统计后端并输出摘要。

use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use sketchcad_core::command::Command;
use sketchcad_core::math::{Aabb, Vec3};
use sketchcad_renderer::{collect_batches, submit, view_projection, StatsBackend};
use sketchcad_ui::{Editor, EditorConfig};

/// 交互动作
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Action {
    Undo,
    Redo,
    SelectPoint { point: Vec3 },
    SelectBox { min: Vec3, max: Vec3 },
    ClearSelection,
    Snap {
        cursor: Vec3,
        tolerance: Option<f64>,
    },
    ExtrudeSelection { height: f64 },
}

/// 脚本步骤
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Step {
    Command(Command),
    Action(Action),
}

fn run_step(editor: &mut Editor, index: usize, step: Step) {
    match step {
        Step::Command(command) => {
            let name = command.name();
            match editor.apply(command) {
                Ok(true) => info!("[{}] {} applied", index, name),
                Ok(false) => info!("[{}] {} left the scene unchanged", index, name),
                Err(e) => warn!("[{}] {} rejected: {}", index, name, e),
            }
        }
        Step::Action(Action::Undo) => {
            if !editor.undo() {
                info!("[{}] nothing to undo", index);
            }
        }
        Step::Action(Action::Redo) => match editor.redo() {
            Ok(true) => {}
            Ok(false) => info!("[{}] nothing to redo", index),
            Err(e) => warn!("[{}] redo failed: {}", index, e),
        },
        Step::Action(Action::SelectPoint { point }) => {
            let selected = editor.select_point(&point);
            info!("[{}] selected {} entities", index, selected.len());
        }
        Step::Action(Action::SelectBox { min, max }) => {
            let selected = editor.select_box(&Aabb::new(min, max));
            info!("[{}] selected {} entities", index, selected.len());
        }
        Step::Action(Action::ClearSelection) => editor.clear_selection(),
        Step::Action(Action::Snap { cursor, tolerance }) => {
            let tolerance = tolerance.unwrap_or_else(|| editor.snap_tolerance());
            match editor.snap(&cursor, tolerance) {
                Some(snap) => info!(
                    "[{}] snapped to {} of {} at ({:.3}, {:.3}, {:.3})",
                    index,
                    snap.snap_type.name(),
                    snap.entity_id,
                    snap.position.x,
                    snap.position.y,
                    snap.position.z
                ),
                None => info!("[{}] no snap within {}", index, tolerance),
            }
        }
        Step::Action(Action::ExtrudeSelection { height }) => {
            if let Err(e) = editor.extrude_selection(height) {
                warn!("[{}] extrude rejected: {}", index, e);
            }
        }
    }
}

fn load_script(path: &str) -> Result<Vec<Step>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing script {}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EditorConfig::load(&path).with_context(|| format!("loading config {}", path))?,
        None => EditorConfig::default(),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting SketchCAD");

    let mut editor = Editor::new(&config);
    if let Some(path) = args.next() {
        let steps = load_script(&path)?;
        info!("Replaying {} steps from {}", steps.len(), path);
        for (index, step) in steps.into_iter().enumerate() {
            run_step(&mut editor, index, step);
        }
    }

    let scene = editor.scene().clone();
    let buffers = config.buffer_worker().build_or_inline(scene.clone()).await?;
    let batches = collect_batches(&scene);

    let vp = view_projection(
        &Vector3::new(10.0, -10.0, 10.0),
        &Vector3::zeros(),
        &scene.metadata.up_axis.unit_vector(),
        std::f64::consts::FRAC_PI_4,
        16.0 / 9.0,
        0.1,
        1000.0,
    );
    let mut backend = StatsBackend::new();
    submit(&mut backend, &buffers, &batches, &vp);

    let stats = backend.stats();
    info!(
        "Scene '{}': {} entities, {} undo / {} redo",
        scene.metadata.name,
        scene.entity_count(),
        editor.stack().undo_len(),
        editor.stack().redo_len()
    );
    info!(
        "Rendered {} meshes ({} vertices, {} indices), {} instances",
        stats.meshes, stats.vertices, stats.indices, stats.instances
    );

    Ok(())
}
