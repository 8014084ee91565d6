//! 交互引擎
//!
//! UI 调用的门面：命令栈 + 选择集 + 空间索引。
//! 任何结构性修改（apply/undo/redo）都把空间索引标记为脏，
//! 下一次查询时整体重建。

use crate::config::EditorConfig;
use sketchcad_core::clock::{Clock, SystemClock};
use sketchcad_core::command::{Command, CommandError};
use sketchcad_core::history::CommandStack;
use sketchcad_core::id::{EntityId, IdFactory};
use sketchcad_core::math::{Aabb, Vec3};
use sketchcad_core::picking::PickingMap;
use sketchcad_core::scene::SceneGraph;
use sketchcad_core::snap::{compute_snap, SnapResult};
use sketchcad_core::spatial::SpatialIndex;
use sketchcad_renderer::{build_geometry_buffers, collect_batches, BufferError, GeometryBuffers, RenderBatch};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// 交互错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("Nothing is selected")]
    NoSelection,

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// 编辑器
pub struct Editor {
    stack: CommandStack,
    selection: Vec<EntityId>,
    index: SpatialIndex,
    index_dirty: bool,
    snap_tolerance: f64,
}

impl Editor {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// 注入时钟（测试中使用固定时钟）
    pub fn with_clock(config: &EditorConfig, clock: Box<dyn Clock>) -> Self {
        let scene = SceneGraph::new(
            config.scene_name.clone(),
            config.unit,
            config.up_axis,
            clock.now(),
        );
        info!("New scene '{}' ({:?}, up {:?})", config.scene_name, config.unit, config.up_axis);
        Self {
            stack: CommandStack::new(scene, IdFactory::new(config.id_prefix.clone()), clock),
            selection: Vec::new(),
            index: SpatialIndex::default(),
            index_dirty: true,
            snap_tolerance: config.snap_tolerance,
        }
    }

    /// 当前快照
    pub fn scene(&self) -> &Arc<SceneGraph> {
        self.stack.scene()
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn selection(&self) -> &[EntityId] {
        &self.selection
    }

    pub fn snap_tolerance(&self) -> f64 {
        self.snap_tolerance
    }

    pub fn is_index_dirty(&self) -> bool {
        self.index_dirty
    }

    /// 执行命令，返回场景是否变化
    pub fn apply(&mut self, command: Command) -> Result<bool, InteractionError> {
        let changed = self.stack.apply(command)?;
        self.after_edit();
        Ok(changed)
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.stack.undo();
        self.after_edit();
        undone
    }

    pub fn redo(&mut self) -> Result<bool, InteractionError> {
        let redone = self.stack.redo()?;
        self.after_edit();
        Ok(redone)
    }

    fn after_edit(&mut self) {
        self.index_dirty = true;
        // 已不存在的实体移出选择集
        let scene = self.stack.scene();
        self.selection.retain(|id| scene.entity(id).is_some());
    }

    fn spatial_index(&mut self) -> &SpatialIndex {
        if self.index_dirty {
            self.index = SpatialIndex::from_scene(self.stack.scene());
            self.index_dirty = false;
            debug!("Rebuilt spatial index with {} entities", self.index.len());
        }
        &self.index
    }

    /// 选择包围盒包含该点的实体（替换当前选择）
    pub fn select_point(&mut self, point: &Vec3) -> &[EntityId] {
        self.selection = self.spatial_index().query_point(point);
        &self.selection
    }

    /// 选择包围盒与框相交的实体（替换当前选择）
    pub fn select_box(&mut self, query: &Aabb) -> &[EntityId] {
        self.selection = self.spatial_index().query_box(query);
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// 在当前快照上捕捉
    pub fn snap(&self, cursor: &Vec3, tolerance: f64) -> Option<SnapResult> {
        compute_snap(self.stack.scene(), cursor, tolerance)
    }

    /// 拉伸选择集中的第一个实体
    pub fn extrude_selection(&mut self, height: f64) -> Result<bool, InteractionError> {
        let profile = self
            .selection
            .first()
            .cloned()
            .ok_or(InteractionError::NoSelection)?;
        self.apply(Command::Extrude {
            profile_entity_id: profile,
            height,
        })
    }

    /// 由拾取颜色找到实体
    pub fn resolve_picking_color(&self, color: [u8; 3]) -> Option<EntityId> {
        PickingMap::new(&self.stack.scene().entities)
            .resolve(color)
            .cloned()
    }

    /// 在当前线程构建几何缓冲区
    pub fn geometry_buffers(&self) -> Result<GeometryBuffers, BufferError> {
        build_geometry_buffers(self.stack.scene())
    }

    pub fn render_batches(&self) -> Vec<RenderBatch> {
        collect_batches(self.stack.scene())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchcad_core::clock::FixedClock;

    fn editor() -> Editor {
        let config = EditorConfig {
            id_prefix: "ui".to_string(),
            ..EditorConfig::default()
        };
        Editor::with_clock(&config, Box::new(FixedClock::epoch()))
    }

    fn rect(x: f64) -> Command {
        Command::DrawRect {
            center: Vec3::new(x, 0.0, 0.0),
            width: 2.0,
            height: 2.0,
        }
    }

    #[test]
    fn test_edits_mark_index_dirty() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        assert!(editor.is_index_dirty());
        editor.select_point(&Vec3::zeros());
        assert!(!editor.is_index_dirty());
        editor.undo();
        assert!(editor.is_index_dirty());
    }

    #[test]
    fn test_selection_is_replaced() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        editor.apply(rect(10.0)).unwrap();

        assert_eq!(editor.select_point(&Vec3::zeros()), &[EntityId::new("ui-ent-1")]);
        assert_eq!(
            editor.select_point(&Vec3::new(10.0, 0.0, 0.0)),
            &[EntityId::new("ui-ent-2")]
        );
        assert!(editor.select_point(&Vec3::new(5.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_selection_sees_latest_scene() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        editor.select_point(&Vec3::zeros());
        editor
            .apply(Command::move_to(
                vec![EntityId::new("ui-ent-1")],
                Vec3::new(20.0, 0.0, 0.0),
            ))
            .unwrap();
        assert!(editor.select_point(&Vec3::zeros()).is_empty());
        assert_eq!(editor.select_point(&Vec3::new(20.0, 0.0, 0.0)).len(), 1);
    }

    #[test]
    fn test_extrude_requires_selection() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        assert_eq!(editor.extrude_selection(1.0), Err(InteractionError::NoSelection));
    }

    #[test]
    fn test_deleted_entities_leave_selection() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        editor.select_point(&Vec3::zeros());
        editor
            .apply(Command::Delete {
                entity_ids: vec![EntityId::new("ui-ent-1")],
            })
            .unwrap();
        assert!(editor.selection().is_empty());
    }

    #[test]
    fn test_resolve_picking_color() {
        let mut editor = editor();
        editor.apply(rect(0.0)).unwrap();
        editor.apply(rect(5.0)).unwrap();
        assert_eq!(editor.resolve_picking_color([2, 0, 0]), Some(EntityId::new("ui-ent-2")));
        assert_eq!(editor.resolve_picking_color([0, 0, 0]), None);
    }

    #[test]
    fn test_command_errors_pass_through() {
        let mut editor = editor();
        let err = editor
            .apply(Command::DrawCircle {
                center: Vec3::zeros(),
                radius: 1.0,
                segments: 2,
            })
            .unwrap_err();
        assert!(matches!(err, InteractionError::Command(CommandError::TooFewSegments { .. })));
    }
}
