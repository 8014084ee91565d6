//! 命令栈（线性撤销/重做历史）

use crate::clock::Clock;
use crate::command::{Command, CommandError};
use crate::executor::{self, CommandContext, UndoDescriptor};
use crate::id::{CommandId, EntityId, IdFactory};
use crate::scene::SceneGraph;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 历史条目
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: CommandId,
    pub command: Command,
    pub undo: UndoDescriptor,
}

/// 命令栈
///
/// 持有当前快照、标识符工厂和时钟。新的编辑会清空重做列表；
/// 重做时重新执行原命令而不是恢复缓存的快照。
///
/// 重做创建类命令会得到新的实体ID，旧ID到新ID的映射记录在 `renamed` 中，
/// 后续重做的命令先经过映射再执行。
pub struct CommandStack {
    scene: Arc<SceneGraph>,
    ids: IdFactory,
    clock: Box<dyn Clock>,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    renamed: HashMap<EntityId, EntityId>,
}

impl CommandStack {
    pub fn new(scene: SceneGraph, ids: IdFactory, clock: Box<dyn Clock>) -> Self {
        Self {
            scene: Arc::new(scene),
            ids,
            clock,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            renamed: HashMap::new(),
        }
    }

    /// 从基础场景依次执行命令，重建命令栈
    pub fn replay(
        base: SceneGraph,
        commands: impl IntoIterator<Item = Command>,
        ids: IdFactory,
        clock: Box<dyn Clock>,
    ) -> Result<Self, CommandError> {
        let mut stack = Self::new(base, ids, clock);
        for command in commands {
            stack.apply(command)?;
        }
        info!("Replayed {} commands", stack.undo_len());
        Ok(stack)
    }

    /// 当前快照
    pub fn scene(&self) -> &Arc<SceneGraph> {
        &self.scene
    }

    pub fn ids(&self) -> &IdFactory {
        &self.ids
    }

    /// 执行命令
    ///
    /// 返回 `true` 表示场景发生变化并记录了历史；无变化的命令不入栈，
    /// 也不会清空重做列表。
    pub fn apply(&mut self, command: Command) -> Result<bool, CommandError> {
        let mut ctx = CommandContext::new(&mut self.ids, self.clock.as_ref());
        let applied = executor::apply(&self.scene, &command, &mut ctx)?;
        let Some(undo) = applied.undo else {
            return Ok(false);
        };

        let id = self.ids.next_command();
        debug!("Recorded {} as {}", command.name(), id);
        self.scene = applied.scene;
        self.undo_stack.push(HistoryEntry { id, command, undo });
        self.redo_stack.clear();
        self.renamed.clear();
        Ok(true)
    }

    /// 撤销最近一条命令，历史为空时返回 `false`
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };

        let ctx = CommandContext::new(&mut self.ids, self.clock.as_ref());
        self.scene = executor::undo(&self.scene, &entry.undo, &ctx);
        debug!("Undid {} ({})", entry.command.name(), entry.id);
        self.redo_stack.push(entry);
        true
    }

    /// 重做最近撤销的命令
    ///
    /// 原命令在当前快照上重新执行，生成新的标识符和撤销描述。
    /// 命令中引用的、在之前的重做中换了ID的实体先替换为新ID。
    /// 执行失败时条目放回重做列表，快照保持不变。
    pub fn redo(&mut self) -> Result<bool, CommandError> {
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(false);
        };

        let command = entry.command.map_entities(|id| self.current_id(id));
        let mut ctx = CommandContext::new(&mut self.ids, self.clock.as_ref());
        let applied = match executor::apply(&self.scene, &command, &mut ctx) {
            Ok(applied) => applied,
            Err(e) => {
                self.redo_stack.push(entry);
                return Err(e);
            }
        };

        let Some(undo) = applied.undo else {
            debug!("Redo of {} had no effect, dropping entry", command.name());
            return Ok(false);
        };

        if let (UndoDescriptor::RemoveCreated(before), UndoDescriptor::RemoveCreated(after)) =
            (&entry.undo, &undo)
        {
            if before.entity != after.entity {
                self.renamed.insert(before.entity.clone(), after.entity.clone());
            }
        }

        let id = self.ids.next_command();
        debug!("Redid {} as {}", command.name(), id);
        self.scene = applied.scene;
        self.undo_stack.push(HistoryEntry { id, command, undo });
        Ok(true)
    }

    /// 沿重做映射找到实体的当前ID
    fn current_id(&self, id: &EntityId) -> EntityId {
        let mut current = id;
        // 标识符不会复用，映射链无环；链长不超过映射条目数
        for _ in 0..=self.renamed.len() {
            match self.renamed.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// 撤销列表中的命令，按执行顺序
    pub fn history(&self) -> impl Iterator<Item = &Command> {
        self.undo_stack.iter().map(|entry| &entry.command)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }
}
