//! 标识符与标识符工厂
//!
//! 每个会话（文档）拥有自己的 [`IdFactory`]，按调用方提供的前缀生成
//! 单调递增的字符串标识符，避免不同会话之间冲突。
//! 标识符在会话内永不复用。

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// 实体ID
    EntityId
);
string_id!(
    /// 组件ID
    ComponentId
);
string_id!(
    /// 资源ID
    AssetId
);
string_id!(
    /// 命令ID
    CommandId
);

/// 标识符种类，每种独立计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Entity,
    Component,
    Asset,
    Command,
}

impl IdKind {
    fn tag(&self) -> &'static str {
        match self {
            IdKind::Entity => "ent",
            IdKind::Component => "cmp",
            IdKind::Asset => "asset",
            IdKind::Command => "cmd",
        }
    }

    fn slot(&self) -> usize {
        match self {
            IdKind::Entity => 0,
            IdKind::Component => 1,
            IdKind::Asset => 2,
            IdKind::Command => 3,
        }
    }
}

/// 标识符工厂
///
/// 生成格式为 `{prefix}-{kind}-{n}` 的标识符，`n` 从 1 开始。
/// 工厂作为显式状态通过 `&mut` 传入命令上下文，不存在进程级全局计数器。
#[derive(Debug, Clone)]
pub struct IdFactory {
    prefix: String,
    counters: [u64; 4],
}

impl IdFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: [0; 4],
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 已为指定种类发出的标识符数量
    pub fn issued(&self, kind: IdKind) -> u64 {
        self.counters[kind.slot()]
    }

    fn next(&mut self, kind: IdKind) -> String {
        let counter = &mut self.counters[kind.slot()];
        *counter += 1;
        format!("{}-{}-{}", self.prefix, kind.tag(), counter)
    }

    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.next(IdKind::Entity))
    }

    pub fn next_component(&mut self) -> ComponentId {
        ComponentId(self.next(IdKind::Component))
    }

    pub fn next_asset(&mut self) -> AssetId {
        AssetId(self.next(IdKind::Asset))
    }

    pub fn next_command(&mut self) -> CommandId {
        CommandId(self.next(IdKind::Command))
    }
}

impl Default for IdFactory {
    fn default() -> Self {
        Self::new("scene")
    }
}
