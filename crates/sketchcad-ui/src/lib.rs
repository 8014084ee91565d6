//! SketchCAD 交互层
//!
//! UI 事件最终都落到 [`Editor`] 上：执行命令、撤销/重做、选择、捕捉和拉伸。

pub mod config;
pub mod interaction;

pub use config::{ConfigError, EditorConfig};
pub use interaction::{Editor, InteractionError};
