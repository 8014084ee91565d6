//! SketchCAD 核心引擎
//!
//! 在实体-组件场景图上执行编辑命令，并维护撤销/重做历史。
//!
//! # 架构设计
//!
//! - `SceneGraph`: 不可变快照，每次编辑生成新的 `Arc<SceneGraph>`
//! - `Command`: 封闭的命令枚举，由执行器穷举分派
//! - `CommandStack`: 线性撤销/重做历史
//! - `SpatialIndex`: 选择用的 BVH
//! - `compute_snap`: 对象捕捉
//!
//! # 示例
//!
//! ```rust
//! use sketchcad_core::prelude::*;
//!
//! let clock = FixedClock::epoch();
//! let mut stack = CommandStack::new(
//!     SceneGraph::empty(clock.0),
//!     IdFactory::new("doc"),
//!     Box::new(clock),
//! );
//!
//! stack
//!     .apply(Command::DrawLine {
//!         start: Vec3::zeros(),
//!         end: Vec3::new(2.0, 0.0, 0.0),
//!     })
//!     .unwrap();
//! assert_eq!(stack.scene().entity_count(), 1);
//!
//! stack.undo();
//! assert_eq!(stack.scene().entity_count(), 0);
//! ```

pub mod clock;
pub mod command;
pub mod executor;
pub mod history;
pub mod id;
pub mod math;
pub mod picking;
pub mod primitive;
pub mod scene;
pub mod snap;
pub mod spatial;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::command::{Command, CommandError};
    pub use crate::executor::{apply, undo, Applied, CommandContext, UndoDescriptor};
    pub use crate::history::{CommandStack, HistoryEntry};
    pub use crate::id::{AssetId, CommandId, ComponentId, EntityId, IdFactory};
    pub use crate::math::{Aabb, Vec3};
    pub use crate::picking::{decode_color_to_id, encode_id_to_color, PickingMap};
    pub use crate::primitive::{Primitive, Profile};
    pub use crate::scene::{Axis, MeshAsset, SceneGraph, Topology, Unit};
    pub use crate::snap::{compute_snap, SnapResult, SnapType};
    pub use crate::spatial::SpatialIndex;
}
