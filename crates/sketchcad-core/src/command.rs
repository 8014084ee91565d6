//! 编辑命令
//!
//! 命令是封闭的枚举，执行器通过穷举 `match` 分派。
//! 序列化格式为带 `type` 标签的 JSON 对象，例如：
//!
//! ```json
//! {"type": "draw_line", "start": [0, 0, 0], "end": [2, 0, 0]}
//! ```

use crate::id::EntityId;
use crate::math::Vec3;
use crate::primitive::DEFAULT_CIRCLE_SEGMENTS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 变换矩阵至少需要的元素个数（4x4 列主序）
pub const MATRIX_LEN: usize = 16;

fn default_segments() -> u32 {
    DEFAULT_CIRCLE_SEGMENTS
}

/// 编辑命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// 绘制线段
    DrawLine { start: Vec3, end: Vec3 },

    /// 绘制矩形
    DrawRect { center: Vec3, width: f64, height: f64 },

    /// 绘制圆
    DrawCircle {
        center: Vec3,
        radius: f64,
        #[serde(default = "default_segments")]
        segments: u32,
    },

    /// 拉伸矩形或圆为实体
    #[serde(rename_all = "camelCase")]
    Extrude {
        profile_entity_id: EntityId,
        height: f64,
    },

    /// 平移实体（读取矩阵第 12-14 项作为新位置）
    #[serde(rename_all = "camelCase")]
    Transform {
        entity_ids: Vec<EntityId>,
        matrix: Vec<f64>,
    },

    /// 删除实体
    #[serde(rename_all = "camelCase")]
    Delete { entity_ids: Vec<EntityId> },
}

impl Command {
    /// 命令名称
    pub fn name(&self) -> &'static str {
        match self {
            Command::DrawLine { .. } => "draw_line",
            Command::DrawRect { .. } => "draw_rect",
            Command::DrawCircle { .. } => "draw_circle",
            Command::Extrude { .. } => "extrude",
            Command::Transform { .. } => "transform",
            Command::Delete { .. } => "delete",
        }
    }

    /// 替换命令引用的实体ID（拉伸轮廓、变换与删除目标）
    pub fn map_entities(&self, map: impl Fn(&EntityId) -> EntityId) -> Command {
        match self {
            Command::Extrude {
                profile_entity_id,
                height,
            } => Command::Extrude {
                profile_entity_id: map(profile_entity_id),
                height: *height,
            },
            Command::Transform { entity_ids, matrix } => Command::Transform {
                entity_ids: entity_ids.iter().map(&map).collect(),
                matrix: matrix.clone(),
            },
            Command::Delete { entity_ids } => Command::Delete {
                entity_ids: entity_ids.iter().map(&map).collect(),
            },
            _ => self.clone(),
        }
    }

    /// 构造把实体移动到指定位置的变换命令
    pub fn move_to(entity_ids: Vec<EntityId>, position: Vec3) -> Self {
        let mut matrix = vec![0.0; MATRIX_LEN];
        matrix[0] = 1.0;
        matrix[5] = 1.0;
        matrix[10] = 1.0;
        matrix[15] = 1.0;
        matrix[12] = position.x;
        matrix[13] = position.y;
        matrix[14] = position.z;
        Command::Transform { entity_ids, matrix }
    }
}

/// 命令执行错误
///
/// 均为结构校验失败，发生时输入快照保持不变。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Invalid vector for {field}: components must be finite")]
    InvalidVector { field: &'static str },

    #[error("Dimension {field} must be positive, got {value}")]
    NonPositiveDimension { field: &'static str, value: f64 },

    #[error("Circle needs at least {min} segments, got {segments}")]
    TooFewSegments { segments: u32, min: u32 },

    #[error("Transform matrix needs at least 16 finite entries, got {len}")]
    InvalidMatrix { len: usize },

    #[error("Extrude height must be finite and positive, got {0}")]
    InvalidHeight(f64),

    #[error("Profile entity {0} not found")]
    ProfileNotFound(EntityId),

    #[error("Unsupported extrude profile: {0}")]
    UnsupportedProfile(String),

    #[error("Too many segments: {segments} overflows the mesh index count")]
    TooManySegments { segments: u32 },
}
