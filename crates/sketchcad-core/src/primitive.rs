//! 图元参数
//!
//! 图元参数以带标签的枚举保存在元数据组件上，是几何缓冲区生成与捕捉的唯一数据来源。
//! 为了兼容按键名读取的调用方，[`Primitive::flatten`] 可以展开为
//! `line.start.x`、`rect.width` 这样的扁平属性。

use crate::id::EntityId;
use crate::math::{Aabb, Vec3};
use crate::scene::{MeshSource, PropertyValue, Topology};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// 圆未指定段数时的默认值
pub const DEFAULT_CIRCLE_SEGMENTS: u32 = 32;

/// 圆的最少段数
pub const MIN_CIRCLE_SEGMENTS: u32 = 3;

/// 图元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Line {
        start: Vec3,
        end: Vec3,
    },
    Rect {
        center: Vec3,
        width: f64,
        height: f64,
    },
    Circle {
        center: Vec3,
        radius: f64,
        segments: u32,
    },
    Extrude {
        profile: Profile,
        profile_entity: EntityId,
        height: f64,
    },
}

/// 拉伸轮廓（仅支持矩形与圆）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Rect { center: Vec3, width: f64, height: f64 },
    Circle { center: Vec3, radius: f64, segments: u32 },
}

/// 矩形四个角点，逆时针顺序（从 +Z 方向看）
pub fn rect_corners(center: &Vec3, width: f64, height: f64) -> [Vec3; 4] {
    let hw = width / 2.0;
    let hh = height / 2.0;
    [
        Vec3::new(center.x - hw, center.y - hh, center.z),
        Vec3::new(center.x + hw, center.y - hh, center.z),
        Vec3::new(center.x + hw, center.y + hh, center.z),
        Vec3::new(center.x - hw, center.y + hh, center.z),
    ]
}

/// 圆周上均匀分布的点，从 +X 方向开始逆时针
pub fn circle_points(center: &Vec3, radius: f64, segments: u32) -> Vec<Vec3> {
    let segments = segments.max(MIN_CIRCLE_SEGMENTS);
    (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            Vec3::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
                center.z,
            )
        })
        .collect()
}

/// 闭合线环的索引：每条边一对索引，最后一条边回到第 0 点
pub fn line_loop_indices(count: u32) -> Vec<u32> {
    (0..count).flat_map(|i| [i, (i + 1) % count]).collect()
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Rect { .. } => "rect",
            Profile::Circle { .. } => "circle",
        }
    }

    /// 轮廓环上的点
    pub fn ring(&self) -> Vec<Vec3> {
        match self {
            Profile::Rect {
                center,
                width,
                height,
            } => rect_corners(center, *width, *height).to_vec(),
            Profile::Circle {
                center,
                radius,
                segments,
            } => circle_points(center, *radius, *segments),
        }
    }

    /// 轮廓点数 N
    pub fn ring_len(&self) -> u32 {
        match self {
            Profile::Rect { .. } => 4,
            Profile::Circle { segments, .. } => (*segments).max(MIN_CIRCLE_SEGMENTS),
        }
    }

    pub fn bounds(&self) -> Aabb {
        match self {
            Profile::Rect {
                center,
                width,
                height,
            } => Aabb::from_center_half_extents(*center, Vec3::new(width / 2.0, height / 2.0, 0.0)),
            Profile::Circle { center, radius, .. } => {
                Aabb::from_center_half_extents(*center, Vec3::new(*radius, *radius, 0.0))
            }
        }
    }
}

impl Primitive {
    /// 图元名称（与元数据中的 `primitive` 属性一致）
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Line { .. } => "line",
            Primitive::Rect { .. } => "rect",
            Primitive::Circle { .. } => "circle",
            Primitive::Extrude { .. } => "extrude",
        }
    }

    pub fn mesh_source(&self) -> MeshSource {
        match self {
            Primitive::Line { .. } => MeshSource::Line,
            Primitive::Rect { .. } => MeshSource::Rect,
            Primitive::Circle { .. } => MeshSource::Circle,
            Primitive::Extrude { .. } => MeshSource::Extrude,
        }
    }

    pub fn topology(&self) -> Topology {
        match self {
            Primitive::Extrude { .. } => Topology::Triangles,
            _ => Topology::Lines,
        }
    }

    /// 顶点数，超出 u32 时为 `None`
    pub fn vertex_count(&self) -> Option<u32> {
        match self {
            Primitive::Line { .. } => Some(2),
            Primitive::Rect { .. } => Some(4),
            Primitive::Circle { segments, .. } => Some((*segments).max(MIN_CIRCLE_SEGMENTS)),
            Primitive::Extrude { profile, .. } => profile.ring_len().checked_mul(2),
        }
    }

    /// 索引数，超出 u32 时为 `None`
    pub fn index_count(&self) -> Option<u32> {
        match self {
            Primitive::Line { .. } => Some(2),
            Primitive::Rect { .. } => Some(8),
            Primitive::Circle { segments, .. } => (*segments).max(MIN_CIRCLE_SEGMENTS).checked_mul(2),
            // 侧面 N 个四边形 (6N) + 上下两个扇形 (各 3(N-2))
            Primitive::Extrude { profile, .. } => profile
                .ring_len()
                .checked_mul(12)
                .and_then(|n| n.checked_sub(12)),
        }
    }

    /// 圆或圆形轮廓的段数
    pub fn segments(&self) -> Option<u32> {
        match self {
            Primitive::Circle { segments, .. }
            | Primitive::Extrude {
                profile: Profile::Circle { segments, .. },
                ..
            } => Some(*segments),
            _ => None,
        }
    }

    /// 局部包围盒
    ///
    /// 草图位于 XY 平面，拉伸体沿 +Z 延伸。
    pub fn local_bounds(&self) -> Aabb {
        match self {
            Primitive::Line { start, end } => Aabb::new(*start, *end),
            Primitive::Rect {
                center,
                width,
                height,
            } => Profile::Rect {
                center: *center,
                width: *width,
                height: *height,
            }
            .bounds(),
            Primitive::Circle { center, radius, .. } => {
                Aabb::from_center_half_extents(*center, Vec3::new(*radius, *radius, 0.0))
            }
            Primitive::Extrude {
                profile, height, ..
            } => profile.bounds().extend_along(2, *height),
        }
    }

    /// 作为拉伸轮廓使用，不支持的图元返回 `None`
    pub fn as_profile(&self) -> Option<Profile> {
        match self {
            Primitive::Rect {
                center,
                width,
                height,
            } => Some(Profile::Rect {
                center: *center,
                width: *width,
                height: *height,
            }),
            Primitive::Circle {
                center,
                radius,
                segments,
            } => Some(Profile::Circle {
                center: *center,
                radius: *radius,
                segments: *segments,
            }),
            _ => None,
        }
    }

    /// 展开为扁平属性
    pub fn flatten(&self) -> Vec<(String, PropertyValue)> {
        let mut props = vec![("primitive".to_string(), PropertyValue::from(self.name()))];
        match self {
            Primitive::Line { start, end } => {
                push_vec(&mut props, "line.start", start);
                push_vec(&mut props, "line.end", end);
            }
            Primitive::Rect {
                center,
                width,
                height,
            } => {
                push_vec(&mut props, "rect.center", center);
                props.push(("rect.width".into(), PropertyValue::Number(*width)));
                props.push(("rect.height".into(), PropertyValue::Number(*height)));
            }
            Primitive::Circle {
                center,
                radius,
                segments,
            } => {
                push_vec(&mut props, "circle.center", center);
                props.push(("circle.radius".into(), PropertyValue::Number(*radius)));
                props.push(("circle.segments".into(), PropertyValue::Number(*segments as f64)));
            }
            Primitive::Extrude {
                profile,
                profile_entity,
                height,
            } => {
                props.push(("extrude.height".into(), PropertyValue::Number(*height)));
                props.push(("extrude.profile".into(), PropertyValue::from(profile.name())));
                props.push((
                    "extrude.profileEntity".into(),
                    PropertyValue::from(profile_entity.as_str()),
                ));
                match profile {
                    Profile::Rect {
                        center,
                        width,
                        height,
                    } => {
                        push_vec(&mut props, "extrude.rect.center", center);
                        props.push(("extrude.rect.width".into(), PropertyValue::Number(*width)));
                        props.push(("extrude.rect.height".into(), PropertyValue::Number(*height)));
                    }
                    Profile::Circle {
                        center,
                        radius,
                        segments,
                    } => {
                        push_vec(&mut props, "extrude.circle.center", center);
                        props.push(("extrude.circle.radius".into(), PropertyValue::Number(*radius)));
                        props.push((
                            "extrude.circle.segments".into(),
                            PropertyValue::Number(*segments as f64),
                        ));
                    }
                }
            }
        }
        props
    }
}

fn push_vec(props: &mut Vec<(String, PropertyValue)>, key: &str, v: &Vec3) {
    for (axis, value) in ["x", "y", "z"].iter().zip(v.iter()) {
        props.push((format!("{key}.{axis}"), PropertyValue::Number(*value)));
    }
}
