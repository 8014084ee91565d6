//! 对象捕捉
//!
//! 支持的捕捉类型：
//! - 端点 (Endpoint)：线段两端
//! - 角点 (Corner)：矩形四角
//! - 中点 (Midpoint)：线段中点
//! - 圆心 (Center)：矩形中心、圆心
//! - 垂足 (Perpendicular)：光标到线段的垂足
//! - 象限点 (Quadrant)：圆的 0°, 90°, 180°, 270° 位置
//!
//! 捕捉在 XY 平面上进行，候选点先经过实体变换再计算距离。
//! 按优先级（端点/角点 > 垂足 > 其他）再按距离选出唯一结果。

use crate::id::EntityId;
use crate::math::{Vec3, EPSILON};
use crate::primitive::{circle_points, rect_corners, Primitive};
use crate::scene::SceneGraph;
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// 捕捉类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapType {
    /// 端点捕捉
    Endpoint,
    /// 角点捕捉
    Corner,
    /// 中点捕捉
    Midpoint,
    /// 圆心捕捉
    Center,
    /// 垂足捕捉
    Perpendicular,
    /// 象限点
    Quadrant,
}

impl SnapType {
    /// 获取捕捉类型的名称
    pub fn name(&self) -> &'static str {
        match self {
            SnapType::Endpoint => "端点",
            SnapType::Corner => "角点",
            SnapType::Midpoint => "中点",
            SnapType::Center => "圆心",
            SnapType::Perpendicular => "垂足",
            SnapType::Quadrant => "象限点",
        }
    }

    /// 获取捕捉类型的快捷键
    pub fn shortcut(&self) -> &'static str {
        match self {
            SnapType::Endpoint => "END",
            SnapType::Corner => "COR",
            SnapType::Midpoint => "MID",
            SnapType::Center => "CEN",
            SnapType::Perpendicular => "PER",
            SnapType::Quadrant => "QUA",
        }
    }

    /// 优先级，数值越小越优先
    pub fn priority(&self) -> u8 {
        match self {
            SnapType::Endpoint | SnapType::Corner => 0,
            SnapType::Perpendicular => 1,
            SnapType::Midpoint | SnapType::Center | SnapType::Quadrant => 2,
        }
    }
}

/// 捕捉结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapResult {
    /// 捕捉到的世界坐标
    pub position: Vec3,
    pub snap_type: SnapType,
    pub entity_id: EntityId,
    /// 与光标在 XY 平面上的距离
    pub distance: f64,
}

/// 计算光标附近的最佳捕捉点，容差内没有候选时返回 `None`
pub fn compute_snap(scene: &SceneGraph, cursor: &Vec3, tolerance: f64) -> Option<SnapResult> {
    let mut candidates = Vec::new();

    for entity in &scene.entities {
        if !scene.is_visible(entity) {
            continue;
        }
        let Some(primitive) = scene.primitive_of(entity) else {
            continue;
        };
        let matrix = scene.world_matrix(entity);
        collect_candidates(primitive, &matrix, cursor, &mut |position, snap_type| {
            let distance = planar_distance(&position, cursor);
            if distance <= tolerance {
                candidates.push(SnapResult {
                    position,
                    snap_type,
                    entity_id: entity.id.clone(),
                    distance,
                });
            }
        });
    }

    // min_by 在相等时返回第一个，保证生成顺序作为最后的排序键
    candidates.into_iter().min_by(|a, b| {
        a.snap_type
            .priority()
            .cmp(&b.snap_type.priority())
            .then(a.distance.total_cmp(&b.distance))
    })
}

fn collect_candidates(
    primitive: &Primitive,
    matrix: &Matrix4<f64>,
    cursor: &Vec3,
    push: &mut impl FnMut(Vec3, SnapType),
) {
    let world = |p: &Vec3| matrix.transform_point(&Point3::from(*p)).coords;

    match primitive {
        Primitive::Line { start, end } => {
            let (start, end) = (world(start), world(end));
            push(start, SnapType::Endpoint);
            push(end, SnapType::Endpoint);
            push((start + end) * 0.5, SnapType::Midpoint);
            if let Some(foot) = perpendicular_to_line(&start, &end, cursor) {
                push(foot, SnapType::Perpendicular);
            }
        }
        Primitive::Rect {
            center,
            width,
            height,
        } => {
            for corner in rect_corners(center, *width, *height) {
                push(world(&corner), SnapType::Corner);
            }
            push(world(center), SnapType::Center);
        }
        Primitive::Circle { center, radius, .. } => {
            push(world(center), SnapType::Center);
            for quadrant in circle_points(center, *radius, 4) {
                push(world(&quadrant), SnapType::Quadrant);
            }
        }
        Primitive::Extrude { .. } => {}
    }
}

/// 计算从参考点到线段的垂足（XY 平面），垂足不在线段上时返回 `None`
fn perpendicular_to_line(start: &Vec3, end: &Vec3, ref_point: &Vec3) -> Option<Vec3> {
    let v = (end - start).xy();
    let w = (ref_point - start).xy();

    let c2 = v.dot(&v);
    if c2 < EPSILON {
        return None;
    }

    let b = w.dot(&v) / c2;
    if (0.0..=1.0).contains(&b) {
        Some(start + (end - start) * b)
    } else {
        None
    }
}

fn planar_distance(a: &Vec3, b: &Vec3) -> f64 {
    (a.xy() - b.xy()).norm()
}
