//! 数学基础类型
//!
//! 基于 nalgebra 的三维向量与轴对齐包围盒（AABB）。
//! 场景中的所有坐标都以 `f64` 存储，GPU 缓冲区在生成时再转换为 `f32`。

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// 三维向量（位置、旋转欧拉角、缩放共用）
pub type Vec3 = Vector3<f64>;

/// 浮点比较容差
pub const EPSILON: f64 = 1e-10;

/// 检查向量的三个分量是否都是有限值
pub fn is_finite_vec(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// 由位置、欧拉角（弧度，XYZ 顺序）和缩放合成 4x4 变换矩阵
///
/// 矩阵按列主序存储，`as_slice()` 即为渲染器需要的 16 个浮点数。
pub fn compose_transform(position: &Vec3, rotation: &Vec3, scale: &Vec3) -> Matrix4<f64> {
    let rotation = Rotation3::from_euler_angles(rotation.x, rotation.y, rotation.z);
    Matrix4::new_translation(position)
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(scale)
}

pub fn identity_matrix() -> Matrix4<f64> {
    Matrix4::identity()
}

/// 纯平移矩阵
pub fn translation_matrix(v: &Vec3) -> Matrix4<f64> {
    Matrix4::new_translation(v)
}

/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// 由两个角点创建（自动按分量排序）
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// 退化为单点的包围盒
    pub fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// 由中心与半尺寸创建
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    /// 由点集创建，点集为空时返回 `None`
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::point(first), |acc, p| acc.include(&p)))
    }

    /// 扩展以包含指定点
    pub fn include(&self, p: &Vec3) -> Self {
        Self {
            min: self.min.inf(p),
            max: self.max.sup(p),
        }
    }

    /// 两个包围盒的并集
    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// 点是否在包围盒内（含边界）
    pub fn contains_point(&self, p: &Vec3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// 两个包围盒是否相交（含接触）
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// 最长轴的索引（0=X, 1=Y, 2=Z）
    pub fn longest_axis(&self) -> usize {
        let e = self.extents();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// 八个角点
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// 经矩阵变换后的包围盒（变换八个角点后重新求包围）
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Aabb {
        let corners = self.corners();
        let mut result = Aabb::point(matrix.transform_point(&corners[0].into()).coords);
        for corner in &corners[1..] {
            result = result.include(&matrix.transform_point(&(*corner).into()).coords);
        }
        result
    }

    /// 沿指定轴延伸（用于拉伸体的包围盒）
    pub fn extend_along(&self, axis: usize, amount: f64) -> Aabb {
        let mut offset = Vec3::zeros();
        offset[axis] = amount;
        let moved = Aabb {
            min: self.min + offset,
            max: self.max + offset,
        };
        self.union(&moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points_normalizes() {
        let bbox = Aabb::from_points([Vec3::new(2.0, -1.0, 0.0), Vec3::new(-3.0, 4.0, 1.0)]).unwrap();
        assert_eq!(bbox.min, Vec3::new(-3.0, -1.0, 0.0));
        assert_eq!(bbox.max, Vec3::new(2.0, 4.0, 1.0));
        assert!(Aabb::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_aabb_contains_and_intersects() {
        let a = Aabb::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 0.0));
        let b = Aabb::new(Vec3::new(2.0, 1.0, 0.0), Vec3::new(3.0, 3.0, 0.0));
        let c = Aabb::new(Vec3::new(5.0, 5.0, 0.0), Vec3::new(6.0, 6.0, 0.0));

        assert!(a.contains_point(&Vec3::new(1.0, 1.0, 0.0)));
        assert!(a.contains_point(&Vec3::new(2.0, 2.0, 0.0)));
        assert!(!a.contains_point(&Vec3::new(1.0, 1.0, 0.5)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_longest_axis() {
        let bbox = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 5.0, 2.0));
        assert_eq!(bbox.longest_axis(), 1);
    }

    #[test]
    fn test_transformed_by_translation() {
        let bbox = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 0.0));
        let m = compose_transform(
            &Vec3::new(5.0, 6.0, 7.0),
            &Vec3::zeros(),
            &Vec3::new(1.0, 1.0, 1.0),
        );
        let moved = bbox.transformed(&m);
        assert!((moved.min - Vec3::new(5.0, 6.0, 7.0)).norm() < EPSILON);
        assert!((moved.max - Vec3::new(6.0, 7.0, 7.0)).norm() < EPSILON);
    }

    #[test]
    fn test_compose_is_column_major() {
        let m = compose_transform(
            &Vec3::new(1.0, 2.0, 3.0),
            &Vec3::zeros(),
            &Vec3::new(2.0, 2.0, 2.0),
        );
        let flat = m.as_slice();
        assert_eq!(flat[0], 2.0);
        assert_eq!(&flat[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(flat[15], 1.0);
    }

    #[test]
    fn test_extend_along_up_axis() {
        let bbox = Aabb::new(Vec3::new(-1.0, -0.5, 0.0), Vec3::new(1.0, 0.5, 0.0));
        let extruded = bbox.extend_along(2, 3.0);
        assert_eq!(extruded.min.z, 0.0);
        assert_eq!(extruded.max.z, 3.0);
    }
}
