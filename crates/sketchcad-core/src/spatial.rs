//! 空间索引
//!
//! 基于轴对齐包围盒的层次包围体（BVH），支持：
//! - 点查询（包含该点的所有实体）
//! - 框查询（与矩形相交的所有实体）
//!
//! 每层沿包围盒最长轴按中位数二分，叶子最多保存 2 个条目。
//! 索引不支持增量更新，场景变化后整体重建。

use crate::id::EntityId;
use crate::math::{Aabb, Vec3};
use crate::scene::SceneGraph;

/// 叶子节点的最大条目数
const LEAF_SIZE: usize = 2;

/// 索引条目
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialItem {
    /// 实体在场景中的顺序，用于稳定排序查询结果
    pub order: usize,
    pub id: EntityId,
    pub bounds: Aabb,
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        bounds: Aabb,
        items: Vec<SpatialItem>,
    },
    Branch {
        bounds: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Branch { bounds, .. } => bounds,
        }
    }

    fn build(mut items: Vec<SpatialItem>) -> Option<Self> {
        let bounds = items
            .iter()
            .map(|item| item.bounds)
            .reduce(|acc, b| acc.union(&b))?;

        if items.len() <= LEAF_SIZE {
            return Some(BvhNode::Leaf { bounds, items });
        }

        let axis = bounds.longest_axis();
        items.sort_by(|a, b| {
            a.bounds.center()[axis]
                .total_cmp(&b.bounds.center()[axis])
                .then(a.order.cmp(&b.order))
        });
        let right_items = items.split_off(items.len() / 2);

        match (Self::build(items), Self::build(right_items)) {
            (Some(left), Some(right)) => Some(BvhNode::Branch {
                bounds,
                left: Box::new(left),
                right: Box::new(right),
            }),
            (Some(node), None) | (None, Some(node)) => Some(node),
            (None, None) => None,
        }
    }

    fn collect<'a>(
        &'a self,
        hit_node: &impl Fn(&Aabb) -> bool,
        out: &mut Vec<&'a SpatialItem>,
    ) {
        if !hit_node(self.bounds()) {
            return;
        }
        match self {
            BvhNode::Leaf { items, .. } => {
                out.extend(items.iter().filter(|item| hit_node(&item.bounds)));
            }
            BvhNode::Branch { left, right, .. } => {
                left.collect(hit_node, out);
                right.collect(hit_node, out);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// 层次包围体
#[derive(Debug, Default)]
pub struct Bvh {
    root: Option<BvhNode>,
    len: usize,
}

impl Bvh {
    /// 由条目构建
    pub fn build(items: Vec<SpatialItem>) -> Self {
        let len = items.len();
        Self {
            root: BvhNode::build(items),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 树的深度（空树为 0）
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::depth)
    }

    /// 包含该点的所有条目，按场景顺序
    pub fn query_point(&self, point: &Vec3) -> Vec<&SpatialItem> {
        self.query(|b| b.contains_point(point))
    }

    /// 与框相交的所有条目，按场景顺序
    pub fn query_box(&self, query: &Aabb) -> Vec<&SpatialItem> {
        self.query(|b| b.intersects(query))
    }

    fn query(&self, hit: impl Fn(&Aabb) -> bool) -> Vec<&SpatialItem> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect(&hit, &mut out);
        }
        out.sort_by_key(|item| item.order);
        out
    }
}

/// 场景的空间索引
///
/// 只索引可见且有几何、能解析出包围盒的实体。
#[derive(Debug, Default)]
pub struct SpatialIndex {
    bvh: Bvh,
}

impl SpatialIndex {
    /// 从场景快照构建
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let items = scene
            .entities
            .iter()
            .enumerate()
            .filter(|(_, entity)| scene.is_visible(entity))
            .filter_map(|(order, entity)| {
                scene.world_bounds(entity).map(|bounds| SpatialItem {
                    order,
                    id: entity.id.clone(),
                    bounds,
                })
            })
            .collect();

        Self {
            bvh: Bvh::build(items),
        }
    }

    pub fn len(&self) -> usize {
        self.bvh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }

    /// 点击测试：查找包围盒包含该点的所有实体
    pub fn query_point(&self, point: &Vec3) -> Vec<EntityId> {
        self.bvh
            .query_point(point)
            .into_iter()
            .map(|item| item.id.clone())
            .collect()
    }

    /// 范围查询：查找包围盒与框相交的所有实体
    pub fn query_box(&self, query: &Aabb) -> Vec<EntityId> {
        self.bvh
            .query_box(query)
            .into_iter()
            .map(|item| item.id.clone())
            .collect()
    }

    /// 查找包围盒中心距离该点最近的实体（XY 平面）
    pub fn query_nearest(&self, point: &Vec3, max_distance: f64) -> Option<EntityId> {
        let search = Aabb::from_center_half_extents(
            *point,
            Vec3::new(max_distance, max_distance, f64::INFINITY),
        );

        self.bvh
            .query_box(&search)
            .into_iter()
            .map(|item| {
                let c = item.bounds.center();
                let d = ((c.x - point.x).powi(2) + (c.y - point.y).powi(2)).sqrt();
                (item, d)
            })
            .filter(|(_, d)| *d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(item, _)| item.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(order: usize, min: (f64, f64), max: (f64, f64)) -> SpatialItem {
        SpatialItem {
            order,
            id: EntityId::new(format!("e{order}")),
            bounds: Aabb::new(Vec3::new(min.0, min.1, 0.0), Vec3::new(max.0, max.1, 0.0)),
        }
    }

    fn grid(n: usize) -> Vec<SpatialItem> {
        (0..n)
            .map(|i| {
                let x = (i % 10) as f64 * 3.0;
                let y = (i / 10) as f64 * 3.0;
                item(i, (x, y), (x + 2.0, y + 2.0))
            })
            .collect()
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = Bvh::build(Vec::new());
        assert!(bvh.is_empty());
        assert_eq!(bvh.depth(), 0);
        assert!(bvh.query_point(&Vec3::zeros()).is_empty());
    }

    #[test]
    fn test_small_sets_stay_in_one_leaf() {
        let bvh = Bvh::build(grid(2));
        assert_eq!(bvh.depth(), 1);
        let bvh = Bvh::build(grid(3));
        assert_eq!(bvh.depth(), 2);
    }

    #[test]
    fn test_query_point_hits_only_containing_item() {
        let bvh = Bvh::build(grid(50));
        for i in 0..50 {
            let x = (i % 10) as f64 * 3.0 + 1.0;
            let y = (i / 10) as f64 * 3.0 + 1.0;
            let hits = bvh.query_point(&Vec3::new(x, y, 0.0));
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].order, i);
        }
        // 格子之间的空隙
        assert!(bvh.query_point(&Vec3::new(2.5, 2.5, 0.0)).is_empty());
    }

    #[test]
    fn test_query_box_matches_linear_scan() {
        let items = grid(37);
        let bvh = Bvh::build(items.clone());
        let query = Aabb::new(Vec3::new(4.0, 1.0, -1.0), Vec3::new(13.0, 7.5, 1.0));

        let expected: Vec<usize> = items
            .iter()
            .filter(|i| i.bounds.intersects(&query))
            .map(|i| i.order)
            .collect();
        let actual: Vec<usize> = bvh.query_box(&query).iter().map(|i| i.order).collect();
        assert_eq!(actual, expected);
        assert!(!actual.is_empty());
    }

    #[test]
    fn test_overlapping_items_returned_in_scene_order() {
        let items = vec![
            item(0, (0.0, 0.0), (10.0, 10.0)),
            item(1, (20.0, 0.0), (30.0, 10.0)),
            item(2, (4.0, 4.0), (6.0, 6.0)),
        ];
        let bvh = Bvh::build(items);
        let hits: Vec<usize> = bvh
            .query_point(&Vec3::new(5.0, 5.0, 0.0))
            .iter()
            .map(|i| i.order)
            .collect();
        assert_eq!(hits, vec![0, 2]);
    }
}
