//! 场景到渲染批次的桥接
//!
//! 按共享的网格把实体分组，每组输出一块实例矩阵（每个实体 16 个 f32，列主序）。

use sketchcad_core::id::{AssetId, EntityId};
use sketchcad_core::scene::SceneGraph;

/// 共享同一网格的实体组
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBatch {
    pub mesh: AssetId,
    pub entities: Vec<EntityId>,
    /// 扁平化的实例矩阵
    pub instances: Vec<f32>,
}

impl RenderBatch {
    pub fn instance_count(&self) -> usize {
        self.instances.len() / 16
    }
}

/// 按网格首次出现的顺序分组，隐藏图层上的实体不参与渲染
pub fn collect_batches(scene: &SceneGraph) -> Vec<RenderBatch> {
    let mut batches: Vec<RenderBatch> = Vec::new();

    for entity in &scene.entities {
        if !scene.is_visible(entity) {
            continue;
        }
        let Some(geometry) = scene.geometry_of(entity) else {
            continue;
        };

        let matrix = scene.world_matrix(entity);
        let instance = matrix.as_slice().iter().map(|&v| v as f32);

        match batches.iter_mut().find(|b| b.mesh == geometry.mesh) {
            Some(batch) => {
                batch.entities.push(entity.id.clone());
                batch.instances.extend(instance);
            }
            None => batches.push(RenderBatch {
                mesh: geometry.mesh.clone(),
                entities: vec![entity.id.clone()],
                instances: instance.collect(),
            }),
        }
    }

    batches
}
