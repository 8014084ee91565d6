//! 渲染后端契约
//!
//! GPU 后端只需要实现 `set_mesh` / `set_instances` / `render` 三个调用，
//! 其余都由几何缓冲区和渲染批次提供。

use crate::batch::RenderBatch;
use crate::buffers::{GeometryBuffers, MeshBuffers};
use nalgebra::{Matrix4, Point3, Vector3};
use sketchcad_core::id::AssetId;
use std::collections::HashMap;
use tracing::debug;

/// 视图投影矩阵（列主序）
pub type ViewProjection = Matrix4<f32>;

/// 渲染后端
pub trait RenderBackend {
    /// 上传网格缓冲区
    fn set_mesh(&mut self, mesh: &AssetId, buffers: &MeshBuffers);

    /// 设置某个网格的实例矩阵（每个实例 16 个 f32，列主序）
    fn set_instances(&mut self, mesh: &AssetId, instances: &[f32]);

    /// 绘制一帧
    fn render(&mut self, view_projection: &ViewProjection);
}

/// 把一次构建结果完整提交给后端并绘制
pub fn submit(
    backend: &mut dyn RenderBackend,
    buffers: &GeometryBuffers,
    batches: &[RenderBatch],
    view_projection: &ViewProjection,
) {
    for (id, mesh) in &buffers.meshes {
        backend.set_mesh(id, mesh);
    }
    for batch in batches {
        // 没有缓冲区的网格（来源未知）不绘制
        if buffers.get(&batch.mesh).is_some() {
            backend.set_instances(&batch.mesh, &batch.instances);
        }
    }
    backend.render(view_projection);
}

/// 透视投影与观察矩阵的乘积
pub fn view_projection(
    eye: &Vector3<f64>,
    target: &Vector3<f64>,
    up: &Vector3<f64>,
    fov_y: f64,
    aspect: f64,
    near: f64,
    far: f64,
) -> ViewProjection {
    let projection = Matrix4::new_perspective(aspect, fov_y, near, far);
    let view = Matrix4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), up);
    (projection * view).cast::<f32>()
}

/// 渲染统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub meshes: usize,
    pub vertices: usize,
    pub indices: usize,
    pub instances: usize,
    pub frames: usize,
}

/// 只统计上传量的无界面后端
#[derive(Debug, Default)]
pub struct StatsBackend {
    meshes: HashMap<AssetId, (usize, usize)>,
    instances: HashMap<AssetId, usize>,
    frames: usize,
    last_view_projection: Option<ViewProjection>,
}

impl StatsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            meshes: self.meshes.len(),
            vertices: self.meshes.values().map(|(v, _)| v).sum(),
            indices: self.meshes.values().map(|(_, i)| i).sum(),
            instances: self.instances.values().sum(),
            frames: self.frames,
        }
    }

    pub fn last_view_projection(&self) -> Option<&ViewProjection> {
        self.last_view_projection.as_ref()
    }
}

impl RenderBackend for StatsBackend {
    fn set_mesh(&mut self, mesh: &AssetId, buffers: &MeshBuffers) {
        self.meshes
            .insert(mesh.clone(), (buffers.vertex_count(), buffers.indices.len()));
    }

    fn set_instances(&mut self, mesh: &AssetId, instances: &[f32]) {
        self.instances.insert(mesh.clone(), instances.len() / 16);
    }

    fn render(&mut self, view_projection: &ViewProjection) {
        self.frames += 1;
        self.last_view_projection = Some(*view_projection);
        debug!(
            "Frame {}: {} meshes, {} instances",
            self.frames,
            self.meshes.len(),
            self.instances.values().sum::<usize>()
        );
    }
}
