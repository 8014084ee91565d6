//! 几何缓冲区生成
//!
//! 从网格资源的 `sourceUri` 与实体元数据中的图元参数合成 GPU 可用的
//! 顶点/索引缓冲区。纯函数：同一个快照总是生成逐字节相同的结果。

use crate::error::BufferError;
use rayon::prelude::*;
use sketchcad_core::id::AssetId;
use sketchcad_core::math::{Aabb, Vec3};
use sketchcad_core::primitive::{
    circle_points, line_loop_indices, rect_corners, Primitive, Profile, DEFAULT_CIRCLE_SEGMENTS,
};
use sketchcad_core::scene::{IndexFormat, MeshAsset, MeshSource, SceneGraph, Topology};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// 索引缓冲区，宽度由网格资源声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// 按声明的宽度编码，放不下时报错
    pub fn encode(mesh: &AssetId, indices: Vec<u32>, format: IndexFormat) -> Result<Self, BufferError> {
        match format {
            IndexFormat::Uint32 => Ok(IndexBuffer::U32(indices)),
            IndexFormat::Uint16 => indices
                .into_iter()
                .map(|index| {
                    u16::try_from(index).map_err(|_| BufferError::IndexOverflow {
                        mesh: mesh.clone(),
                        index,
                        bits: 16,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(IndexBuffer::U16),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            IndexBuffer::U16(_) => IndexFormat::Uint16,
            IndexBuffer::U32(_) => IndexFormat::Uint32,
        }
    }

    /// 展开为 u32，便于检查
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            IndexBuffer::U16(v) => v.iter().map(|&i| u32::from(i)).collect(),
            IndexBuffer::U32(v) => v.clone(),
        }
    }
}

/// 单个网格的缓冲区
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffers {
    /// xyz 交错排列
    pub positions: Vec<f32>,
    pub indices: IndexBuffer,
    pub topology: Topology,
}

impl MeshBuffers {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// 整个场景的缓冲区，按网格ID排序
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryBuffers {
    pub meshes: BTreeMap<AssetId, MeshBuffers>,
}

impl GeometryBuffers {
    pub fn get(&self, mesh: &AssetId) -> Option<&MeshBuffers> {
        self.meshes.get(mesh)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// 生成场景中所有可识别网格的缓冲区
pub fn build_geometry_buffers(scene: &SceneGraph) -> Result<GeometryBuffers, BufferError> {
    // 网格ID -> 第一个引用它的实体的图元参数
    let mut primitives: HashMap<&AssetId, &Primitive> = HashMap::new();
    for entity in &scene.entities {
        if let (Some(geometry), Some(primitive)) = (scene.geometry_of(entity), scene.primitive_of(entity)) {
            primitives.entry(&geometry.mesh).or_insert(primitive);
        }
    }

    let meshes = scene
        .assets
        .meshes
        .par_iter()
        .filter_map(|(id, mesh)| {
            build_mesh(mesh, primitives.get(id).copied())
                .transpose()
                .map(|result| result.map(|buffers| (id.clone(), buffers)))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    debug!(
        "Built buffers for {}/{} meshes",
        meshes.len(),
        scene.assets.meshes.len()
    );

    Ok(GeometryBuffers { meshes })
}

/// 生成单个网格，来源未知或缺少参数时返回 `None`
pub fn build_mesh(mesh: &MeshAsset, primitive: Option<&Primitive>) -> Result<Option<MeshBuffers>, BufferError> {
    let Some(source) = mesh.source() else {
        return Ok(None);
    };

    let synthesized = match (source, primitive) {
        (MeshSource::Cube, _) => Some(unit_cube()),
        (MeshSource::Line, Some(Primitive::Line { start, end })) => Some((
            vec![*start, *end],
            vec![0, 1],
            Topology::Lines,
        )),
        (MeshSource::Rect, Some(Primitive::Rect { center, width, height })) => {
            Some(line_loop(rect_corners(center, *width, *height).to_vec()))
        }
        (MeshSource::Rect, _) => mesh.bounds.map(|b| line_loop(rect_from_bounds(&b).to_vec())),
        (MeshSource::Circle, Some(Primitive::Circle { center, radius, segments })) => {
            Some(line_loop(circle_points(center, *radius, *segments)))
        }
        (MeshSource::Circle, _) => mesh.bounds.map(|b| {
            let radius = b.extents().x / 2.0;
            line_loop(circle_points(&b.center(), radius, DEFAULT_CIRCLE_SEGMENTS))
        }),
        (MeshSource::Extrude, Some(Primitive::Extrude { profile, height, .. })) => {
            Some(extrude(profile, *height))
        }
        _ => None,
    };

    let Some((points, indices, topology)) = synthesized else {
        warn!("Mesh {} has no usable parameters, skipping", mesh.id);
        return Ok(None);
    };

    let positions = points
        .iter()
        .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let indices = IndexBuffer::encode(&mesh.id, indices, mesh.index_format)?;

    Ok(Some(MeshBuffers {
        positions,
        indices,
        topology,
    }))
}

type Synthesized = (Vec<Vec3>, Vec<u32>, Topology);

fn line_loop(points: Vec<Vec3>) -> Synthesized {
    let indices = line_loop_indices(points.len() as u32);
    (points, indices, Topology::Lines)
}

fn rect_from_bounds(bounds: &Aabb) -> [Vec3; 4] {
    let size = bounds.extents();
    rect_corners(&bounds.center(), size.x, size.y)
}

/// 单位立方体（8 个顶点，12 个三角形）
fn unit_cube() -> Synthesized {
    let s = 0.5;
    let points = vec![
        Vec3::new(-s, -s, -s),
        Vec3::new(s, -s, -s),
        Vec3::new(s, s, -s),
        Vec3::new(-s, s, -s),
        Vec3::new(-s, -s, s),
        Vec3::new(s, -s, s),
        Vec3::new(s, s, s),
        Vec3::new(-s, s, s),
    ];
    let indices = vec![
        0, 1, 2, 2, 3, 0, // -Z
        4, 5, 6, 6, 7, 4, // +Z
        0, 4, 7, 7, 3, 0, // -X
        1, 5, 6, 6, 2, 1, // +X
        3, 2, 6, 6, 7, 3, // +Y
        0, 1, 5, 5, 4, 0, // -Y
    ];
    (points, indices, Topology::Triangles)
}

/// 拉伸体：XY 平面上的底环 N 个点 + z+height 处的顶环 N 个点，
/// 侧面四边形 + 上下扇形封口
///
/// 轮廓环为逆时针，正面按逆时针缠绕，法线朝外。
fn extrude(profile: &Profile, height: f64) -> Synthesized {
    let ring = profile.ring();
    let n = ring.len() as u32;
    let offset = Vec3::z() * height;

    let mut points = ring.clone();
    points.extend(ring.iter().map(|p| p + offset));

    let mut indices = Vec::with_capacity((12 * n).saturating_sub(12) as usize);
    for i in 0..n {
        let j = (i + 1) % n;
        indices.extend_from_slice(&[i, j, n + j, i, n + j, n + i]);
    }
    for k in 1..n.saturating_sub(1) {
        indices.extend_from_slice(&[0, k + 1, k]);
    }
    for k in 1..n.saturating_sub(1) {
        indices.extend_from_slice(&[n, n + k, n + k + 1]);
    }

    (points, indices, Topology::Triangles)
}
