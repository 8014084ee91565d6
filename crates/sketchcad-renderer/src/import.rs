//! STEP 导入结果适配
//!
//! STEP 文件由外部几何服务三角化，这里只解析服务返回的 JSON，
//! 转换为可直接渲染的三角形与线段缓冲区。结果独立于场景图。

use crate::buffers::{IndexBuffer, MeshBuffers};
use crate::error::BufferError;
use serde::{Deserialize, Serialize};
use sketchcad_core::id::AssetId;
use sketchcad_core::scene::{IndexFormat, Topology};
use thiserror::Error;

/// 导入错误
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Position array of {name} has {len} values, not a multiple of 3")]
    InvalidPositions { name: String, len: usize },

    #[error("Index {index} of {name} is out of range for {vertices} vertices")]
    IndexOutOfRange {
        name: String,
        index: u32,
        vertices: usize,
    },

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// 模型包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelBounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// `POST /api/step/import` 的应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub model_id: String,
    pub bounds: Option<ModelBounds>,
    pub mesh_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMesh {
    pub positions: Vec<f32>,
    #[serde(default)]
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEdge {
    pub positions: Vec<f32>,
}

/// `GET /api/step/models/{id}` 的应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepModel {
    pub bounds: Option<ModelBounds>,
    #[serde(default)]
    pub meshes: Vec<ModelMesh>,
    #[serde(default)]
    pub edges: Vec<ModelEdge>,
}

/// 可渲染的导入结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedModel {
    pub bounds: Option<ModelBounds>,
    pub faces: Vec<MeshBuffers>,
    pub edges: Vec<MeshBuffers>,
}

impl StepModel {
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 转换为渲染缓冲区
    pub fn into_buffers(self) -> Result<ImportedModel, ImportError> {
        let faces = self
            .meshes
            .into_iter()
            .enumerate()
            .map(|(i, mesh)| {
                let name = format!("mesh {i}");
                let vertices = vertex_count(&name, &mesh.positions)?;
                if let Some(&index) = mesh.indices.iter().find(|&&index| index as usize >= vertices) {
                    return Err(ImportError::IndexOutOfRange {
                        name,
                        index,
                        vertices,
                    });
                }
                to_buffers(&name, mesh.positions, mesh.indices, Topology::Triangles)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, edge)| {
                let name = format!("edge {i}");
                let vertices = vertex_count(&name, &edge.positions)? as u32;
                // 折线：相邻点两两成段，不闭合
                let indices = (1..vertices).flat_map(|k| [k - 1, k]).collect();
                to_buffers(&name, edge.positions, indices, Topology::Lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ImportedModel {
            bounds: self.bounds,
            faces,
            edges,
        })
    }
}

fn vertex_count(name: &str, positions: &[f32]) -> Result<usize, ImportError> {
    if positions.len() % 3 != 0 {
        return Err(ImportError::InvalidPositions {
            name: name.to_string(),
            len: positions.len(),
        });
    }
    Ok(positions.len() / 3)
}

fn to_buffers(
    name: &str,
    positions: Vec<f32>,
    indices: Vec<u32>,
    topology: Topology,
) -> Result<MeshBuffers, ImportError> {
    let vertices = u32::try_from(positions.len() / 3).unwrap_or(u32::MAX);
    let format = IndexFormat::for_vertex_count(vertices);
    let indices = IndexBuffer::encode(&AssetId::new(name), indices, format)?;
    Ok(MeshBuffers {
        positions,
        indices,
        topology,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "bounds": {"min": [0, 0, 0], "max": [1, 1, 0]},
        "meshes": [
            {"positions": [0,0,0, 1,0,0, 1,1,0], "normals": [0,0,1, 0,0,1, 0,0,1], "indices": [0,1,2]}
        ],
        "edges": [
            {"positions": [0,0,0, 1,0,0, 1,1,0]}
        ]
    }"#;

    #[test]
    fn test_model_to_buffers() {
        let model = StepModel::from_json(MODEL).unwrap().into_buffers().unwrap();
        assert_eq!(model.faces.len(), 1);
        assert_eq!(model.faces[0].topology, Topology::Triangles);
        assert_eq!(model.faces[0].indices, IndexBuffer::U16(vec![0, 1, 2]));

        assert_eq!(model.edges.len(), 1);
        assert_eq!(model.edges[0].topology, Topology::Lines);
        assert_eq!(model.edges[0].indices.to_u32(), vec![0, 1, 1, 2]);
        assert_eq!(model.bounds.unwrap().max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_import_summary() {
        let json = r#"{"modelId": "abc", "bounds": null, "meshCount": 3}"#;
        let summary: ImportSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.model_id, "abc");
        assert_eq!(summary.mesh_count, 3);
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let json = r#"{"bounds": null, "meshes": [{"positions": [0,0,0], "indices": [0,0,5]}]}"#;
        let err = StepModel::from_json(json).unwrap().into_buffers().unwrap_err();
        assert!(matches!(err, ImportError::IndexOutOfRange { index: 5, .. }));
    }

    #[test]
    fn test_rejects_ragged_positions() {
        let json = r#"{"bounds": null, "edges": [{"positions": [0,0]}]}"#;
        let err = StepModel::from_json(json).unwrap().into_buffers().unwrap_err();
        assert!(matches!(err, ImportError::InvalidPositions { len: 2, .. }));
    }
}
