//! SketchCAD 渲染侧
//!
//! 核心引擎输出的消费者：
//! - `buffers`: 从场景快照合成顶点/索引缓冲区
//! - `worker`: 在后台任务中构建缓冲区，带超时
//! - `wire`: 后台构建结果的二进制帧
//! - `batch`: 按网格分组的实例矩阵
//! - `backend`: GPU 后端契约与无界面统计后端
//! - `import`: STEP 导入服务应答的适配

pub mod backend;
pub mod batch;
pub mod buffers;
pub mod error;
pub mod import;
pub mod wire;
pub mod worker;

pub use backend::{submit, view_projection, RenderBackend, RenderStats, StatsBackend, ViewProjection};
pub use batch::{collect_batches, RenderBatch};
pub use buffers::{build_geometry_buffers, GeometryBuffers, IndexBuffer, MeshBuffers};
pub use error::{BufferError, WireError, WorkerError};
pub use worker::BufferWorker;
