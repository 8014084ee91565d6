//! 编辑器配置
//!
//! 从 JSON 文件加载，缺省字段使用默认值：
//!
//! ```json
//! {"id_prefix": "doc", "snap_tolerance": 0.5, "log_level": "debug"}
//! ```

use serde::{Deserialize, Serialize};
use sketchcad_core::scene::{Axis, Unit};
use sketchcad_renderer::BufferWorker;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 编辑器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// 标识符前缀
    pub id_prefix: String,
    pub scene_name: String,
    pub unit: Unit,
    pub up_axis: Axis,
    /// 捕捉容差（世界单位）
    pub snap_tolerance: f64,
    /// 后台构建超时（毫秒）
    pub worker_timeout_ms: u64,
    pub max_concurrent_builds: usize,
    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            id_prefix: "scene".to_string(),
            scene_name: "Untitled".to_string(),
            unit: Unit::default(),
            up_axis: Axis::default(),
            snap_tolerance: 0.5,
            worker_timeout_ms: 5000,
            max_concurrent_builds: 2,
            log_level: "info".to_string(),
        }
    }
}

impl EditorConfig {
    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// 日志级别，无法识别时为 INFO
    pub fn tracing_level(&self) -> Level {
        Level::from_str(&self.log_level).unwrap_or(Level::INFO)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    /// 按配置创建后台构建器
    pub fn buffer_worker(&self) -> BufferWorker {
        BufferWorker::new(self.max_concurrent_builds, self.worker_timeout())
    }
}
