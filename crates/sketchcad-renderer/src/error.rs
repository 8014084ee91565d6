//! 渲染侧错误定义

use sketchcad_core::id::AssetId;
use thiserror::Error;

/// 缓冲区生成错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Index {index} of mesh {mesh} does not fit in {bits}-bit index buffer")]
    IndexOverflow { mesh: AssetId, index: u32, bits: u8 },

    #[error("Wire format error: {0}")]
    Wire(#[from] WireError),
}

/// 缓冲区二进制帧解码错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("Invalid magic number, not a geometry buffer frame")]
    InvalidMagic,

    #[error("Unsupported frame version: {0}")]
    UnsupportedVersion(u32),

    #[error("Unexpected end of frame at byte {0}")]
    Truncated(usize),

    #[error("Unknown topology tag: {0}")]
    UnknownTopology(u8),

    #[error("Unknown index width: {0}")]
    UnknownIndexWidth(u8),

    #[error("Mesh id is not valid UTF-8")]
    InvalidMeshId,

    #[error("Length {0} exceeds frame capacity")]
    TooLarge(usize),

    #[error("{0} trailing bytes after last mesh")]
    TrailingBytes(usize),
}

/// 后台构建错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("Worker did not respond within {0} ms")]
    Timeout(u64),

    #[error("Worker disconnected")]
    Disconnected,

    #[error("Worker error: {0}")]
    Remote(String),

    #[error("Malformed worker response: {0}")]
    MalformedResponse(String),
}

impl From<WireError> for WorkerError {
    fn from(e: WireError) -> Self {
        WorkerError::MalformedResponse(e.to_string())
    }
}
