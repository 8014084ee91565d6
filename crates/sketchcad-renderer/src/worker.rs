//! 后台缓冲区构建
//!
//! 每次构建启动一个独立的工作任务，通过 mpsc 邮箱发送请求、oneshot 接收应答。
//! 结果以二进制帧传回（所有权转移，不做 JSON 复制）。超时后中止工作任务，
//! 这是唯一的取消方式。并发构建数由信号量限制，许可随请求交给阻塞构建，
//! 构建真正结束时才释放，超时放弃的构建同样占用名额。

use crate::buffers::{build_geometry_buffers, GeometryBuffers};
use crate::error::{BufferError, WorkerError};
use crate::wire;
use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};
use sketchcad_core::scene::SceneGraph;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// 发给工作任务的请求
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Build { scene: Arc<SceneGraph> },
}

/// 工作任务的应答
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    /// 二进制帧，见 [`crate::wire`]
    Built { payload: Vec<u8> },
    Error { message: String },
}

struct Envelope {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerResponse>,
    permit: OwnedSemaphorePermit,
}

/// 在工作线程上把场景编码为二进制帧的函数
pub type BuildFn = Arc<dyn Fn(&SceneGraph) -> Result<Vec<u8>, String> + Send + Sync>;

fn default_build_fn() -> BuildFn {
    Arc::new(|scene| {
        let buffers = build_geometry_buffers(scene).map_err(|e| e.to_string())?;
        wire::encode(&buffers).map_err(|e| e.to_string())
    })
}

/// 后台构建器
#[derive(Clone)]
pub struct BufferWorker {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    build_fn: BuildFn,
}

impl BufferWorker {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self::with_build_fn(max_concurrent, timeout, default_build_fn())
    }

    /// 使用自定义构建函数
    pub fn with_build_fn(max_concurrent: usize, timeout: Duration, build_fn: BuildFn) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
            build_fn,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 当前空闲的构建名额
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 在后台构建缓冲区
    pub async fn build(&self, scene: Arc<SceneGraph>) -> Result<GeometryBuffers, WorkerError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Disconnected)?;

        let (mut mailbox, inbox) = mpsc::channel(1);
        let worker = tokio::spawn(run_worker(inbox, self.build_fn.clone()));

        let (reply, response) = oneshot::channel();
        let sent = mailbox
            .send(Envelope {
                request: WorkerRequest::Build { scene },
                reply,
                permit,
            })
            .await;
        if sent.is_err() {
            worker.abort();
            return Err(WorkerError::Disconnected);
        }
        // 关闭邮箱，工作任务处理完这一条后退出
        drop(mailbox);

        let response = match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(WorkerError::Disconnected),
            Err(_) => {
                worker.abort();
                let ms = self.timeout.as_millis() as u64;
                warn!("Buffer worker timed out after {} ms", ms);
                return Err(WorkerError::Timeout(ms));
            }
        };

        match response {
            WorkerResponse::Built { payload } => {
                debug!("Buffer worker returned {} bytes", payload.len());
                Ok(wire::decode(&payload)?)
            }
            WorkerResponse::Error { message } => Err(WorkerError::Remote(message)),
        }
    }

    /// 后台构建失败时退回到当前线程构建
    pub async fn build_or_inline(&self, scene: Arc<SceneGraph>) -> Result<GeometryBuffers, BufferError> {
        match self.build(Arc::clone(&scene)).await {
            Ok(buffers) => Ok(buffers),
            Err(e) => {
                warn!("Falling back to inline buffer build: {}", e);
                build_geometry_buffers(&scene)
            }
        }
    }
}

async fn run_worker(mut inbox: mpsc::Receiver<Envelope>, build_fn: BuildFn) {
    while let Some(Envelope {
        request,
        reply,
        permit,
    }) = inbox.next().await
    {
        let response = match request {
            WorkerRequest::Build { scene } => {
                let build_fn = build_fn.clone();
                let build = move || {
                    let _permit = permit;
                    build_fn(scene.as_ref())
                };
                match tokio::task::spawn_blocking(build).await {
                    Ok(Ok(payload)) => WorkerResponse::Built { payload },
                    Ok(Err(message)) => WorkerResponse::Error { message },
                    Err(e) => WorkerResponse::Error {
                        message: format!("Build task panicked: {}", e),
                    },
                }
            }
        };
        // 调用方已超时放弃时发送失败，忽略即可
        let _ = reply.send(response);
    }
}
