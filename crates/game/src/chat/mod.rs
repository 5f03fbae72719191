use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat request timed out")]
    Timeout,
    #[error("Chat backend unreachable: {0}")]
    Transport(String),
    #[error("Malformed chat reply: {0}")]
    Parse(String),
}

/// Produces a reply for a prompt. Deadlines are enforced by the queue.
pub trait ChatBackend: Send + Sync + 'static {
    fn request(&self, prompt: String) -> impl Future<Output = Result<String, ChatError>> + Send;
}

pub type ReplyCallback = Box<dyn FnOnce(String) + Send>;

struct ChatRequest {
    prompt: String,
    deadline: Instant,
    callback: ReplyCallback,
}

/// Worker settings shared by every request in a queue.
#[derive(Debug, Clone)]
pub struct ChatPolicy {
    /// Delivered when the backend fails. A `{}` is replaced by the error.
    pub fallback: String,
    /// Pause after each request that reached the backend.
    pub cooldown: Duration,
}

impl ChatPolicy {
    pub fn new(fallback: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            fallback: fallback.into(),
            cooldown,
        }
    }

    fn fallback_for(&self, err: &ChatError) -> String {
        self.fallback.replace("{}", &err.to_string())
    }
}

/// Bounded single-consumer queue in front of a chat backend.
pub struct ChatQueue {
    sender: Option<mpsc::Sender<ChatRequest>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ChatQueue {
    pub fn spawn<B: ChatBackend>(
        handle: &Handle,
        backend: B,
        capacity: usize,
        policy: ChatPolicy,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = handle.spawn(run_worker(backend, receiver, shutdown.clone(), policy));

        Self {
            sender: Some(sender),
            shutdown,
            worker: Some(worker),
        }
    }

    /// Never blocks. Returns false when the request was dropped.
    pub fn submit(&self, prompt: String, timeout: Duration, callback: ReplyCallback) -> bool {
        if self.is_shutdown() {
            return false;
        }
        let Some(sender) = &self.sender else {
            return false;
        };

        let request = ChatRequest {
            prompt,
            deadline: Instant::now() + timeout,
            callback,
        };
        match sender.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Chat queue full, dropping request");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("Chat worker stopped, dropping request");
                false
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stops the worker after the request it is currently running.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.sender = None;
    }

    pub async fn join(mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl Drop for ChatQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker<B: ChatBackend>(
    backend: B,
    mut receiver: mpsc::Receiver<ChatRequest>,
    shutdown: Arc<AtomicBool>,
    policy: ChatPolicy,
) {
    while let Some(request) = receiver.recv().await {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        if Instant::now() >= request.deadline {
            log::debug!("Chat request expired before it was sent");
            continue;
        }

        match tokio::time::timeout_at(request.deadline, backend.request(request.prompt)).await {
            Ok(Ok(reply)) => (request.callback)(reply),
            Ok(Err(err)) => {
                log::warn!("Chat backend failed: {}", err);
                (request.callback)(policy.fallback_for(&err));
            }
            Err(_) => log::debug!("Chat request dropped at its deadline"),
        }

        if !policy.cooldown.is_zero() {
            tokio::time::sleep(policy.cooldown).await;
        }
    }
    log::debug!("Chat worker stopped");
}
