//! Moving formatted messages from the caller to a pooled writer.
//!
//! In [`DeliveryMode::Direct`] the caller's task performs the write,
//! retries included. In [`DeliveryMode::Queued`] the caller only enqueues and
//! a single worker task drains the queue. Either way a message that still
//! fails after `write_retries` extra attempts is handed to the backlog
//! handlers, surfaced to a direct caller, or dropped.

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::{Notify, mpsc},
    task::JoinHandle,
    time::timeout,
};

use super::{
    DeliveryConfig,
    DeliveryMode,
    backlog::BackLogChain,
    error::{ClientError, DeliveryError},
    pool::WriterPool,
};
use crate::{metrics, priority::Severity};

/// A formatted message waiting to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub severity: Severity,
    pub payload: String,
}

enum QueueTx {
    Bounded(mpsc::Sender<Outgoing>),
    Unbounded(mpsc::UnboundedSender<Outgoing>),
}

impl QueueTx {
    async fn send(&self, message: Outgoing) -> bool {
        match self {
            Self::Bounded(tx) => tx.send(message).await.is_ok(),
            Self::Unbounded(tx) => tx.send(message).is_ok(),
        }
    }
}

enum QueueRx {
    Bounded(mpsc::Receiver<Outgoing>),
    Unbounded(mpsc::UnboundedReceiver<Outgoing>),
}

impl QueueRx {
    async fn recv(&mut self) -> Option<Outgoing> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

fn queue(capacity: Option<usize>) -> (QueueTx, QueueRx) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
    }
}

struct Shared {
    pool: Arc<dyn WriterPool>,
    backlog: BackLogChain,
    write_retries: u32,
    throw_on_failure: bool,
    pending: AtomicUsize,
    drained: Notify,
}

impl Shared {
    async fn write_with_retries(&self, message: &Outgoing) -> Result<(), ClientError> {
        let attempts = self.write_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.write_once(message.payload.as_bytes()).await {
                Ok(()) => {
                    metrics::inc_messages_sent();
                    return Ok(());
                }
                Err(e) => e,
            };
            if attempt >= attempts {
                return Err(ClientError::Transport {
                    attempts,
                    source: error,
                });
            }
            metrics::inc_delivery_retries();
            tracing::debug!(attempt, attempts, error = %error, "retrying syslog write");
        }
    }

    async fn write_once(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut writer = self.pool.borrow().await?;
        match writer.writer().write(payload).await {
            Ok(()) => {
                self.pool.give_back(writer).await;
                Ok(())
            }
            Err(e) => {
                self.pool.destroy(writer).await;
                Err(e.into())
            }
        }
    }

    /// Record a message that exhausted its retries and hand it to the
    /// backlog handlers. Returns `true` when a handler took it.
    fn report(&self, message: &Outgoing, error: &ClientError) -> bool {
        metrics::inc_delivery_failures();
        tracing::warn!(severity = %message.severity, error = %error, "syslog message not delivered");
        if self.backlog.is_empty() {
            return false;
        }
        self.backlog.log(message.severity, &message.payload, &error.to_string());
        true
    }

    fn complete(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.drained.notify_waiters();
        }
    }

    /// Forget messages that will never be written and wake flush waiters.
    fn abandon_pending(&self) {
        self.pending.store(0, Ordering::Release);
        self.drained.notify_waiters();
    }
}

/// Queue, worker and retry logic between a client and its writer pool.
pub struct DeliveryPipeline {
    shared: Arc<Shared>,
    mode: DeliveryMode,
    max_shutdown_wait: Duration,
    shut_down: AtomicBool,
    queue: Mutex<Option<Arc<QueueTx>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryPipeline {
    /// Create a pipeline, spawning the worker when `config.mode` is queued.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Runtime`] if queued delivery is requested
    /// outside a tokio runtime.
    pub fn new(
        config: &DeliveryConfig,
        pool: Arc<dyn WriterPool>,
        backlog: BackLogChain,
        throw_on_failure: bool,
    ) -> Result<Self, ClientError> {
        let config = config.clone().normalized();
        let shared = Arc::new(Shared {
            pool,
            backlog,
            write_retries: config.write_retries,
            throw_on_failure,
            pending: AtomicUsize::new(0),
            drained: Notify::new(),
        });

        let (queue, worker) = match config.mode {
            DeliveryMode::Direct => (None, None),
            DeliveryMode::Queued => {
                let handle = Handle::try_current().map_err(|_| ClientError::Runtime)?;
                let (tx, rx) = queue(config.queue_capacity());
                let worker = handle.spawn(run_worker(Arc::clone(&shared), rx, config.poll_interval));
                (Some(Arc::new(tx)), Some(worker))
            }
        };

        Ok(Self {
            shared,
            mode: config.mode,
            max_shutdown_wait: config.max_shutdown_wait,
            shut_down: AtomicBool::new(false),
            queue: Mutex::new(queue),
            worker: Mutex::new(worker),
        })
    }

    #[must_use]
    pub fn mode(&self) -> DeliveryMode { self.mode }

    /// Messages enqueued but not yet written or failed.
    #[must_use]
    pub fn pending(&self) -> usize { self.shared.pending.load(Ordering::Acquire) }

    #[must_use]
    pub fn is_shut_down(&self) -> bool { self.shut_down.load(Ordering::Acquire) }

    /// Write or enqueue `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ShutDown`] after [`shutdown`](Self::shutdown).
    /// In direct mode, returns [`ClientError::Transport`] when every attempt
    /// failed, no backlog handler is registered and failures are configured
    /// to be surfaced.
    pub async fn deliver(&self, message: Outgoing) -> Result<(), ClientError> {
        if self.is_shut_down() {
            return Err(ClientError::ShutDown);
        }
        match self.mode {
            DeliveryMode::Direct => {
                let Err(error) = self.shared.write_with_retries(&message).await else {
                    return Ok(());
                };
                let handled = self.shared.report(&message, &error);
                if handled || !self.shared.throw_on_failure {
                    Ok(())
                } else {
                    Err(error)
                }
            }
            DeliveryMode::Queued => self.enqueue(message).await,
        }
    }

    async fn enqueue(&self, message: Outgoing) -> Result<(), ClientError> {
        let tx = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ClientError::ShutDown)?;
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(message).await {
            Ok(())
        } else {
            self.shared.complete();
            Err(ClientError::ShutDown)
        }
    }

    /// Wait until every enqueued message has been written or failed.
    pub async fn flush(&self) {
        loop {
            let drained = self.shared.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            drained.await;
        }
    }

    /// Stop accepting messages, drain the queue for up to
    /// `max_shutdown_wait`, then close every pooled writer.
    ///
    /// Later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.queue.lock().unwrap_or_else(PoisonError::into_inner).take());
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut worker) = worker {
            if timeout(self.max_shutdown_wait, &mut worker).await.is_err() {
                tracing::warn!(
                    pending = self.pending(),
                    wait_ms = self.max_shutdown_wait.as_millis(),
                    "delivery queue not drained before shutdown; dropping remaining messages"
                );
                worker.abort();
                self.shared.abandon_pending();
            }
        }
        self.shared.pool.close().await;
        self.shared.backlog.destroy();
    }
}

impl fmt::Debug for DeliveryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryPipeline")
            .field("mode", &self.mode)
            .field("pending", &self.pending())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Drain the queue until every sender is gone.
///
/// The worker wakes every `poll_interval` while idle.
async fn run_worker(shared: Arc<Shared>, mut rx: QueueRx, poll_interval: Duration) {
    loop {
        match timeout(poll_interval, rx.recv()).await {
            Ok(Some(message)) => {
                if let Err(error) = shared.write_with_retries(&message).await {
                    shared.report(&message, &error);
                }
                shared.complete();
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
    tracing::debug!("delivery worker stopped");
}
