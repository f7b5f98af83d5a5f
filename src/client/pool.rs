//! Pooling of open writers.
//!
//! Delivery depends on pooling only through [`WriterPool`]: borrow a writer,
//! then either give it back after a successful write or destroy it after a
//! failure. [`BoundedPool`] is the in-process implementation used by default.

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
    time::timeout,
};

use super::{
    PoolConfig,
    WhenExhausted,
    error::PoolError,
    transport::{SyslogWriter, WriterFactory},
};

/// A writer on loan from a pool.
pub struct PooledWriter {
    writer: Box<dyn SyslogWriter>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledWriter {
    /// Wrap a writer that does not count against any pool limit.
    #[must_use]
    pub fn unpooled(writer: Box<dyn SyslogWriter>) -> Self {
        Self {
            writer,
            permit: None,
        }
    }

    pub fn writer(&mut self) -> &mut dyn SyslogWriter { self.writer.as_mut() }

    fn into_inner(self) -> Box<dyn SyslogWriter> { self.writer }
}

impl fmt::Debug for PooledWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledWriter")
            .field("limited", &self.permit.is_some())
            .finish_non_exhaustive()
    }
}

/// Borrow, return and destroy contract for writer pools.
#[async_trait]
pub trait WriterPool: Send + Sync {
    /// Take a writer, opening one if none is idle.
    async fn borrow(&self) -> Result<PooledWriter, PoolError>;

    /// Return a healthy writer for reuse.
    async fn give_back(&self, writer: PooledWriter);

    /// Close a writer that failed and release its slot.
    async fn destroy(&self, writer: PooledWriter);

    /// Close idle writers and refuse further borrows.
    async fn close(&self);
}

/// Pool limiting borrowed writers with a semaphore.
pub struct BoundedPool {
    factory: Arc<dyn WriterFactory>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn SyslogWriter>>>,
    closed: AtomicBool,
}

impl BoundedPool {
    #[must_use]
    pub fn new(factory: Arc<dyn WriterFactory>, config: PoolConfig) -> Self {
        let config = config.normalized();
        Self {
            factory,
            permits: Arc::new(Semaphore::new(config.max_active)),
            config,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Writers currently waiting for reuse.
    #[must_use]
    pub fn idle_count(&self) -> usize { self.idle().len() }

    /// Writers that may still be borrowed before the limit applies.
    #[must_use]
    pub fn available(&self) -> usize { self.permits.available_permits() }

    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn SyslogWriter>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn permit(&self) -> Result<Option<OwnedSemaphorePermit>, PoolError> {
        let permits = Arc::clone(&self.permits);
        match self.config.when_exhausted {
            WhenExhausted::Block => {
                let acquire = permits.acquire_owned();
                let permit = match self.config.max_wait {
                    Some(wait) => timeout(wait, acquire).await.map_err(|_| PoolError::Exhausted)?,
                    None => acquire.await,
                };
                permit.map(Some).map_err(|_| PoolError::Closed)
            }
            WhenExhausted::Fail => match permits.try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(TryAcquireError::NoPermits) => Err(PoolError::Exhausted),
                Err(TryAcquireError::Closed) => Err(PoolError::Closed),
            },
            WhenExhausted::Grow => match permits.try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(TryAcquireError::NoPermits) => Ok(None),
                Err(TryAcquireError::Closed) => Err(PoolError::Closed),
            },
        }
    }

    fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}

async fn close_writer(mut writer: Box<dyn SyslogWriter>) {
    if let Err(e) = writer.close().await {
        tracing::debug!(error = %e, "failed to close pooled writer");
    }
}

#[async_trait]
impl WriterPool for BoundedPool {
    async fn borrow(&self) -> Result<PooledWriter, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let permit = self.permit().await?;
        let idle = self.idle().pop();
        let writer = match idle {
            Some(writer) => writer,
            None => self.factory.open().await.map_err(PoolError::Create)?,
        };
        Ok(PooledWriter {
            writer,
            permit,
        })
    }

    async fn give_back(&self, writer: PooledWriter) {
        let writer = writer.into_inner();
        let rejected = {
            let mut idle = self.idle();
            if self.is_closed() || idle.len() >= self.config.max_idle {
                Some(writer)
            } else {
                idle.push(writer);
                None
            }
        };
        if let Some(writer) = rejected {
            close_writer(writer).await;
        }
    }

    async fn destroy(&self, writer: PooledWriter) { close_writer(writer.into_inner()).await; }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
        let idle = std::mem::take(&mut *self.idle());
        for writer in idle {
            close_writer(writer).await;
        }
    }
}

impl fmt::Debug for BoundedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedPool")
            .field("config", &self.config)
            .field("available", &self.available())
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Counting {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    struct Noop(Arc<AtomicUsize>);

    #[async_trait]
    impl SyslogWriter for Noop {
        async fn write(&mut self, _message: &[u8]) -> io::Result<()> { Ok(()) }

        async fn close(&mut self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl WriterFactory for Counting {
        async fn open(&self) -> io::Result<Box<dyn SyslogWriter>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Noop(Arc::clone(&self.closed))))
        }
    }

    fn pool(config: PoolConfig) -> (Arc<Counting>, BoundedPool) {
        let factory = Arc::new(Counting::default());
        let pool = BoundedPool::new(Arc::clone(&factory) as Arc<dyn WriterFactory>, config);
        (factory, pool)
    }

    #[tokio::test]
    async fn returned_writers_are_reused() {
        let (factory, pool) = pool(PoolConfig::default());
        let writer = pool.borrow().await.expect("borrow");
        pool.give_back(writer).await;
        let _writer = pool.borrow().await.expect("borrow");
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn destroyed_writers_are_closed_and_replaced() {
        let (factory, pool) = pool(PoolConfig::default());
        let writer = pool.borrow().await.expect("borrow");
        pool.destroy(writer).await;
        let _writer = pool.borrow().await.expect("borrow");
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fail_policy_rejects_when_saturated() {
        let (_, pool) = pool(PoolConfig::default().max_active(1).when_exhausted(WhenExhausted::Fail));
        let _held = pool.borrow().await.expect("borrow");
        assert!(matches!(pool.borrow().await, Err(PoolError::Exhausted)));
    }

    #[tokio::test]
    async fn grow_policy_exceeds_the_limit() {
        let (factory, pool) = pool(PoolConfig::default().max_active(1).when_exhausted(WhenExhausted::Grow));
        let _first = pool.borrow().await.expect("borrow");
        let _second = pool.borrow().await.expect("borrow");
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn block_policy_times_out_after_max_wait() {
        let (_, pool) = pool(PoolConfig::default().max_active(1).max_wait(Duration::from_millis(50)));
        let _held = pool.borrow().await.expect("borrow");
        assert!(matches!(pool.borrow().await, Err(PoolError::Exhausted)));
    }

    #[tokio::test]
    async fn block_policy_waits_for_a_returned_writer() {
        let (_, pool) = pool(PoolConfig::default().max_active(1));
        let pool = Arc::new(pool);
        let held = pool.borrow().await.expect("borrow");
        let waiter = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.borrow().await.map(|_| ()) }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        pool.give_back(held).await;
        waiter.await.expect("join").expect("borrow after return");
    }

    #[rstest]
    #[case(WhenExhausted::Block)]
    #[case(WhenExhausted::Fail)]
    #[case(WhenExhausted::Grow)]
    #[tokio::test]
    async fn closed_pool_refuses_borrows(#[case] policy: WhenExhausted) {
        let (factory, pool) = pool(PoolConfig::default().when_exhausted(policy));
        let writer = pool.borrow().await.expect("borrow");
        pool.give_back(writer).await;
        pool.close().await;
        assert!(matches!(pool.borrow().await, Err(PoolError::Closed)));
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_writers_beyond_max_idle_are_closed() {
        let (factory, pool) = pool(PoolConfig::default().max_idle(1));
        let first = pool.borrow().await.expect("borrow");
        let second = pool.borrow().await.expect("borrow");
        pool.give_back(first).await;
        pool.give_back(second).await;
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }
}
