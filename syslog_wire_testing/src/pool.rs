//! In-memory writer pool for exercising clients without sockets.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use syslog_wire::client::{
    PoolError,
    pool::{PooledWriter, WriterPool},
    transport::SyslogWriter,
};

/// Pool whose writers append to a shared list.
///
/// The first `failures` writes fail with a broken pipe, which lets tests
/// drive retries and backlog handling deterministically.
#[derive(Debug, Default)]
pub struct MemoryPool {
    failures: AtomicU32,
    written: Arc<Mutex<Vec<String>>>,
    borrowed: AtomicU32,
    destroyed: AtomicU32,
    closed: AtomicBool,
}

impl MemoryPool {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// A pool whose first `failures` writes fail.
    #[must_use]
    pub fn failing(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        })
    }

    /// Payloads written so far, in order.
    #[must_use]
    pub fn written(&self) -> Vec<String> { self.written.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    #[must_use]
    pub fn borrowed(&self) -> u32 { self.borrowed.load(Ordering::SeqCst) }

    #[must_use]
    pub fn destroyed(&self) -> u32 { self.destroyed.load(Ordering::SeqCst) }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}

struct MemoryWriter {
    fail: bool,
    written: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SyslogWriter for MemoryWriter {
    async fn write(&mut self, message: &[u8]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory writer failure"));
        }
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(String::from_utf8_lossy(message).into_owned());
        Ok(())
    }
}

#[async_trait]
impl WriterPool for MemoryPool {
    async fn borrow(&self) -> Result<PooledWriter, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        self.borrowed.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(PooledWriter::unpooled(Box::new(MemoryWriter {
            fail,
            written: Arc::clone(&self.written),
        })))
    }

    async fn give_back(&self, _writer: PooledWriter) {}

    async fn destroy(&self, _writer: PooledWriter) { self.destroyed.fetch_add(1, Ordering::SeqCst); }

    async fn close(&self) { self.closed.store(true, Ordering::SeqCst); }
}
