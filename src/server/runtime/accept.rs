//! TCP accept loop for the server runtime.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    dispatch::DispatchEngine,
    handler::Origin,
    server::{
        ExhaustedBehavior,
        connection::{ConnectionOptions, spawn_connection_task},
    },
    session::ConnectionId,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

/// Cap on concurrently open connections.
#[derive(Debug, Clone)]
pub(in crate::server) struct ConnectionLimit {
    pub permits: Arc<Semaphore>,
    pub behavior: ExhaustedBehavior,
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub connection: ConnectionOptions,
    pub limit: Option<ConnectionLimit>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

struct AcceptHandles<'a> {
    engine: &'a Arc<DispatchEngine>,
    options: &'a AcceptLoopOptions,
    next_id: AtomicU64,
}

/// Accepts incoming connections and spawns a task for each one.
///
/// Failures to accept trigger an exponential back-off governed by
/// `options.backoff`. With a connection limit configured the loop either
/// waits for a free slot before accepting or closes connections beyond the
/// limit straight away. The loop ends when `options.shutdown` is cancelled;
/// spawned tasks are tracked by `options.tracker`.
pub(in crate::server) async fn accept_loop<L>(
    listener: Arc<L>,
    engine: Arc<DispatchEngine>,
    options: AcceptLoopOptions,
) where
    L: AcceptListener + Send + Sync + 'static,
{
    let backoff = options.backoff.normalized();
    let mut delay = backoff.initial_delay;
    let handles = AcceptHandles {
        engine: &engine,
        options: &options,
        next_id: AtomicU64::new(1),
    };
    while let Some(next_delay) = accept_iteration(&listener, &handles, &backoff, delay).await {
        delay = next_delay;
    }
}

async fn accept_iteration<L>(
    listener: &Arc<L>,
    handles: &AcceptHandles<'_>,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener + Send + Sync + 'static,
{
    let shutdown = &handles.options.shutdown;
    let reserved = match &handles.options.limit {
        Some(limit) if limit.behavior == ExhaustedBehavior::Block => {
            let acquired = select! {
                biased;

                () = shutdown.cancelled() => return None,
                permit = Arc::clone(&limit.permits).acquire_owned() => permit,
            };
            Some(acquired.ok()?)
        }
        _ => None,
    };

    let accepted = select! {
        biased;

        () = shutdown.cancelled() => return None,
        res = listener.accept() => res,
    };

    match accepted {
        Ok((stream, peer)) => {
            let Some(permit) = admit(handles.options.limit.as_ref(), reserved) else {
                warn!("rejecting connection: active connection limit reached, peer_addr={peer}");
                drop(stream);
                return Some(backoff.initial_delay);
            };
            let id = ConnectionId::new(handles.next_id.fetch_add(1, Ordering::Relaxed));
            handles.engine.registry().prune();
            spawn_connection_task(
                stream,
                Origin::stream(id, peer),
                Arc::clone(handles.engine),
                handles.options,
                permit,
            );
            Some(backoff.initial_delay)
        }
        Err(e) => {
            let local_addr = listener.local_addr().ok();
            warn!("accept error: error={e:?}, local_addr={local_addr:?}");
            sleep(delay).await;
            Some(backoff.next_delay(delay))
        }
    }
}

/// Decide whether an accepted connection may proceed.
///
/// Returns `Some(None)` when no limit applies.
fn admit(
    limit: Option<&ConnectionLimit>,
    reserved: Option<OwnedSemaphorePermit>,
) -> Option<Option<OwnedSemaphorePermit>> {
    match (limit, reserved) {
        (_, Some(permit)) => Some(Some(permit)),
        (None, None) => Some(None),
        (Some(limit), None) => Arc::clone(&limit.permits).try_acquire_owned().ok().map(Some),
    }
}
