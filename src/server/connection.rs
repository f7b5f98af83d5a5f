//! Per-connection task for the TCP server.

use std::{io, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use log::error;
use tokio::{net::TcpStream, select, sync::OwnedSemaphorePermit, time::timeout};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use super::{ServerConfig, runtime::AcceptLoopOptions};
use crate::{
    codec::DelimitedCodec,
    dispatch::DispatchEngine,
    event::SyslogEvent,
    handler::{HandlerError, Origin},
    metrics::{self, Transport},
    panic::format_panic,
};

/// Settings copied into every connection task.
#[derive(Clone, Debug)]
pub(super) struct ConnectionOptions {
    pub delimiter: Vec<u8>,
    pub max_frame_length: usize,
    pub idle_timeout: Option<Duration>,
    pub use_structured_data: bool,
}

impl ConnectionOptions {
    pub(super) fn from_config(config: &ServerConfig) -> Self {
        Self {
            delimiter: config.delimiter.clone(),
            max_frame_length: config.max_frame_length,
            idle_timeout: config.idle_timeout,
            use_structured_data: config.use_structured_data,
        }
    }
}

/// Spawn a task to process a single TCP connection, logging and discarding
/// any panics.
///
/// `permit` holds the connection's slot under the active connection limit
/// and is released when the task ends.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    origin: Origin,
    engine: Arc<DispatchEngine>,
    options: &AcceptLoopOptions,
    permit: Option<OwnedSemaphorePermit>,
) {
    let connection = options.connection.clone();
    let shutdown = options.shutdown.clone();
    let peer_addr = origin.peer;
    options.tracker.spawn(async move {
        let _permit = permit;
        metrics::inc_connections();
        let fut = AssertUnwindSafe(process_stream(stream, &origin, &engine, &connection, &shutdown))
            .catch_unwind();

        if let Err(panic) = fut.await {
            metrics::inc_connection_panics();
            let panic_msg = format_panic(panic);
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr}");
            tracing::error!(panic = %panic_msg, %peer_addr, "connection task panicked");
            engine.close_connection(&origin, false);
        }
        metrics::dec_connections();
    });
}

enum Next {
    Frame(Bytes),
    Failed(io::Error),
    Closed,
    TimedOut,
}

async fn process_stream(
    stream: TcpStream,
    origin: &Origin,
    engine: &DispatchEngine,
    options: &ConnectionOptions,
    shutdown: &CancellationToken,
) {
    let codec = DelimitedCodec::new(options.delimiter.clone(), options.max_frame_length);
    let mut frames = FramedRead::new(stream, codec);
    engine.open_connection(origin);
    tracing::debug!(peer_addr = %origin.peer, "connection opened");

    let timed_out = loop {
        let next = select! {
            biased;

            () = shutdown.cancelled() => break false,
            next = next_frame(&mut frames, options.idle_timeout) => next,
        };
        match next {
            Next::Frame(payload) if payload.is_empty() => {}
            Next::Frame(payload) => {
                metrics::inc_events(Transport::Tcp);
                let event = SyslogEvent::parse(payload, options.use_structured_data);
                engine.dispatch(origin, &event);
            }
            Next::Failed(e) => {
                tracing::debug!(peer_addr = %origin.peer, error = %e, "connection read failed");
                engine.handle_exception(Some(origin), &HandlerError::Transport(e));
                break false;
            }
            Next::Closed => break false,
            Next::TimedOut => break true,
        }
    };

    engine.close_connection(origin, timed_out);
    tracing::debug!(peer_addr = %origin.peer, timed_out, "connection closed");
}

async fn next_frame(
    frames: &mut FramedRead<TcpStream, DelimitedCodec>,
    idle_timeout: Option<Duration>,
) -> Next {
    let read = match idle_timeout {
        Some(limit) => match timeout(limit, frames.next()).await {
            Ok(read) => read,
            Err(_) => return Next::TimedOut,
        },
        None => frames.next().await,
    };
    match read {
        Some(Ok(payload)) => Next::Frame(payload),
        Some(Err(e)) => Next::Failed(e),
        None => Next::Closed,
    }
}
