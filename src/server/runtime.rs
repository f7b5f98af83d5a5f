//! Runtime control for [`SyslogServer`].

mod accept;
mod backoff;
mod datagram;
#[cfg(test)]
mod tests;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, ConnectionLimit, accept_loop};
pub use backoff::BackoffConfig;
pub(super) use datagram::{DatagramLoopOptions, datagram_loop};
use futures::Future;
use log::warn;
use tokio::{select, signal, sync::Semaphore, time::timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, BoundSocket, ServerError, SyslogServer, connection::ConnectionOptions};
use crate::{dispatch::DispatchEngine, handler::ServerContext};

impl SyslogServer<Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// # Errors
    ///
    /// Receive failures are reported to handlers and retried with
    /// exponential back-off; they do not surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// Handlers are initialised before the first message is received. On
    /// shutdown the receive loop stops, open connections are given
    /// `shutdown_wait` to close, then handlers are destroyed and all sessions
    /// are forgotten.
    ///
    /// ```
    /// use tokio::sync::oneshot;
    /// use syslog_wire::server::{ServerProtocol, SyslogServer};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), syslog_wire::server::ServerError> {
    /// let server = SyslogServer::new(ServerProtocol::Udp).bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle.await.expect("join server task")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Receive failures are retried and never surface as errors.
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let SyslogServer {
            protocol,
            config,
            handlers,
            registry,
            ready_tx,
            state: Bound { socket, local_addr },
        } = self;
        let config = config.normalized();
        let engine = Arc::new(DispatchEngine::new(
            handlers,
            registry,
            ServerContext {
                protocol,
                local_addr,
            },
        ));
        engine.initialize();

        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        match socket {
            BoundSocket::Udp(socket) => {
                tracker.spawn(datagram_loop(
                    socket,
                    Arc::clone(&engine),
                    DatagramLoopOptions {
                        use_structured_data: config.use_structured_data,
                        shutdown: shutdown_token.clone(),
                        backoff: config.backoff,
                    },
                ));
            }
            BoundSocket::Tcp(listener) => {
                let limit = config.max_active_connections.map(|limit| ConnectionLimit {
                    permits: Arc::new(Semaphore::new(limit)),
                    behavior: config.when_exhausted,
                });
                tracker.spawn(accept_loop(
                    listener,
                    Arc::clone(&engine),
                    AcceptLoopOptions {
                        connection: ConnectionOptions::from_config(&config),
                        limit,
                        shutdown: shutdown_token.clone(),
                        tracker: tracker.clone(),
                        backoff: config.backoff,
                    },
                ));
            }
        }

        // Signal readiness once the receive loop has been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        if timeout(config.shutdown_wait, tracker.wait()).await.is_err() {
            warn!(
                "connections still open after shutdown wait: wait={:?}",
                config.shutdown_wait
            );
        }
        engine.shutdown();
        Ok(())
    }
}
