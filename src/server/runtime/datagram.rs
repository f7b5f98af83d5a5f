//! UDP receive loop for the server runtime.

use std::sync::Arc;

use bytes::Bytes;
use log::warn;
use tokio::{net::UdpSocket, select, time::sleep};
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffConfig;
use crate::{
    dispatch::DispatchEngine,
    event::SyslogEvent,
    handler::{HandlerError, Origin},
    metrics::{self, Transport},
};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM_LENGTH: usize = 65_535;

#[derive(Debug)]
pub(in crate::server) struct DatagramLoopOptions {
    pub use_structured_data: bool,
    pub shutdown: CancellationToken,
    pub backoff: BackoffConfig,
}

/// Receives datagrams and dispatches each as one event.
///
/// Datagrams carry no session state: handlers see the sender's address
/// only. Receive errors are reported to every handler and retried with
/// exponential back-off until `options.shutdown` is cancelled.
pub(in crate::server) async fn datagram_loop(
    socket: Arc<UdpSocket>,
    engine: Arc<DispatchEngine>,
    options: DatagramLoopOptions,
) {
    let backoff = options.backoff.normalized();
    let mut delay = backoff.initial_delay;
    let mut buf = vec![0_u8; MAX_DATAGRAM_LENGTH];
    loop {
        let received = select! {
            biased;

            () = options.shutdown.cancelled() => break,
            res = socket.recv_from(&mut buf) => res,
        };
        match received {
            Ok((0, _)) => {}
            Ok((len, peer)) => {
                delay = backoff.initial_delay;
                metrics::inc_events(Transport::Udp);
                let payload = Bytes::copy_from_slice(&buf[..len]);
                let event = SyslogEvent::parse(payload, options.use_structured_data);
                engine.dispatch(&Origin::datagram(peer), &event);
            }
            Err(e) => {
                let local_addr = socket.local_addr().ok();
                warn!("receive error: error={e:?}, local_addr={local_addr:?}");
                engine.handle_exception(None, &HandlerError::Transport(e));
                select! {
                    biased;

                    () = options.shutdown.cancelled() => break,
                    () = sleep(delay) => {},
                }
                delay = backoff.next_delay(delay);
            }
        }
    }
}
