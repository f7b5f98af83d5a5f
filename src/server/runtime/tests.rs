//! Tests for server runtime behaviour.

use std::{
    io,
    sync::{Arc, Mutex},
};

use rstest::rstest;
use tokio::{
    sync::oneshot,
    task::yield_now,
    time::{Duration, Instant, advance, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{AcceptLoopOptions, BackoffConfig, MockAcceptListener, accept_loop};
use crate::{
    dispatch::DispatchEngine,
    server::{
        ServerConfig,
        connection::ConnectionOptions,
        test_util::{bind_server, engine, free_listener},
    },
};

fn loop_options(shutdown: CancellationToken, tracker: TaskTracker, backoff: BackoffConfig) -> AcceptLoopOptions {
    AcceptLoopOptions {
        connection: ConnectionOptions::from_config(&ServerConfig::default()),
        limit: None,
        shutdown,
        tracker,
        backoff,
    }
}

#[rstest]
#[tokio::test]
async fn test_run_with_immediate_shutdown(free_listener: std::net::TcpListener) {
    let server = bind_server(free_listener);
    let result = timeout(Duration::from_millis(1000), server.run_with_shutdown(async {})).await;
    assert!(result.is_ok());
    assert!(result.expect("timeout").is_ok());
}

#[rstest]
#[tokio::test]
async fn test_ready_signal_is_sent(free_listener: std::net::TcpListener) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = bind_server(free_listener).ready_signal(ready_tx);
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    timeout(Duration::from_secs(1), ready_rx)
        .await
        .expect("ready timeout")
        .expect("ready sender dropped");
    let _ = stop_tx.send(());
    handle.await.expect("join").expect("run");
}

#[rstest]
#[tokio::test]
async fn test_accept_loop_shutdown_signal(
    engine: Arc<DispatchEngine>,
    free_listener: std::net::TcpListener,
) {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    free_listener.set_nonblocking(true).expect("nonblocking");
    let listener = Arc::new(tokio::net::TcpListener::from_std(free_listener).expect("listener"));

    tracker.spawn(accept_loop(
        listener,
        engine,
        loop_options(token.clone(), tracker.clone(), BackoffConfig::default()),
    ));

    token.cancel();
    tracker.close();

    let result = timeout(Duration::from_millis(100), tracker.wait()).await;
    assert!(result.is_ok());
}

/// Creates a mock listener that fails with exponential backoff tracking.
fn setup_backoff_mock_listener(
    calls: &Arc<Mutex<Vec<Instant>>>,
    num_calls: usize,
) -> MockAcceptListener {
    let mut listener = MockAcceptListener::new();
    let call_log = Arc::clone(calls);
    listener
        .expect_accept()
        .returning(move || {
            let call_log = Arc::clone(&call_log);
            Box::pin(async move {
                call_log.lock().expect("lock").push(Instant::now());
                Err(io::Error::other("mock error"))
            })
        })
        .times(num_calls);
    listener
        .expect_local_addr()
        .returning(|| Ok("127.0.0.1:0".parse().expect("addr parse")))
        .times(num_calls);
    listener
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_accept_loop_exponential_backoff_async(
    engine: Arc<DispatchEngine>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(setup_backoff_mock_listener(&calls, 4));
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };

    tracker.spawn(accept_loop(
        listener,
        engine,
        loop_options(token.clone(), tracker.clone(), backoff),
    ));

    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    token.cancel();
    advance(Duration::from_millis(20)).await;
    yield_now().await;
    tracker.close();
    tracker.wait().await;

    let calls = calls.lock().expect("lock");
    assert_eq!(calls.len(), 4);
    let intervals: Vec<_> = calls
        .windows(2)
        .filter_map(|pair| pair[1].checked_duration_since(pair[0]))
        .collect();
    assert_eq!(
        intervals,
        [
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]
    );
    Ok(())
}
