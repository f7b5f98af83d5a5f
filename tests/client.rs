//! Tests for [`SyslogClient`] formatting, delivery and failure routing.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rstest::rstest;
use syslog_wire::{
    ClientConfig,
    ClientError,
    Severity,
    StructuredMessage,
    SyslogClient,
    client::{
        DeliveryConfig,
        DeliveryError,
        TcpConfig,
        TransportConfig,
        backlog::CallbackBackLogHandler,
        modifier::{SequentialConfig, SequentialModifier},
    },
    priority::Facility,
    server::{ServerProtocol, SyslogServer},
};
use syslog_wire_testing::{
    Call,
    CallLog,
    LoggerHandle,
    MemoryPool,
    RecordingSessionlessHandler,
    TestResult,
    logger,
    spawn_server,
    unused_listener,
    unused_udp_socket,
};

mod common;

use common::WAIT;

type Backlogged = Arc<Mutex<Vec<(Severity, String, String)>>>;

fn recording_backlog() -> (Backlogged, CallbackBackLogHandler<impl Fn(Severity, &str, &str) + Send + Sync>) {
    let seen = Backlogged::default();
    let sink = Arc::clone(&seen);
    let handler = CallbackBackLogHandler::new(move |severity: Severity, message: &str, reason: &str| {
        sink.lock()
            .expect("backlog lock")
            .push((severity, message.to_owned(), reason.to_owned()));
    });
    (seen, handler)
}

fn plain() -> ClientConfig {
    ClientConfig::default()
        .facility(Facility::Local3)
        .send_local_timestamp(false)
        .local_name("web01")
        .ident("api")
}

#[tokio::test]
async fn legacy_messages_reach_a_udp_server() -> TestResult {
    let log = CallLog::default();
    let server = SyslogServer::new(ServerProtocol::Udp)
        .sessionless_handler(RecordingSessionlessHandler::new(log.clone()))
        .bind_existing_socket(unused_udp_socket()?)?;
    let running = spawn_server(server).await?;

    let client = SyslogClient::new(
        ClientConfig::default()
            .host("127.0.0.1")
            .port(running.addr().port())
            .local_name("web01")
            .ident("api"),
    )?;
    client.warn("disk almost full").await?;
    assert!(log.wait_for(1, WAIT, |call| matches!(call, Call::Event { .. })).await);
    client.shutdown().await;
    running.stop().await?;

    assert_eq!(log.messages("sessionless"), ["api: disk almost full"]);
    Ok(())
}

#[tokio::test]
async fn structured_messages_reach_a_tcp_server() -> TestResult {
    let log = CallLog::default();
    let server = SyslogServer::new(ServerProtocol::Tcp)
        .sessionless_handler(RecordingSessionlessHandler::new(log.clone()))
        .bind_existing_listener(unused_listener()?)?;
    let running = spawn_server(server).await?;

    let client = SyslogClient::new(
        ClientConfig::default()
            .host("127.0.0.1")
            .port(running.addr().port())
            .use_structured_data(true)
            .transport(TransportConfig::Tcp(TcpConfig::default())),
    )?;
    let message = StructuredMessage::new("LOGIN")
        .with_param("user", "name", "alice")
        .with_message("accepted");
    client.log_structured(Severity::Notice, &message).await?;
    client.info("plain text").await?;
    assert!(log.wait_for(2, WAIT, |call| matches!(call, Call::Event { .. })).await);
    client.shutdown().await;
    running.stop().await?;

    assert_eq!(
        log.messages("sessionless"),
        [r#"LOGIN [user name="alice"] accepted"#, "- [0@0] plain text"]
    );
    Ok(())
}

#[tokio::test]
async fn direct_delivery_writes_formatted_lines() -> TestResult {
    let pool = MemoryPool::new();
    let client = SyslogClient::builder(plain()).pool(pool.clone()).build()?;

    client.error("upstream timed out").await?;
    client.debug("cache miss").await?;

    assert_eq!(
        pool.written(),
        ["<155>web01 api: upstream timed out", "<159>web01 api: cache miss"]
    );
    Ok(())
}

#[tokio::test]
async fn modifiers_run_before_formatting() -> TestResult {
    let pool = MemoryPool::new();
    let sequence = SequentialModifier::new(SequentialConfig {
        first: 1,
        last: 100,
        ..SequentialConfig::default()
    })?;
    let client = SyslogClient::builder(plain().send_local_name(false))
        .modifier(sequence)
        .pool(pool.clone())
        .build()?;

    client.info("a").await?;
    client.info("b").await?;
    client.error("c").await?;

    assert_eq!(
        pool.written(),
        ["<158>api: a #001", "<158>api: b #002", "<155>api: c #001"]
    );
    Ok(())
}

#[tokio::test]
async fn queued_delivery_preserves_order() -> TestResult {
    let pool = MemoryPool::new();
    let config = plain().delivery(DeliveryConfig::queued().poll_interval(Duration::from_millis(10)));
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    for n in 0..20 {
        client.info(&format!("message {n}")).await?;
    }
    client.flush().await;

    let written = pool.written();
    assert_eq!(written.len(), 20);
    assert_eq!(written[0], "<158>web01 api: message 0");
    assert_eq!(written[19], "<158>web01 api: message 19");
    assert_eq!(client.delivery().pending(), 0);
    Ok(())
}

#[tokio::test]
async fn shutdown_drains_the_queue_and_closes_the_pool() -> TestResult {
    let pool = MemoryPool::new();
    let config = plain().delivery(DeliveryConfig::queued().max_queue_size(4));
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    for n in 0..10 {
        client.notice(&format!("queued {n}")).await?;
    }
    client.shutdown().await;

    assert_eq!(pool.written().len(), 10);
    assert!(pool.is_closed());
    assert!(matches!(client.info("late").await, Err(ClientError::ShutDown)));
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried() -> TestResult {
    let pool = MemoryPool::failing(2);
    let config = plain()
        .throw_exception_on_write(true)
        .delivery(DeliveryConfig::default().write_retries(2));
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    client.alert("eventually delivered").await?;

    assert_eq!(pool.written(), ["<153>web01 api: eventually delivered"]);
    assert_eq!(pool.borrowed(), 3);
    assert_eq!(pool.destroyed(), 2);
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_surface_when_configured() -> TestResult {
    let pool = MemoryPool::failing(10);
    let config = plain()
        .throw_exception_on_write(true)
        .delivery(DeliveryConfig::default().write_retries(1));
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    let err = client.critical("lost").await.expect_err("delivery must fail");

    assert!(matches!(
        err,
        ClientError::Transport {
            attempts: 2,
            source: DeliveryError::Io(_),
        }
    ));
    assert_eq!(pool.destroyed(), 2);
    Ok(())
}

#[rstest]
#[case::direct(DeliveryConfig::default().write_retries(0))]
#[case::queued(DeliveryConfig::queued().write_retries(0))]
#[tokio::test]
async fn exhausted_retries_are_dropped_without_the_flag(#[case] delivery: DeliveryConfig) -> TestResult {
    let pool = MemoryPool::failing(1);
    let client = SyslogClient::builder(plain().delivery(delivery))
        .pool(pool.clone())
        .build()?;

    client.info("dropped").await?;
    client.flush().await;
    client.info("delivered").await?;
    client.flush().await;

    assert_eq!(pool.written(), ["<158>web01 api: delivered"]);
    Ok(())
}

#[tokio::test]
async fn backlog_handlers_receive_failed_messages() -> TestResult {
    let pool = MemoryPool::failing(3);
    let (seen, handler) = recording_backlog();
    let config = plain()
        .throw_exception_on_write(true)
        .delivery(DeliveryConfig::default().write_retries(2));
    let client = SyslogClient::builder(config)
        .backlog_handler(handler)
        .pool(pool.clone())
        .build()?;

    client.emergency("power lost").await?;

    let seen = seen.lock().expect("backlog lock").clone();
    assert_eq!(seen.len(), 1);
    let (severity, message, reason) = &seen[0];
    assert_eq!(*severity, Severity::Emergency);
    assert_eq!(message, "<152>web01 api: power lost");
    assert!(reason.contains("after 3 attempt(s)"), "reason: {reason}");
    Ok(())
}

#[tokio::test]
async fn queued_failures_reach_backlog_handlers() -> TestResult {
    let pool = MemoryPool::failing(1);
    let (seen, handler) = recording_backlog();
    let config = plain().delivery(DeliveryConfig::queued().write_retries(0));
    let client = SyslogClient::builder(config)
        .backlog_handler(handler)
        .pool(pool.clone())
        .build()?;

    client.warn("first").await?;
    client.warn("second").await?;
    client.flush().await;

    let seen = seen.lock().expect("backlog lock").clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, "<156>web01 api: first");
    assert_eq!(pool.written(), ["<156>web01 api: second"]);
    Ok(())
}

#[tokio::test]
async fn long_messages_are_truncated() -> TestResult {
    let pool = MemoryPool::new();
    let config = plain().send_local_name(false).truncate_message(16);
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    client.info("0123456789abcdef").await?;

    assert_eq!(pool.written(), ["<158>api: 012345"]);
    Ok(())
}

#[tokio::test]
async fn long_messages_are_split_into_frames() -> TestResult {
    let pool = MemoryPool::new();
    let config = plain().send_local_name(false).max_message_length(20);
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    client.info("0123456789abcdefghij").await?;

    assert_eq!(
        pool.written(),
        [
            "<158>api: 0123456...",
            "<158>api: ...789a...",
            "<158>api: ...bcde...",
            "<158>api: ...fghij",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn unsplittable_messages_are_rejected() -> TestResult {
    let pool = MemoryPool::new();
    let client = SyslogClient::builder(plain().max_message_length(8)).pool(pool.clone()).build()?;

    let err = client.info("does not fit").await.expect_err("no room for a chunk");

    assert!(matches!(err, ClientError::Config(_)), "{err:?}");
    assert!(pool.written().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn undelivered_messages_are_logged(mut logger: LoggerHandle) -> TestResult {
    let pool = MemoryPool::failing(1);
    let config = plain().delivery(DeliveryConfig::default().write_retries(0));
    let client = SyslogClient::builder(config).pool(pool.clone()).build()?;

    client.info("gone").await?;

    assert!(logger.contains("syslog message not delivered"));
    Ok(())
}
