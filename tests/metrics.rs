#![cfg(feature = "metrics")]
//! Tests for the metrics helpers and the counters the client updates.
//!
//! Values are captured with `metrics_util::debugging::DebuggingRecorder`.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;
use syslog_wire::{
    ClientConfig,
    SyslogClient,
    client::DeliveryConfig,
    metrics::{self as syslog_metrics, Transport},
};
use syslog_wire_testing::MemoryPool;

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) if key.key().name() == name => Some(count),
            _ => None,
        })
}

#[rstest]
#[case(Transport::Udp, "udp")]
#[case(Transport::Tcp, "tcp")]
fn events_are_labelled_by_transport(#[case] transport: Transport, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || syslog_metrics::inc_events(transport));

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == syslog_metrics::EVENTS_RECEIVED
            && k.key()
                .labels()
                .any(|l| l.key() == "transport" && l.value() == label)
            && matches!(v, DebugValue::Counter(1))
    });
    assert!(found, "{label} events not recorded: {metrics:#?}");
}

#[test]
fn connection_gauge_tracks_open_connections() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        syslog_metrics::inc_connections();
        syslog_metrics::inc_connections();
        syslog_metrics::dec_connections();
    });

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == syslog_metrics::CONNECTIONS_ACTIVE
            && matches!(v, DebugValue::Gauge(g) if g.into_inner() == 1.0)
    });
    assert!(found, "gauge not recorded: {metrics:#?}");
}

#[rstest]
#[case(syslog_metrics::PARSE_FALLBACKS, syslog_metrics::inc_parse_fallbacks as fn())]
#[case(syslog_metrics::HANDLER_FAILURES, syslog_metrics::inc_handler_failures as fn())]
#[case(syslog_metrics::CONNECTION_PANICS, syslog_metrics::inc_connection_panics as fn())]
fn failure_counters_increment(#[case] name: &str, #[case] inc: fn()) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        inc();
        inc();
    });

    assert_eq!(counter(&snapshotter, name), Some(2));
}

#[test]
fn delivery_updates_sent_retry_and_failure_counters() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let pool = MemoryPool::failing(4);

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let config = ClientConfig::default().delivery(DeliveryConfig::default().write_retries(2));
            let client = SyslogClient::builder(config)
                .pool(pool.clone())
                .build()
                .expect("client");
            client.info("lost").await.expect("dropped quietly");
            client.info("retried").await.expect("delivered");
        });
    });

    assert_eq!(pool.written().len(), 1);
    assert_eq!(counter(&snapshotter, syslog_metrics::MESSAGES_SENT), Some(1));
    assert_eq!(counter(&snapshotter, syslog_metrics::DELIVERY_RETRIES), Some(3));
    assert_eq!(counter(&snapshotter, syslog_metrics::DELIVERY_FAILURES), Some(1));
}
