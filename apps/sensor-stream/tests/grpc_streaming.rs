//! gRPC Streaming Integration Tests
//!
//! Tests the full data flow from the emitter to gRPC client reception.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Server};
use tonic::{Code, Request, Streaming};

use sensor_stream::{
    RandomSourceFactory, ReadingEmitter, SeededRandomSource, SensorStreamServer,
    SensorStreamServerConfig, SubscriptionRegistry, VALUE_MAX, VALUE_MIN, VALUE_RANGE,
    ValueSource,
    proto::{
        ServerRequest, Temperature, sensor_stream_service_client::SensorStreamServiceClient,
        sensor_stream_service_server::SensorStreamServiceServer,
    },
};

const INTERVAL: Duration = Duration::from_millis(100);
const SEED: u64 = 42;

/// Start a test gRPC server on a random port and return the client.
async fn setup_test_server(
    shutdown: CancellationToken,
) -> (SensorStreamServiceClient<Channel>, tokio::task::JoinHandle<()>) {
    let emitter =
        ReadingEmitter::new(INTERVAL, Arc::new(RandomSourceFactory::seeded(SEED)), shutdown)
            .unwrap();
    let server = SensorStreamServer::new(
        SensorStreamServerConfig {
            version: "test-0.0.1".to_string(),
        },
        emitter,
        Arc::new(SubscriptionRegistry::new()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(SensorStreamServiceServer::new(server))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = SensorStreamServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    (client, server_handle)
}

async fn open_stream(client: &mut SensorStreamServiceClient<Channel>) -> Streaming<Temperature> {
    client
        .server(Request::new(ServerRequest {}))
        .await
        .unwrap()
        .into_inner()
}

async fn next_reading(stream: &mut Streaming<Temperature>) -> Temperature {
    timeout(INTERVAL * 10, stream.message())
        .await
        .expect("timeout waiting for reading")
        .expect("stream error")
        .expect("stream ended")
}

// =============================================================================
// Reading Content Tests
// =============================================================================

#[tokio::test]
async fn test_first_three_readings_have_sequential_ids() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;
    let mut stream = open_stream(&mut client).await;

    for expected_id in 0..3 {
        let reading = next_reading(&mut stream).await;
        assert_eq!(reading.id, expected_id);
        assert!(
            (VALUE_MIN..VALUE_MAX).contains(&reading.temperature),
            "temperature {} out of range",
            reading.temperature
        );
    }

    handle.abort();
}

#[tokio::test]
async fn test_timestamps_increase() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;
    let mut stream = open_stream(&mut client).await;

    let first = next_reading(&mut stream).await.recorded_at.unwrap();
    let second = next_reading(&mut stream).await.recorded_at.unwrap();

    assert!((second.seconds, second.nanos) > (first.seconds, first.nanos));

    handle.abort();
}

#[tokio::test]
async fn test_time_is_local_iso_without_offset() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;
    let mut stream = open_stream(&mut client).await;

    let reading = next_reading(&mut stream).await;

    assert!(!reading.time.ends_with('Z'));
    assert!(!reading.time.contains('+'));
    NaiveDateTime::parse_from_str(&reading.time, "%Y-%m-%dT%H:%M:%S%.f").unwrap();

    handle.abort();
}

#[tokio::test]
async fn test_first_value_follows_seed() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;
    let mut stream = open_stream(&mut client).await;

    let reading = next_reading(&mut stream).await;
    let expected = SeededRandomSource::new(SEED).sample(VALUE_RANGE);

    assert_eq!(reading.temperature, expected);

    handle.abort();
}

// =============================================================================
// Cadence Tests
// =============================================================================

#[tokio::test]
async fn test_readings_arrive_once_per_interval() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;

    let started = Instant::now();
    let mut stream = open_stream(&mut client).await;

    next_reading(&mut stream).await;
    let first_after = started.elapsed();
    assert!(
        first_after >= INTERVAL - Duration::from_millis(10),
        "first reading arrived after {first_after:?}"
    );

    let tick = Instant::now();
    next_reading(&mut stream).await;
    let gap = tick.elapsed();
    assert!(
        gap >= INTERVAL / 2 && gap <= INTERVAL * 3,
        "gap between readings was {gap:?}"
    );

    handle.abort();
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_subscriptions_are_independent() {
    let (mut client, handle) = setup_test_server(CancellationToken::new()).await;

    let mut early = open_stream(&mut client).await;
    next_reading(&mut early).await;
    next_reading(&mut early).await;

    // A later subscriber starts its own sequence at id 0
    let mut late = open_stream(&mut client.clone()).await;
    let late_first = next_reading(&mut late).await;
    let early_third = next_reading(&mut early).await;

    assert_eq!(late_first.id, 0);
    assert_eq!(early_third.id, 2);

    handle.abort();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[tokio::test]
async fn test_shutdown_aborts_stream() {
    let shutdown = CancellationToken::new();
    let (mut client, handle) = setup_test_server(shutdown.clone()).await;
    let mut stream = open_stream(&mut client).await;

    next_reading(&mut stream).await;
    shutdown.cancel();

    let status = timeout(INTERVAL * 10, stream.message())
        .await
        .expect("timeout waiting for abort")
        .unwrap_err();
    assert_eq!(status.code(), Code::Aborted);
    assert!(status.message().starts_with("stream aborted"));

    handle.abort();
}
