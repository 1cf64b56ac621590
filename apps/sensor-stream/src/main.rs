//! Sensor Stream Binary
//!
//! Starts the periodic reading stream server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sensor-stream
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `SENSOR_STREAM_GRPC_PORT`: gRPC server port (default: 7000)
//! - `SENSOR_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `SENSOR_STREAM_INTERVAL_MS`: Emission interval in milliseconds (default: 1000)
//! - `SENSOR_STREAM_RANDOM_SEED`: Seed for reproducible values (default: unset)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: sensor-stream)
//! - `RUST_LOG`: Log filter (default: warn,sensor_stream=info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sensor_stream::infrastructure::grpc::proto::sensor::v1::sensor_stream_service_server::SensorStreamServiceServer;
use sensor_stream::infrastructure::telemetry;
use sensor_stream::{
    HealthServer, HealthServerState, RandomSourceFactory, ReadingEmitter, SensorStreamServer,
    SensorStreamServerConfig, StreamConfig, SubscriptionRegistry, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Sensor Stream");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = StreamConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Every subscription draws from its own source
    let sources = Arc::new(RandomSourceFactory::from_seed(config.emitter.random_seed));
    let emitter = ReadingEmitter::new(config.emitter.interval, sources, shutdown_token.clone())?;

    // Initialize gRPC server
    let grpc_server_config = SensorStreamServerConfig {
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let grpc_server = Arc::new(SensorStreamServer::new(
        grpc_server_config,
        emitter,
        Arc::new(SubscriptionRegistry::new()),
    ));

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        grpc_server.interval(),
        grpc_server.registry(),
        shutdown_token.clone(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Spawn health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn gRPC server
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.server.grpc_port));
    let grpc_service = SensorStreamServiceServer::from_arc(grpc_server);
    let grpc_shutdown = shutdown_token.clone();

    let grpc_task = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        if let Err(e) = Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
        }
        tracing::info!("gRPC server stopped");
    });

    tracing::info!("Sensor stream ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, grpc_task).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "gRPC server did not drain in time"
        );
    }

    tracing::info!("Sensor stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        grpc_port = config.server.grpc_port,
        health_port = config.server.health_port,
        interval = ?config.emitter.interval,
        seeded = config.emitter.random_seed.is_some(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
