//! Server startup and graceful shutdown
//!
//! Connections are served by hyper-util's auto builder (HTTP/1.1 and HTTP/2)
//! so the header read timeout can be enforced. Each request carries
//! `ConnectInfo<SocketAddr>` of its socket peer.

use crate::constants::{ACCEPT_ERROR_BACKOFF, HTTP2_KEEP_ALIVE_INTERVAL, SHUTDOWN_DRAIN_TIMEOUT};
use anyhow::Result;
use axum::extract::ConnectInfo;
use axum::Router;
use bucketgate_core::GatewayConfig;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Start the server with graceful shutdown
pub async fn start_server(config: &GatewayConfig, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(
        environment = %config.environment(),
        request_timeout_secs = config.request_timeout().as_secs(),
        upload_timeout_secs = config.upload_timeout().as_secs(),
        header_read_timeout_secs = config.header_read_timeout().as_secs(),
        max_upload_size_mb = config.max_upload_size_bytes() / 1024 / 1024,
        "Server ready and accepting connections"
    );

    serve(listener, app, config.header_read_timeout(), shutdown_signal()).await
}

/// Accept connections on `listener` until `shutdown` resolves, then drain.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    header_read_timeout: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .keep_alive(true)
        .header_read_timeout(header_read_timeout);
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(Some(HTTP2_KEEP_ALIVE_INTERVAL))
        .keep_alive_timeout(Duration::from_secs(10));

    let graceful = GracefulShutdown::new();
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
            () = shutdown.as_mut() => break,
        };

        let service = app.clone().map_request(move |mut request: Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            request
        });
        let conn = builder
            .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
            .into_owned();
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(peer = %peer, error = %err, "Connection closed with error");
            }
        });
    }

    drop(listener);
    tracing::info!("Draining open connections...");

    tokio::select! {
        () = graceful.shutdown() => {
            tracing::info!("All connections closed");
        },
        () = tokio::time::sleep(SHUTDOWN_DRAIN_TIMEOUT) => {
            tracing::warn!(
                drain_timeout_secs = SHUTDOWN_DRAIN_TIMEOUT.as_secs(),
                "Drain timeout reached, closing remaining connections"
            );
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
///
/// # Panics
/// Panics if a signal handler cannot be installed (unrecoverable system error)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");

    bucketgate_infra::shutdown_telemetry().await;
}
