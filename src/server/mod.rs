//! HTTP server implementation
//!
//! Sets up the Axum HTTP server with:
//! - Gateway API routes
//! - Middleware (access logging, metrics, panic recovery, CORS, timeout, compression)
//! - Graceful shutdown bounded by a grace period

use axum::{
    extract::Request,
    http::{header, HeaderName, Method},
    middleware::{self, Next},
    response::Response,
    Router,
};
use anyhow::Context;
use std::future::{Future, IntoFuture};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::metrics;
use crate::routes::{self, AppState};

/// HTTP server for the gateway
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state.clone(), &self.config);

        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_address))?;
        info!(address = %self.config.bind_address, "Server listening");

        serve(listener, app, shutdown, self.config.shutdown_grace()).await
    }
}

/// Build the router with all middleware
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    routes::create_router(state).layer(
        ServiceBuilder::new()
            // Access log, at info so the default filter keeps it
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                    .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
            )
            .layer(middleware::from_fn(track_http))
            // Panics become 500s; the process keeps serving
            .layer(CatchPanicLayer::new())
            .layer(cors_layer())
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(CompressionLayer::new())
            .into_inner(),
    )
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300))
}

async fn track_http(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    metrics::observe_http(method.as_str(), response.status().as_u16(), started.elapsed());
    response
}

/// Serve `app` on `listener` until `shutdown` resolves, then stop accepting
/// connections and give in-flight requests up to `grace` to finish.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => {
            // The accept loop ended on its own.
            return joined
                .context("Server task panicked")?
                .context("Server failed");
        }
        () = shutdown => {}
    }

    info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined
            .context("Server task panicked")?
            .context("Server failed"),
        Err(_) => {
            server.abort();
            warn!("Shutdown grace period elapsed, dropping remaining connections");
            Ok(())
        }
    }
}
