//! Web layer module
//!
//! The same-origin HTTP surface of the console: the stream proxy plus thin
//! operator endpoints that delegate to the service layer.
//!
//! - `GET|OPTIONS /api/stream/{*tail}`: stream proxy
//! - `POST /api/chat`, `GET|DELETE /api/chat/history`: operator chat
//! - `POST /api/manual`: manual drive commands
//! - `GET|PUT /api/settings/stream-url`: stored stream URL
//! - `GET /health`

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::config::defaults::PROXY_BASE_PATH;
use crate::errors::AppResult;
use crate::proxy::StreamProxy;
use crate::services::{
    ChatBackend, ConsoleStore, LoggingRobotBackend, RobotCommandBackend, chat_backend_from_config,
};
use crate::streaming::StreamUrlRewriter;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ApiResponse, ProxyErrorBody, handle_error, handle_result};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub proxy: Arc<StreamProxy>,
    pub rewriter: StreamUrlRewriter,
    pub store: Arc<ConsoleStore>,
    pub chat: Arc<dyn ChatBackend>,
    pub robot: Arc<dyn RobotCommandBackend>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Wire up the default collaborators for `config`
    pub fn from_config(config: Config) -> AppResult<Self> {
        let proxy = Arc::new(StreamProxy::new(&config)?);
        let rewriter = StreamUrlRewriter::from_config(&config);
        let store = Arc::new(ConsoleStore::new(config.storage.state_file.clone()));
        let chat = chat_backend_from_config(&config.chat)?;

        Ok(Self {
            config: Arc::new(config),
            proxy,
            rewriter,
            store,
            chat,
            robot: Arc::new(LoggingRobotBackend),
            start_time: chrono::Utc::now(),
        })
    }

    pub fn with_chat_backend(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_robot_backend(mut self, robot: Arc<dyn RobotCommandBackend>) -> Self {
        self.robot = robot;
        self
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/chat", post(handlers::chat::chat))
        .route(
            "/api/chat/history",
            get(handlers::chat::history).delete(handlers::chat::clear_history),
        )
        .route("/api/manual", post(handlers::manual::manual_control))
        .route(
            "/api/settings/stream-url",
            get(handlers::settings::get_stream_url).put(handlers::settings::update_stream_url),
        )
        .layer(CorsLayer::permissive());

    // The stream proxy sets its own cross-origin headers on every response
    let stream_route = format!("{PROXY_BASE_PATH}/{{*tail}}");

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            &stream_route,
            get(handlers::stream::proxy_stream).options(handlers::stream::preflight),
        )
        .merge(api)
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Serve until cancelled (or SIGTERM/SIGINT without a token)
    pub async fn serve_with_cancellation(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));
                info!(addr = %self.addr, "Web server listening");

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal(cancellation_token))
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }
}

async fn shutdown_signal(cancellation_token: Option<CancellationToken>) {
    if let Some(token) = cancellation_token {
        token.cancelled().await;
        info!("Web server received cancellation signal, shutting down gracefully");
        return;
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
                }
                return;
            }
            _ => warn!("Failed to install unix signal handlers, waiting for Ctrl+C"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
