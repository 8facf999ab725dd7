//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::api;
use crate::core::{Config, Result, ServerError, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Serve until Ctrl+C, then stop background tasks and close the broker connection
    pub async fn run(&self) -> Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let tasks = state.start_background_tasks();

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Serve(format!("bind {}: {}", addr, e)))?;
        tracing::info!("DashDish server listening on {}", addr);

        let app = api::build_app(&state);
        let shutdown_token = state.shutdown_token.clone();
        let shutdown = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
                _ = shutdown_token.cancelled() => {}
            }
            // 通知 WebSocket 会话与 relay 退出
            shutdown_token.cancel();
        };

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        tasks.shutdown().await;
        if let Err(e) = state.publisher.close().await {
            tracing::warn!(error = %e, "Broker close failed during shutdown");
        }
        tracing::info!("Server stopped");

        served
    }
}
