//! HTTP boundary for the code execution engine.
//!
//! Exposes `run` and `submit` as JSON POST endpoints plus a few operational
//! endpoints for health, supported languages and live sessions. Every
//! execution, successful or not, comes back as a 200 with an
//! `ExecutionResult`; non-2xx responses are reserved for requests the judge
//! could not act on at all.

pub mod error;
pub mod problems;

pub use error::{Result, ServerError};
pub use problems::{FileProblemRepository, ProblemRepository};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use judge_core::session::SessionManager;
use judge_core::{
    all_profiles, profile_for, ExecutionResult, JudgeConfig, JudgeError, JudgeService, RunRequest,
    SessionKey, SubmitRequest,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Configuration for the judge server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
    /// How often idle sessions are reaped
    pub reap_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the server settings from the judge's YAML configuration.
    pub fn from_judge_config(config: &JudgeConfig) -> Result<Self> {
        Ok(Self::default()
            .with_bind_addr_str(&config.server.bind_addr)?
            .with_cors(config.server.enable_cors)
            .with_max_body_size(config.server.body_limit_bytes)
            .with_reap_interval(config.reap_interval()))
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}

#[derive(Clone)]
struct AppState {
    judge: Arc<JudgeService>,
    problems: Arc<dyn ProblemRepository>,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ServerError::invalid_request(format!(
            "Missing required field: {}",
            field
        )));
    }
    Ok(())
}

/// Handler for the /run POST endpoint.
async fn run_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>> {
    let Json(request) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    require("userId", &request.user_id)?;
    require("sessionId", &request.session_id)?;

    log::info!(
        "Run request from {}/{} ({}, {} test case(s))",
        request.user_id,
        request.session_id,
        request.language,
        request.test_cases.len()
    );
    Ok(Json(state.judge.run(request).await))
}

/// Handler for the /submit POST endpoint.
async fn submit_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>> {
    let Json(request) = payload.map_err(|e| ServerError::invalid_request(e.body_text()))?;
    require("userId", &request.user_id)?;
    require("sessionId", &request.session_id)?;
    require("problemId", &request.problem_id)?;

    let test_cases = state.problems.test_cases(&request.problem_id).await?;
    log::info!(
        "Submit request from {}/{} for problem {} ({}, {} test case(s))",
        request.user_id,
        request.session_id,
        request.problem_id,
        request.language,
        test_cases.len()
    );
    Ok(Json(state.judge.submit(request, test_cases).await))
}

async fn languages_handler() -> Json<serde_json::Value> {
    Json(json!({ "languages": all_profiles() }))
}

async fn sessions_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.judge.sessions().list().await;
    Json(json!({
        "count": sessions.len(),
        "sessions": sessions,
        "timestamp": chrono::Utc::now()
    }))
}

/// Handler for the /sessions/{userId}/{sessionId}/{language} DELETE endpoint.
async fn kill_session_handler(
    State(state): State<AppState>,
    Path((user_id, session_id, language)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>> {
    let profile =
        profile_for(&language).ok_or_else(|| JudgeError::UnsupportedLanguage(language.clone()))?;
    let key = SessionKey::new(user_id, session_id, profile.name);

    if state.judge.sessions().kill_session(&key).await {
        Ok(Json(json!({
            "status": "killed",
            "session": key.to_string(),
            "timestamp": chrono::Utc::now()
        })))
    } else {
        Err(ServerError::SessionNotFound(key.to_string()))
    }
}

/// Periodically destroys idle sessions until aborted.
pub fn spawn_reaper(sessions: Arc<SessionManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = sessions.reap_idle().await;
            if !reaped.is_empty() {
                log::info!("Reaped {} idle session(s)", reaped.len());
            }
        }
    })
}

/// The judge HTTP server.
pub struct JudgeServer {
    judge: Arc<JudgeService>,
    problems: Arc<dyn ProblemRepository>,
    config: ServerConfig,
}

impl JudgeServer {
    pub fn new(
        judge: Arc<JudgeService>,
        problems: Arc<dyn ProblemRepository>,
        config: ServerConfig,
    ) -> Self {
        Self {
            judge,
            problems,
            config,
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            judge: self.judge.clone(),
            problems: self.problems.clone(),
        };

        let mut router = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(HealthResponse {
                        status: "healthy".to_string(),
                        timestamp: chrono::Utc::now(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    })
                }),
            )
            .route("/languages", get(languages_handler))
            .route("/run", post(run_handler))
            .route("/submit", post(submit_handler))
            .route("/sessions", get(sessions_handler))
            .route(
                "/sessions/{user_id}/{session_id}/{language}",
                delete(kill_session_handler),
            )
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent and uninteresting.
                    let quiet = uri.path() == "/health";
                    if quiet {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    if quiet {
                        log::debug!("Response {} {} in {:?}", request_id, response.status(), duration);
                    } else {
                        log::info!("Response {} {} in {:?}", request_id, response.status(), duration);
                    }
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Serves until `shutdown_signal` resolves, then destroys every session.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("Judge server listening on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);

        let reaper = spawn_reaper(self.judge.sessions().clone(), self.config.reap_interval);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)));

        reaper.abort();
        let destroyed = self.judge.sessions().shutdown().await;
        log::info!("Judge server shut down, {} session(s) destroyed", destroyed);
        served
    }
}

/// Utility function to create a shutdown signal from Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
