//! # HTTP Server
//!
//! Assembles the route table with its middleware stack (CORS, request
//! logging, timeout, Basic auth) and serves it. The store handle is created
//! by the caller and shared across every request for the process lifetime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::api::errors::{set_debug_errors, ApiError};
use crate::api::{self, AppState};
use crate::auth::{require_basic_auth, BasicCredentials};
use crate::config::Config;
use crate::observability::{Logger, Severity};
use crate::store::Store;

/// HTTP server for the gateway
pub struct HttpServer {
    config: Config,
    router: Router,
}

impl HttpServer {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        set_debug_errors(config.debug);
        let router = Self::build_router(&config, store);
        Self { config, router }
    }

    fn build_router(config: &Config, store: Arc<dyn Store>) -> Router {
        let state = AppState { store };
        let credentials = Arc::new(BasicCredentials::new(
            config.auth_username.clone(),
            config.auth_password.clone(),
        ));
        let deadline = Duration::from_millis(config.request_timeout_ms);

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        // Outermost to innermost: CORS, request log, deadline, auth.
        api::routes(state)
            .layer(middleware::from_fn_with_state(
                credentials,
                require_basic_auth,
            ))
            .layer(middleware::from_fn_with_state(deadline, enforce_deadline))
            .layer(middleware::from_fn(log_requests))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until the process exits.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        Logger::log(
            Severity::Info,
            "server_started",
            &[
                ("addr", addr.to_string()),
                ("database", self.config.database.clone()),
            ],
        );

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// Bound every request by the configured deadline; an elapsed timer becomes
/// a client-visible 408 with the standard error body. Any in-flight store
/// work is dropped with the request future.
async fn enforce_deadline(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::Timeout.into_response(),
    }
}

/// One structured log line per request, tagged with a generated request id.
async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let severity = if status.is_server_error() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(
        severity,
        "request",
        &[
            ("elapsed_ms", started.elapsed().as_millis().to_string()),
            ("method", method),
            ("path", path),
            ("request_id", request_id),
            ("status", status.as_u16().to_string()),
        ],
    );

    response
}
