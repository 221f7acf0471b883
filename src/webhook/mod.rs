//! Mutating admission webhook
//!
//! HTTPS surface in front of the injection engine. The API server POSTs an
//! `AdmissionReview` for every Pod CREATE matched by the webhook
//! configuration; the handler answers with the same review carrying an
//! allow/deny decision and, when something is injected, a JSON patch.
//!
//! Transport problems (empty body, wrong content type) are HTTP errors.
//! Everything past decoding is an admission response, so the API server always
//! gets a decision it can act on.

pub mod pod;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info};

use crate::config::{InjectorConfig, MergePolicy, ServerConfig};
use crate::resolver::ConfigMapSource;
use crate::Error;

/// Grace period for in-flight admission calls after a shutdown signal
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Where ConfigMaps are read from
    pub source: Arc<dyn ConfigMapSource>,
    /// Annotation and ConfigMap naming
    pub injector: InjectorConfig,
    /// Metadata override policy
    pub policy: MergePolicy,
    /// Upper bound for ConfigMap resolution per call
    pub request_timeout: Duration,
}

impl WebhookState {
    /// Create a new webhook state
    pub fn new(
        source: Arc<dyn ConfigMapSource>,
        injector: InjectorConfig,
        policy: MergePolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            injector,
            policy,
            request_timeout,
        }
    }
}

/// Transport-level failures of the webhook endpoint
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The request carried no body
    #[error("empty request body")]
    EmptyBody,

    /// The request body is not JSON
    #[error("unsupported content type {0:?}, expected application/json")]
    UnsupportedMediaType(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::EmptyBody => StatusCode::BAD_REQUEST,
            WebhookError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Create the webhook router
///
/// - POST /mutate - Pod admission
/// - GET /healthz - liveness
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(pod::mutate_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve `router` over HTTPS until SIGINT or SIGTERM
///
/// In-flight requests get [`SHUTDOWN_GRACE_PERIOD`] to complete.
pub async fn serve(config: &ServerConfig, router: Router) -> Result<(), Error> {
    let tls_config = RustlsConfig::from_pem_file(&config.cert_file, &config.key_file)
        .await
        .map_err(|e| {
            Error::config(format!(
                "failed to load TLS material from {} and {}: {}",
                config.cert_file.display(),
                config.key_file.display(),
                e
            ))
        })?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    serve_with(config.addr, tls_config, handle, router).await
}

async fn serve_with(
    addr: SocketAddr,
    tls_config: RustlsConfig,
    handle: Handle,
    router: Router,
) -> Result<(), Error> {
    info!(addr = %addr, "Starting HTTPS admission webhook");
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .map_err(|e| Error::server(format!("HTTPS server on {} failed: {}", addr, e)))?;
    info!("Admission webhook stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    wait_for_signal().await;
    info!(
        grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
        "Shutdown signal received, draining connections"
    );
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler, waiting for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
