//! Sidecar Injector - Kubernetes mutating admission webhook
//!
//! On Pod creation the webhook reads a pair of prefixed annotations, fetches the
//! ConfigMaps they name, and answers the API server with an RFC 6902 JSON patch
//! that adds sidecar containers, init containers, volumes, image pull secrets,
//! volume mounts, environment variables, labels and annotations.
//!
//! # Flow
//!
//! ```text
//! AdmissionReview ──► gate ──► resolver ──► patch ──► AdmissionReview
//!                     (skip?)  (ConfigMaps)  (RFC 6902)
//! ```
//!
//! # Modules
//!
//! - [`annotations`] - Prefixed annotation lookup
//! - [`pod`] - Immutable per-request view of the admitted Pod
//! - [`gate`] - Decides whether a Pod needs mutation at all
//! - [`sidecar`] - Sidecar definition documents stored in ConfigMaps
//! - [`resolver`] - Fetches and parses the ConfigMaps named by a Pod
//! - [`patch`] - JSON patch construction (the core merge algorithm)
//! - [`config`] - Injector, merge policy and server configuration
//! - [`webhook`] - HTTPS admission endpoint
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod annotations;
pub mod config;
pub mod error;
pub mod gate;
pub mod patch;
pub mod pod;
pub mod resolver;
pub mod sidecar;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Default HTTPS port for the admission endpoint
pub const DEFAULT_PORT: u16 = 443;

/// Default annotation prefix (`{prefix}/{name}`)
pub const DEFAULT_INJECT_PREFIX: &str = "injector.server-lab.info";

/// Default suffix of the annotation listing sidecar ConfigMaps
pub const DEFAULT_INJECT_NAME: &str = "inject";

/// Default suffix of the annotation naming the env ConfigMap
pub const DEFAULT_CONFIG_MAP_NAME: &str = "config";

/// Default ConfigMap data key holding the sidecar YAML document
pub const DEFAULT_SIDECAR_DATA_KEY: &str = "sidecars.yaml";

/// Default TLS certificate path
pub const DEFAULT_TLS_CERT_FILE: &str = "/etc/mutator/certs/cert.pem";

/// Default TLS private key path
pub const DEFAULT_TLS_KEY_FILE: &str = "/etc/mutator/certs/key.pem";

/// API server's default `timeoutSeconds` for admission webhook calls
pub const API_SERVER_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Default per-request resolution timeout in seconds
///
/// Kept below [`API_SERVER_WEBHOOK_TIMEOUT_SECS`] so the unmodified admission
/// sent after a timeout still reaches the API server.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;
