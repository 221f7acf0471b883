//! Injector configuration
//!
//! Plain structs built once at startup from CLI flags and passed explicitly to
//! every component. Nothing in the library reads process state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::annotations::annotation_key;
use crate::{
    API_SERVER_WEBHOOK_TIMEOUT_SECS, DEFAULT_CONFIG_MAP_NAME, DEFAULT_INJECT_NAME,
    DEFAULT_INJECT_PREFIX, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SIDECAR_DATA_KEY,
    DEFAULT_TLS_CERT_FILE, DEFAULT_TLS_KEY_FILE,
};

/// Annotation and ConfigMap naming used to resolve injections
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectorConfig {
    /// Annotation prefix shared by both trigger annotations
    pub inject_prefix: String,
    /// Suffix of the annotation listing sidecar ConfigMaps (comma separated)
    pub inject_name: String,
    /// Suffix of the annotation naming the env ConfigMap
    pub config_map_name: String,
    /// ConfigMap data key holding the sidecar YAML document
    pub sidecar_data_key: String,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            inject_prefix: DEFAULT_INJECT_PREFIX.to_string(),
            inject_name: DEFAULT_INJECT_NAME.to_string(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            sidecar_data_key: DEFAULT_SIDECAR_DATA_KEY.to_string(),
        }
    }
}

impl InjectorConfig {
    /// Full key of the sidecar-list annotation
    pub fn sidecar_annotation(&self) -> String {
        annotation_key(&self.inject_prefix, &self.inject_name)
    }

    /// Full key of the env ConfigMap annotation
    pub fn env_annotation(&self) -> String {
        annotation_key(&self.inject_prefix, &self.config_map_name)
    }

    /// Annotations whose presence requests a mutation
    pub fn trigger_annotations(&self) -> Vec<String> {
        vec![self.sidecar_annotation(), self.env_annotation()]
    }
}

/// Whether sidecar definitions may overwrite existing metadata keys
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Replace annotation values the Pod already carries
    pub allow_annotation_overrides: bool,
    /// Replace label values the Pod already carries
    pub allow_label_overrides: bool,
}

/// HTTPS server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// Path to the PEM certificate chain
    pub cert_file: PathBuf,
    /// Path to the PEM private key matching `cert_file`
    pub key_file: PathBuf,
    /// Upper bound for ConfigMap resolution within one admission call
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            cert_file: PathBuf::from(DEFAULT_TLS_CERT_FILE),
            key_file: PathBuf::from(DEFAULT_TLS_KEY_FILE),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Whether resolution may run past the API server's own webhook timeout
    ///
    /// When it does, a timed-out lookup answers after the API server gave up.
    pub fn outlasts_api_server(&self) -> bool {
        self.request_timeout >= Duration::from_secs(API_SERVER_WEBHOOK_TIMEOUT_SECS)
    }
}
