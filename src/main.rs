//! Sidecar Injector - mutating admission webhook for Pod sidecar injection

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sidecar_injector::config::{InjectorConfig, MergePolicy, ServerConfig};
use sidecar_injector::resolver::KubeConfigMapSource;
use sidecar_injector::webhook::{serve, webhook_router, WebhookState};
use sidecar_injector::{
    DEFAULT_CONFIG_MAP_NAME, DEFAULT_INJECT_NAME, DEFAULT_INJECT_PREFIX,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SIDECAR_DATA_KEY, DEFAULT_TLS_CERT_FILE,
    DEFAULT_TLS_KEY_FILE,
};

/// Sidecar Injector - injects sidecars, volumes and env from ConfigMaps
#[derive(Parser, Debug)]
#[command(name = "sidecar-injector", version, about, long_about = None)]
struct Cli {
    /// HTTPS port for the admission endpoint
    #[arg(long, env = "INJECTOR_PORT", default_value_t = sidecar_injector::DEFAULT_PORT)]
    port: u16,

    /// PEM certificate chain served to the API server
    #[arg(long, env = "INJECTOR_TLS_CERT_FILE", default_value = DEFAULT_TLS_CERT_FILE)]
    tls_cert_file: PathBuf,

    /// PEM private key matching the certificate
    #[arg(long, env = "INJECTOR_TLS_KEY_FILE", default_value = DEFAULT_TLS_KEY_FILE)]
    tls_key_file: PathBuf,

    /// Annotation prefix shared by both trigger annotations
    #[arg(long, env = "INJECTOR_INJECT_PREFIX", default_value = DEFAULT_INJECT_PREFIX)]
    inject_prefix: String,

    /// Suffix of the annotation listing sidecar ConfigMaps
    #[arg(long, env = "INJECTOR_INJECT_NAME", default_value = DEFAULT_INJECT_NAME)]
    inject_name: String,

    /// Suffix of the annotation naming the env ConfigMap
    #[arg(long, env = "INJECTOR_CONFIG_NAME", default_value = DEFAULT_CONFIG_MAP_NAME)]
    config_name: String,

    /// ConfigMap data key holding the sidecar document
    #[arg(long, env = "INJECTOR_SIDECAR_DATA_KEY", default_value = DEFAULT_SIDECAR_DATA_KEY)]
    sidecar_data_key: String,

    /// Let sidecar definitions overwrite existing Pod annotations
    #[arg(long, env = "INJECTOR_ALLOW_ANNOTATION_OVERRIDES")]
    allow_annotation_overrides: bool,

    /// Let sidecar definitions overwrite existing Pod labels
    #[arg(long, env = "INJECTOR_ALLOW_LABEL_OVERRIDES")]
    allow_label_overrides: bool,

    /// Upper bound in seconds for ConfigMap lookups per admission call
    #[arg(
        long,
        env = "INJECTOR_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "INJECTOR_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn injector_config(&self) -> InjectorConfig {
        InjectorConfig {
            inject_prefix: self.inject_prefix.clone(),
            inject_name: self.inject_name.clone(),
            config_map_name: self.config_name.clone(),
            sidecar_data_key: self.sidecar_data_key.clone(),
        }
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            allow_annotation_overrides: self.allow_annotation_overrides,
            allow_label_overrides: self.allow_label_overrides,
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], self.port)),
            cert_file: self.tls_cert_file.clone(),
            key_file: self.tls_key_file.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Install crypto provider before any TLS material is loaded
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    init_tracing(cli.log_json);

    let injector = cli.injector_config();
    let policy = cli.merge_policy();
    let server = cli.server_config();

    info!(
        sidecar_annotation = %injector.sidecar_annotation(),
        env_annotation = %injector.env_annotation(),
        sidecar_data_key = %injector.sidecar_data_key,
        allow_annotation_overrides = policy.allow_annotation_overrides,
        allow_label_overrides = policy.allow_label_overrides,
        "Starting sidecar injector"
    );
    if server.outlasts_api_server() {
        warn!(
            request_timeout_secs = server.request_timeout.as_secs(),
            "Request timeout reaches the API server's webhook timeout; \
             timed-out lookups will not degrade to an unmodified admission"
        );
    }

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let state = WebhookState::new(
        Arc::new(KubeConfigMapSource::new(client)),
        injector,
        policy,
        server.request_timeout,
    );

    serve(&server, webhook_router(Arc::new(state))).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
