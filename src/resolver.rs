//! ConfigMap resolution
//!
//! Reads the trigger annotations of a Pod, fetches the ConfigMaps they name
//! from the Pod's namespace and turns them into injectable content: a flat
//! environment list and an ordered list of sidecar definitions.
//!
//! Resolution never fails as a whole. A missing ConfigMap, an API error or a
//! malformed document is logged, recorded as a [`ResolveIssue`] and contributes
//! nothing; every other source still resolves.

use std::sync::LazyLock;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::annotations::get_annotation;
use crate::config::InjectorConfig;
use crate::pod::PodSnapshot;
use crate::sidecar::{parse_sidecars, SidecarDefinition};
use crate::Error;

/// Keys usable as environment variable names
///
/// Matched as a prefix, so `FOO-BAR` passes while `1FOO` and `-FOO` do not.
static ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[A-Za-z_][A-Za-z0-9_]*").expect("valid env key pattern"));

/// Read access to ConfigMaps
///
/// Abstracts the Kubernetes API so resolution can be tested without a cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigMapSource: Send + Sync {
    /// Fetch ConfigMap `name` in `namespace`, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, Error>;
}

/// [`ConfigMapSource`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeConfigMapSource {
    client: Client,
}

impl KubeConfigMapSource {
    /// Create a source using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigMapSource for KubeConfigMapSource {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cm) => Ok(Some(cm)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Why one ConfigMap contributed nothing
#[derive(Debug, Error)]
pub enum ResolveIssue {
    /// The ConfigMap does not exist
    #[error("configmap {0} not found")]
    NotFound(String),

    /// The API call failed
    #[error("failed to fetch configmap {name}: {message}")]
    Access {
        /// ConfigMap name
        name: String,
        /// Underlying error
        message: String,
    },

    /// The ConfigMap has no sidecar document under the data key
    #[error("configmap {name} has no {key} entry")]
    MissingDataKey {
        /// ConfigMap name
        name: String,
        /// Expected data key
        key: String,
    },

    /// The sidecar document is malformed
    #[error("configmap {name} has a malformed sidecar document: {message}")]
    Parse {
        /// ConfigMap name
        name: String,
        /// Parser message
        message: String,
    },
}

/// Everything resolved for one Pod
#[derive(Debug, Default)]
pub struct Resolution {
    /// Environment to add to every existing container
    pub env: Vec<EnvVar>,
    /// Sidecar definitions in annotation order
    pub sidecars: Vec<SidecarDefinition>,
    /// Sources that contributed nothing, and why
    pub issues: Vec<ResolveIssue>,
}

impl Resolution {
    /// Whether nothing injectable was resolved
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.sidecars.is_empty()
    }
}

/// Split the sidecar-list annotation into ConfigMap names
///
/// Entries are trimmed; empty entries are dropped.
pub fn sidecar_config_maps(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Environment entries from a flat ConfigMap, in key order
pub fn env_from_config_map(cm: &ConfigMap) -> Vec<EnvVar> {
    cm.data
        .iter()
        .flatten()
        .filter(|(key, _)| ENV_KEY.is_match(key))
        .map(|(key, value)| EnvVar {
            name: key.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect()
}

/// Resolve the env and sidecar ConfigMaps named by `pod`'s annotations
pub async fn resolve(
    pod: &PodSnapshot,
    config: &InjectorConfig,
    source: &dyn ConfigMapSource,
) -> Resolution {
    let mut resolution = Resolution::default();
    let annotations = pod.annotations.as_ref();

    if let Some(name) = get_annotation(annotations, &config.inject_prefix, &config.config_map_name)
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        match fetch(pod, source, name).await {
            Ok(cm) => {
                resolution.env = env_from_config_map(&cm);
                debug!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    config_map = name,
                    count = resolution.env.len(),
                    "Resolved env configmap"
                );
            }
            Err(issue) => resolution.issues.push(issue),
        }
    }

    let names = get_annotation(annotations, &config.inject_prefix, &config.inject_name)
        .map(sidecar_config_maps)
        .unwrap_or_default();

    for name in names {
        let cm = match fetch(pod, source, name).await {
            Ok(cm) => cm,
            Err(issue) => {
                resolution.issues.push(issue);
                continue;
            }
        };
        match sidecars_from_config_map(pod, &cm, name, &config.sidecar_data_key) {
            Ok(mut sidecars) => resolution.sidecars.append(&mut sidecars),
            Err(issue) => resolution.issues.push(issue),
        }
    }

    resolution
}

async fn fetch(
    pod: &PodSnapshot,
    source: &dyn ConfigMapSource,
    name: &str,
) -> Result<ConfigMap, ResolveIssue> {
    match source.get(&pod.namespace, name).await {
        Ok(Some(cm)) => Ok(cm),
        Ok(None) => {
            warn!(
                namespace = %pod.namespace,
                pod = %pod.name,
                config_map = name,
                "ConfigMap not found, skipping"
            );
            Err(ResolveIssue::NotFound(name.to_string()))
        }
        Err(e) => {
            error!(
                namespace = %pod.namespace,
                pod = %pod.name,
                config_map = name,
                error = %e,
                "Failed to fetch ConfigMap, skipping"
            );
            Err(ResolveIssue::Access {
                name: name.to_string(),
                message: e.to_string(),
            })
        }
    }
}

fn sidecars_from_config_map(
    pod: &PodSnapshot,
    cm: &ConfigMap,
    name: &str,
    key: &str,
) -> Result<Vec<SidecarDefinition>, ResolveIssue> {
    let Some(document) = cm.data.as_ref().and_then(|data| data.get(key)) else {
        warn!(
            namespace = %pod.namespace,
            pod = %pod.name,
            config_map = name,
            key,
            "ConfigMap has no sidecar document, skipping"
        );
        return Err(ResolveIssue::MissingDataKey {
            name: name.to_string(),
            key: key.to_string(),
        });
    };

    parse_sidecars(document).map_err(|e| {
        error!(
            namespace = %pod.namespace,
            pod = %pod.name,
            config_map = name,
            error = %e,
            "Malformed sidecar document, skipping"
        );
        ResolveIssue::Parse {
            name: name.to_string(),
            message: e.to_string(),
        }
    })
}
