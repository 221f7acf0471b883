//! Sidecar definition documents
//!
//! A sidecar ConfigMap stores, under a well-known data key, a YAML sequence of
//! named bundles. Every field reuses the native Pod-spec type so a bundle reads
//! exactly like the Pod fragment it injects:
//!
//! ```yaml
//! - name: log-shipper
//!   containers:
//!     - name: shipper
//!       image: fluent/fluent-bit:3.0
//!   volumes:
//!     - name: shipper-conf
//!       configMap:
//!         name: fluent-bit-conf
//!   volumeMounts:
//!     app:
//!       - name: shipper-conf
//!         mountPath: /etc/fluent-bit
//!   labels:
//!     logging: enabled
//! ```

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, LocalObjectReference, Volume, VolumeMount};
use serde::{Deserialize, Serialize};

/// One named injection bundle
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidecarDefinition {
    /// Bundle name, informational only
    pub name: String,
    /// Init containers to add
    pub init_containers: Vec<Container>,
    /// Containers to add
    pub containers: Vec<Container>,
    /// Volumes to add
    pub volumes: Vec<Volume>,
    /// Image pull secret references to add
    pub image_pull_secrets: Vec<LocalObjectReference>,
    /// Mounts to add to existing containers, keyed by container name
    pub volume_mounts: BTreeMap<String, Vec<VolumeMount>>,
    /// Annotations to merge into the Pod
    pub annotations: BTreeMap<String, String>,
    /// Labels to merge into the Pod
    pub labels: BTreeMap<String, String>,
}

/// Parse a sidecar document
///
/// The whole document fails on any malformed entry; no partial list is
/// returned. An empty or `null` document is an empty list.
pub fn parse_sidecars(document: &str) -> Result<Vec<SidecarDefinition>, serde_yaml::Error> {
    if document.trim().is_empty() {
        return Ok(Vec::new());
    }
    let sidecars: Option<Vec<SidecarDefinition>> = serde_yaml::from_str(document)?;
    Ok(sidecars.unwrap_or_default())
}
