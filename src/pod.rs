//! Immutable view of the Pod under admission

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, LocalObjectReference, Pod, Volume};

use crate::annotations::display_name;

/// Read-only snapshot of the fields the injector inspects
///
/// Built once per admission call and discarded with it. Absent maps stay
/// `None` so the patch builder can tell "no labels" from "empty labels".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodSnapshot {
    /// Pod name, or its `generateName` prefix
    pub name: String,
    /// Namespace the Pod is being created in
    pub namespace: String,
    /// Existing containers, in spec order
    pub containers: Vec<Container>,
    /// Existing init containers, in spec order
    pub init_containers: Vec<Container>,
    /// Existing volumes, in spec order
    pub volumes: Vec<Volume>,
    /// Existing image pull secret references, in spec order
    pub image_pull_secrets: Vec<LocalObjectReference>,
    /// Existing annotations
    pub annotations: Option<BTreeMap<String, String>>,
    /// Existing labels
    pub labels: Option<BTreeMap<String, String>>,
}

impl PodSnapshot {
    /// Snapshot `pod`, using `request_namespace` when the object omits one
    ///
    /// On CREATE the API server frequently sends Pods without
    /// `metadata.namespace`; the admission request always carries it.
    pub fn from_pod(pod: &Pod, request_namespace: Option<&str>) -> Self {
        let meta = &pod.metadata;
        let namespace = meta
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .or(request_namespace)
            .unwrap_or_default()
            .to_string();

        let (containers, init_containers, volumes, image_pull_secrets) = match &pod.spec {
            Some(spec) => (
                spec.containers.clone(),
                spec.init_containers.clone().unwrap_or_default(),
                spec.volumes.clone().unwrap_or_default(),
                spec.image_pull_secrets.clone().unwrap_or_default(),
            ),
            None => Default::default(),
        };

        Self {
            name: display_name(meta),
            namespace,
            containers,
            init_containers,
            volumes,
            image_pull_secrets,
            annotations: meta.annotations.clone(),
            labels: meta.labels.clone(),
        }
    }

    /// Value of annotation `key`, if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}
