//! Shared fixtures for admission tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use serde_json::{json, Value};
use tower::ServiceExt;

use sidecar_injector::config::{InjectorConfig, MergePolicy};
use sidecar_injector::resolver::ConfigMapSource;
use sidecar_injector::webhook::{webhook_router, WebhookState};
use sidecar_injector::Error;

pub const UID: &str = "a1b2c3d4-0000-4000-8000-000000000001";

/// ConfigMaps held in memory, keyed by namespace and name
#[derive(Default)]
pub struct InMemoryConfigMaps {
    maps: HashMap<(String, String), ConfigMap>,
    failing: HashSet<String>,
}

impl InMemoryConfigMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a ConfigMap with string data
    pub fn with(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        };
        self.maps
            .insert((namespace.to_string(), name.to_string()), cm);
        self
    }

    /// Make every lookup of `name` fail like an API error
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

#[async_trait]
impl ConfigMapSource for InMemoryConfigMaps {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, Error> {
        if self.failing.contains(name) {
            return Err(Error::server(format!("configmaps \"{}\" is forbidden", name)));
        }
        Ok(self
            .maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

pub fn router(source: InMemoryConfigMaps, policy: MergePolicy) -> Router {
    let state = WebhookState::new(
        Arc::new(source),
        InjectorConfig::default(),
        policy,
        Duration::from_secs(5),
    );
    webhook_router(Arc::new(state))
}

/// A Pod as a controller would submit it
pub fn pod(annotations: Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "generateName": "checkout-7d9f8-",
            "labels": {"app": "checkout", "team": "payments"},
            "annotations": annotations
        },
        "spec": {
            "containers": [
                {
                    "name": "app",
                    "image": "shop/checkout:2.4",
                    "env": [{"name": "PORT", "value": "8080"}]
                },
                {"name": "metrics", "image": "prom/statsd-exporter:v0.26"}
            ],
            "volumes": [{"name": "tmp", "emptyDir": {}}]
        }
    })
}

pub fn review(operation: &str, namespace: &str, pod: &Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "requestKind": {"group": "", "version": "v1", "kind": "Pod"},
            "requestResource": {"group": "", "version": "v1", "resource": "pods"},
            "name": "",
            "namespace": namespace,
            "operation": operation,
            "userInfo": {
                "username": "system:serviceaccount:kube-system:replicaset-controller",
                "groups": ["system:serviceaccounts", "system:authenticated"]
            },
            "object": pod,
            "oldObject": null,
            "dryRun": false
        }
    })
}

/// POST `review` to `/mutate` and return the `response` member
pub async fn admit(router: Router, review: &Value) -> Value {
    let request = Request::post("/mutate")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(review).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["apiVersion"], json!("admission.k8s.io/v1"));
    assert_eq!(body["kind"], json!("AdmissionReview"));
    body["response"].clone()
}

/// Decoded patch operations of an admission response, if any
pub fn patch_ops(response: &Value) -> Option<Vec<Value>> {
    let encoded = response.get("patch")?.as_str()?;
    let raw = STANDARD.decode(encoded).unwrap();
    Some(serde_json::from_slice(&raw).unwrap())
}

/// Apply the response's patch to `pod` the way the API server would
pub fn apply(pod: &Value, response: &Value) -> Value {
    let mut patched = pod.clone();
    if let Some(ops) = patch_ops(response) {
        let patch: json_patch::Patch = serde_json::from_value(Value::Array(ops)).unwrap();
        json_patch::patch(&mut patched, &patch.0).unwrap();
    }
    patched
}

/// Names of the entries of a Pod array field
pub fn names(pod: &Value, pointer: &str) -> Vec<String> {
    pod.pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
