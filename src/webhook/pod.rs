//! Pod mutation handler
//!
//! Decodes the `AdmissionReview`, runs gate, resolver and patch builder, and
//! encodes the decision.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use tracing::{debug, error, info, warn};

use super::{WebhookError, WebhookState};
use crate::gate::{requires_mutation, IGNORED_NAMESPACES};
use crate::patch::{self, to_json_patch};
use crate::pod::PodSnapshot;
use crate::resolver::{resolve, Resolution};

/// Handle a mutating admission review for a Pod
///
/// 1. Rejects empty or non-JSON bodies at the HTTP level
/// 2. Decodes the review; an undecodable review is denied
/// 3. Gates on namespace, operation and trigger annotations
/// 4. Resolves the named ConfigMaps under the request timeout
/// 5. Builds the patch and attaches it to an allowing response
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    if body.is_empty() {
        warn!("Rejecting admission call with empty body");
        return Err(WebhookError::EmptyBody);
    }
    check_content_type(&headers)?;

    let review: AdmissionReview<Pod> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            let uid = request_uid(&body);
            error!(uid = uid.as_deref(), error = %e, "Failed to decode admission review");
            let message = format!("could not decode admission review: {e}");
            return Ok(Json(invalid(message, uid).into_review()));
        }
    };

    let req: AdmissionRequest<Pod> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Ok(Json(invalid(e.to_string(), request_uid(&body)).into_review()));
        }
    };

    let response = mutate_pod(&state, &req).await;
    Ok(Json(response.into_review()))
}

/// UID of the request in a review that did not decode as a Pod review
///
/// The API server discards responses whose UID does not match the request,
/// so a rejection has to carry it to reach the user.
fn request_uid(body: &[u8]) -> Option<String> {
    let review: serde_json::Value = serde_json::from_slice(body).ok()?;
    review
        .pointer("/request/uid")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn invalid(message: String, uid: Option<String>) -> AdmissionResponse {
    let mut response = AdmissionResponse::invalid(message);
    if let Some(uid) = uid {
        response.uid = uid;
    }
    response
}

fn check_content_type(headers: &HeaderMap) -> Result<(), WebhookError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    if media_type.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        warn!(content_type, "Rejecting admission call with unsupported content type");
        Err(WebhookError::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Process a single Pod admission request
pub async fn mutate_pod(
    state: &WebhookState,
    request: &AdmissionRequest<Pod>,
) -> AdmissionResponse {
    let uid = request.uid.as_str();

    let Some(pod) = &request.object else {
        debug!(uid, operation = ?request.operation, "No pod object in request, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    let snapshot = PodSnapshot::from_pod(pod, request.namespace.as_deref());
    info!(
        uid,
        kind = %request.kind.kind,
        namespace = %snapshot.namespace,
        pod = %snapshot.name,
        operation = ?request.operation,
        "Admission request received"
    );

    let triggers = state.injector.trigger_annotations();
    if !requires_mutation(&snapshot, &request.operation, IGNORED_NAMESPACES, &triggers) {
        return AdmissionResponse::from(request);
    }

    let resolved = tokio::time::timeout(
        state.request_timeout,
        resolve(&snapshot, &state.injector, state.source.as_ref()),
    )
    .await;
    let resolution = match resolved {
        Ok(resolution) => resolution,
        Err(_) => {
            warn!(
                uid,
                namespace = %snapshot.namespace,
                pod = %snapshot.name,
                timeout_secs = state.request_timeout.as_secs_f64(),
                "ConfigMap resolution timed out, allowing unchanged"
            );
            Resolution::default()
        }
    };

    let ops = patch::build(&snapshot, &resolution.env, &resolution.sidecars, state.policy);
    if ops.is_empty() {
        info!(
            uid,
            namespace = %snapshot.namespace,
            pod = %snapshot.name,
            issues = resolution.issues.len(),
            "Nothing to inject, allowing unchanged"
        );
        return AdmissionResponse::from(request);
    }

    let patch = match to_json_patch(&ops) {
        Ok(patch) => patch,
        Err(e) => {
            error!(uid, error = %e, "Failed to encode patch");
            return AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"));
        }
    };
    debug!(uid, patch = ?patch, "Patch built");

    info!(
        uid,
        namespace = %snapshot.namespace,
        pod = %snapshot.name,
        sidecars = resolution.sidecars.len(),
        env = resolution.env.len(),
        patch_ops = ops.len(),
        issues = resolution.issues.len(),
        "Applying patch to pod"
    );

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}
