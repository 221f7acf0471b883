//! Admission gate
//!
//! Decides, before any ConfigMap is fetched, whether a Pod is a mutation
//! candidate at all. Every decision is logged once with its reason.

use kube::core::admission::Operation;
use tracing::info;

use crate::pod::PodSnapshot;

/// Namespaces whose Pods are never mutated
pub const IGNORED_NAMESPACES: &[&str] = &["kube-system", "kube-public"];

/// Outcome of the gate, with the reason for skipping
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// The Pod requests injection
    Mutate,
    /// The Pod lives in an ignored namespace
    IgnoredNamespace,
    /// The operation is not a CREATE
    UnsupportedOperation,
    /// None of the trigger annotations is present and non-empty
    NoTriggerAnnotation,
}

impl GateDecision {
    /// Whether this decision leads to patch construction
    pub fn is_mutate(self) -> bool {
        matches!(self, GateDecision::Mutate)
    }

    /// Short reason used in the audit log line
    pub fn reason(self) -> &'static str {
        match self {
            GateDecision::Mutate => "trigger annotation present",
            GateDecision::IgnoredNamespace => "namespace is ignored",
            GateDecision::UnsupportedOperation => "only CREATE is mutated",
            GateDecision::NoTriggerAnnotation => "no trigger annotation",
        }
    }
}

/// Evaluate the gate for `pod` under `operation`
pub fn evaluate<S: AsRef<str>>(
    pod: &PodSnapshot,
    operation: &Operation,
    ignored_namespaces: &[&str],
    trigger_annotations: &[S],
) -> GateDecision {
    if ignored_namespaces.contains(&pod.namespace.as_str()) {
        return GateDecision::IgnoredNamespace;
    }
    if !matches!(operation, Operation::Create) {
        return GateDecision::UnsupportedOperation;
    }
    let triggered = trigger_annotations
        .iter()
        .any(|key| pod.annotation(key.as_ref()).is_some_and(|v| !v.is_empty()));
    if triggered {
        GateDecision::Mutate
    } else {
        GateDecision::NoTriggerAnnotation
    }
}

/// Whether `pod` requires mutation, logging the decision
pub fn requires_mutation<S: AsRef<str>>(
    pod: &PodSnapshot,
    operation: &Operation,
    ignored_namespaces: &[&str],
    trigger_annotations: &[S],
) -> bool {
    let decision = evaluate(pod, operation, ignored_namespaces, trigger_annotations);
    info!(
        namespace = %pod.namespace,
        pod = %pod.name,
        operation = ?operation,
        required = decision.is_mutate(),
        reason = decision.reason(),
        "Mutation policy evaluated"
    );
    decision.is_mutate()
}
