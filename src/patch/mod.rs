//! JSON patch construction
//!
//! Turns the admitted Pod and the resolved sidecar definitions into an ordered
//! list of RFC 6902 operations. The API server applies the list atomically, so
//! every path must be valid against the Pod as it was at admission time:
//!
//! - An empty array cannot be appended to. The first element creates the
//!   array with a one-element value; the rest append with `/-`.
//! - A map key is added when absent and replaced only when the merge policy
//!   allows it. An absent map is created whole.
//! - Map keys are escaped before they become pointer tokens.
//!
//! Existing entries are never removed or reordered. Entries whose name is
//! already present are skipped, so re-running the builder against an already
//! patched Pod adds nothing new.

pub mod operation;
pub mod pointer;

use std::collections::{BTreeMap, HashSet};

use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Container, EnvVar, LocalObjectReference, Volume, VolumeMount};

use crate::config::MergePolicy;
use crate::pod::PodSnapshot;
use crate::sidecar::SidecarDefinition;

pub use operation::{to_json_patch, PatchOperation, PatchValue};
pub use pointer::escape;

const CONTAINERS_PATH: [&str; 2] = ["spec", "containers"];
const INIT_CONTAINERS_PATH: [&str; 2] = ["spec", "initContainers"];
const VOLUMES_PATH: [&str; 2] = ["spec", "volumes"];
const IMAGE_PULL_SECRETS_PATH: [&str; 2] = ["spec", "imagePullSecrets"];
const ANNOTATIONS_PATH: [&str; 2] = ["metadata", "annotations"];
const LABELS_PATH: [&str; 2] = ["metadata", "labels"];

/// `/spec/containers/{index}/{field}`
fn container_field(index: usize, field: &str) -> PointerBuf {
    let container = pointer::child(&PointerBuf::from_tokens(CONTAINERS_PATH), &index.to_string());
    pointer::child(&container, field)
}

/// Identity used to detect entries that are already present
trait Keyed {
    fn key(&self) -> String;
}

impl Keyed for Container {
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for Volume {
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for LocalObjectReference {
    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Keyed for VolumeMount {
    fn key(&self) -> String {
        format!("{}:{}", self.name, self.mount_path)
    }
}

/// All definitions folded together in resolution order
#[derive(Debug, Default)]
struct Combined<'a> {
    init_containers: Vec<&'a Container>,
    containers: Vec<&'a Container>,
    volumes: Vec<&'a Volume>,
    image_pull_secrets: Vec<&'a LocalObjectReference>,
    volume_mounts: BTreeMap<&'a str, Vec<&'a VolumeMount>>,
    annotations: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
}

impl<'a> Combined<'a> {
    fn new(sidecars: &'a [SidecarDefinition]) -> Self {
        let mut combined = Self::default();
        for sidecar in sidecars {
            combined.init_containers.extend(&sidecar.init_containers);
            combined.containers.extend(&sidecar.containers);
            combined.volumes.extend(&sidecar.volumes);
            combined.image_pull_secrets.extend(&sidecar.image_pull_secrets);
            for (container, mounts) in &sidecar.volume_mounts {
                combined
                    .volume_mounts
                    .entry(container.as_str())
                    .or_default()
                    .extend(mounts);
            }
            // Earlier definitions keep their keys; later ones only add
            for (k, v) in &sidecar.annotations {
                combined.annotations.entry(k.clone()).or_insert_with(|| v.clone());
            }
            for (k, v) in &sidecar.labels {
                combined.labels.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        combined
    }
}

/// Build the patch for `pod`
///
/// Operations are emitted in a fixed order: container env, init containers,
/// containers, volumes, image pull secrets, annotations, labels, volume
/// mounts. Each group targets disjoint paths.
pub fn build(
    pod: &PodSnapshot,
    env: &[EnvVar],
    sidecars: &[SidecarDefinition],
    policy: MergePolicy,
) -> Vec<PatchOperation> {
    let mut ops = Vec::new();

    if !env.is_empty() {
        for (index, container) in pod.containers.iter().enumerate() {
            let existing = container.env.as_deref().unwrap_or_default();
            ops.push(PatchOperation::add(
                container_field(index, "env"),
                PatchValue::Env(merge_env(existing, env)),
            ));
        }
    }

    let combined = Combined::new(sidecars);

    append_entries(
        &mut ops,
        PointerBuf::from_tokens(INIT_CONTAINERS_PATH),
        &pod.init_containers,
        &combined.init_containers,
        |c| PatchValue::Containers(vec![c]),
        |c| PatchValue::Container(Box::new(c)),
    );
    append_entries(
        &mut ops,
        PointerBuf::from_tokens(CONTAINERS_PATH),
        &pod.containers,
        &combined.containers,
        |c| PatchValue::Containers(vec![c]),
        |c| PatchValue::Container(Box::new(c)),
    );
    append_entries(
        &mut ops,
        PointerBuf::from_tokens(VOLUMES_PATH),
        &pod.volumes,
        &combined.volumes,
        |v| PatchValue::Volumes(vec![v]),
        |v| PatchValue::Volume(Box::new(v)),
    );
    append_entries(
        &mut ops,
        PointerBuf::from_tokens(IMAGE_PULL_SECRETS_PATH),
        &pod.image_pull_secrets,
        &combined.image_pull_secrets,
        |s| PatchValue::PullSecrets(vec![s]),
        PatchValue::PullSecret,
    );

    merge_map(
        &mut ops,
        PointerBuf::from_tokens(ANNOTATIONS_PATH),
        pod.annotations.as_ref(),
        &combined.annotations,
        policy.allow_annotation_overrides,
    );
    merge_map(
        &mut ops,
        PointerBuf::from_tokens(LABELS_PATH),
        pod.labels.as_ref(),
        &combined.labels,
        policy.allow_label_overrides,
    );

    for (index, container) in pod.containers.iter().enumerate() {
        let Some(mounts) = combined.volume_mounts.get(container.name.as_str()) else {
            continue;
        };
        append_entries(
            &mut ops,
            container_field(index, "volumeMounts"),
            container.volume_mounts.as_deref().unwrap_or_default(),
            mounts,
            |m| PatchValue::VolumeMounts(vec![m]),
            PatchValue::VolumeMount,
        );
    }

    ops
}

/// Union of a container's env and the injected env, sorted by name
///
/// Variables the container already declares keep their value.
pub fn merge_env(existing: &[EnvVar], injected: &[EnvVar]) -> Vec<EnvVar> {
    let mut seen: HashSet<&str> = existing.iter().map(|e| e.name.as_str()).collect();
    let mut merged = existing.to_vec();
    for var in injected {
        if seen.insert(var.name.as_str()) {
            merged.push(var.clone());
        }
    }
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

/// Emit array operations for `added` against `existing`
///
/// The first new entry creates the array when `existing` is empty; every other
/// new entry appends. Entries already present, or queued earlier, are skipped.
fn append_entries<T: Keyed + Clone>(
    ops: &mut Vec<PatchOperation>,
    base: PointerBuf,
    existing: &[T],
    added: &[&T],
    create: impl Fn(T) -> PatchValue,
    append: impl Fn(T) -> PatchValue,
) {
    let mut seen: HashSet<String> = existing.iter().map(Keyed::key).collect();
    let mut array_exists = !existing.is_empty();

    for item in added {
        if !seen.insert(item.key()) {
            continue;
        }
        let item = (*item).clone();
        if array_exists {
            ops.push(PatchOperation::add(pointer::append(&base), append(item)));
        } else {
            ops.push(PatchOperation::add(base.clone(), create(item)));
            array_exists = true;
        }
    }
}

/// Emit map operations for `added` against `existing`
fn merge_map(
    ops: &mut Vec<PatchOperation>,
    base: PointerBuf,
    existing: Option<&BTreeMap<String, String>>,
    added: &BTreeMap<String, String>,
    allow_override: bool,
) {
    if added.is_empty() {
        return;
    }
    let Some(existing) = existing else {
        ops.push(PatchOperation::add(base, PatchValue::Map(added.clone())));
        return;
    };

    for (key, value) in added {
        match existing.get(key) {
            None => ops.push(PatchOperation::add(
                pointer::child(&base, key),
                PatchValue::Text(value.clone()),
            )),
            Some(current) if allow_override && current != value => {
                ops.push(PatchOperation::replace(
                    pointer::child(&base, key),
                    PatchValue::Text(value.clone()),
                ))
            }
            Some(_) => {}
        }
    }
}
