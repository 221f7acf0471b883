//! RFC 6902 patch operations
//!
//! The value carried by an operation depends on its path: a whole array when
//! the target array is created, a single element when appending, a string or
//! a string map for metadata. [`PatchValue`] spells those shapes out so every
//! value the builder can emit is typed and serializes to the native Pod JSON.

use std::collections::BTreeMap;

use json_patch::{AddOperation, ReplaceOperation};
use jsonptr::{Pointer, PointerBuf};
use k8s_openapi::api::core::v1::{Container, EnvVar, LocalObjectReference, Volume, VolumeMount};
use serde::Serialize;

use crate::Result;

/// Value of a patch operation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    /// Single annotation or label value
    Text(String),
    /// Whole annotation or label map
    Map(BTreeMap<String, String>),
    /// Full environment of one container
    Env(Vec<EnvVar>),
    /// Array creation for containers or init containers
    Containers(Vec<Container>),
    /// Appended container or init container
    Container(Box<Container>),
    /// Array creation for volumes
    Volumes(Vec<Volume>),
    /// Appended volume
    Volume(Box<Volume>),
    /// Array creation for image pull secrets
    PullSecrets(Vec<LocalObjectReference>),
    /// Appended image pull secret
    PullSecret(LocalObjectReference),
    /// Array creation for a container's volume mounts
    VolumeMounts(Vec<VolumeMount>),
    /// Appended volume mount
    VolumeMount(VolumeMount),
}

/// One RFC 6902 operation
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOperation {
    /// `add`: create a member, append to an array, or set a whole field
    Add {
        /// JSON Pointer of the target
        path: PointerBuf,
        /// Value to add
        value: PatchValue,
    },
    /// `replace`: overwrite an existing member
    Replace {
        /// JSON Pointer of the target
        path: PointerBuf,
        /// Replacement value
        value: PatchValue,
    },
}

impl PatchOperation {
    /// Build an `add`
    pub fn add(path: PointerBuf, value: PatchValue) -> Self {
        Self::Add { path, value }
    }

    /// Build a `replace`
    pub fn replace(path: PointerBuf, value: PatchValue) -> Self {
        Self::Replace { path, value }
    }

    /// Target path
    pub fn path(&self) -> &Pointer {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } => path,
        }
    }

    /// Carried value
    pub fn value(&self) -> &PatchValue {
        match self {
            Self::Add { value, .. } | Self::Replace { value, .. } => value,
        }
    }

    fn to_json_patch_operation(&self) -> Result<json_patch::PatchOperation> {
        let op = match self {
            Self::Add { path, value } => json_patch::PatchOperation::Add(AddOperation {
                path: path.clone(),
                value: serde_json::to_value(value)?,
            }),
            Self::Replace { path, value } => {
                json_patch::PatchOperation::Replace(ReplaceOperation {
                    path: path.clone(),
                    value: serde_json::to_value(value)?,
                })
            }
        };
        Ok(op)
    }
}

/// Convert operations into the `json_patch` form expected by
/// `AdmissionResponse::with_patch`
pub fn to_json_patch(ops: &[PatchOperation]) -> Result<json_patch::Patch> {
    ops.iter()
        .map(PatchOperation::to_json_patch_operation)
        .collect::<Result<Vec<_>>>()
        .map(json_patch::Patch)
}
