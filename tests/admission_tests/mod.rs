//! Admission stories
//!
//! - `injection`: Stories about Pods that request sidecars, env and metadata
//!   and what they look like once the patch is applied
//!
//! - `degradation`: Stories about missing or broken configuration, and how the
//!   webhook keeps admitting Pods regardless
//!
//! - `gating`: Stories about Pods and operations the webhook leaves alone

mod degradation;
mod gating;
mod helpers;
