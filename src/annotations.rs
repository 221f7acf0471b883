//! Prefixed annotation lookup
//!
//! The injector is driven by two annotations, both namespaced under a
//! configurable prefix: `{prefix}/{name}`.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;

/// Build the full annotation key for `suffix` under `prefix`
pub fn annotation_key(prefix: &str, suffix: &str) -> String {
    format!("{}/{}", prefix, suffix)
}

/// Look up `{prefix}/{suffix}` in an annotation map
///
/// Returns `None` when the map is absent or the key is missing. A present but
/// empty value is returned as `Some("")`; callers decide whether that counts.
pub fn get_annotation<'a>(
    annotations: Option<&'a BTreeMap<String, String>>,
    prefix: &str,
    suffix: &str,
) -> Option<&'a str> {
    let key = annotation_key(prefix, suffix);
    annotations
        .and_then(|a| a.get(&key))
        .map(String::as_str)
}

/// Name used to identify a Pod in logs
///
/// Pods created by controllers usually only carry `generateName` at admission
/// time, so that is preferred when set.
pub fn display_name(meta: &ObjectMeta) -> String {
    meta.generate_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or(meta.name.as_deref())
        .unwrap_or_default()
        .to_string()
}
