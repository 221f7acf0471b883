//! Degradation stories
//!
//! Missing, unreadable or malformed configuration never blocks a Pod. Each
//! broken source contributes nothing and the rest still applies.

use serde_json::json;

use sidecar_injector::config::MergePolicy;

use super::helpers::{admit, apply, names, patch_ops, pod, review, router, InMemoryConfigMaps};

const PROXY_DOC: &str = r#"
- name: proxy
  containers:
    - name: proxy
      image: proxy:1
  labels:
    proxied: "yes"
"#;

// The first entry is valid, the second is not
const BROKEN_DOC: &str = r#"
- name: half
  containers:
    - name: half
- name: bad
  volumes: {not: a-list}
"#;

#[tokio::test]
async fn story_missing_config_map_yields_same_patch_as_present_one_alone() {
    let source = || {
        InMemoryConfigMaps::new().with("shop", "proxy", &[("sidecars.yaml", PROXY_DOC)])
    };

    let with_missing = pod(json!({"injector.server-lab.info/inject": "does-not-exist,proxy"}));
    let alone = pod(json!({"injector.server-lab.info/inject": "proxy"}));

    let degraded = admit(
        router(source(), MergePolicy::default()),
        &review("CREATE", "shop", &with_missing),
    )
    .await;
    let reference = admit(
        router(source(), MergePolicy::default()),
        &review("CREATE", "shop", &alone),
    )
    .await;

    assert_eq!(degraded["allowed"], json!(true));
    assert!(patch_ops(&degraded).is_some());
    assert_eq!(patch_ops(&degraded), patch_ops(&reference));
}

#[tokio::test]
async fn story_malformed_document_is_skipped_whole() {
    let source = InMemoryConfigMaps::new()
        .with("shop", "broken", &[("sidecars.yaml", BROKEN_DOC)])
        .with("shop", "proxy", &[("sidecars.yaml", PROXY_DOC)]);

    let submitted = pod(json!({"injector.server-lab.info/inject": "broken,proxy"}));
    let response = admit(
        router(source, MergePolicy::default()),
        &review("CREATE", "shop", &submitted),
    )
    .await;
    let patched = apply(&submitted, &response);

    // Nothing from the broken document, not even its valid first entry
    assert_eq!(names(&patched, "/spec/containers"), vec!["app", "metrics", "proxy"]);
}

#[tokio::test]
async fn story_unreadable_env_config_map_still_injects_sidecars() {
    let source = InMemoryConfigMaps::new()
        .failing("shared-env")
        .with("shop", "proxy", &[("sidecars.yaml", PROXY_DOC)]);

    let submitted = pod(json!({
        "injector.server-lab.info/inject": "proxy",
        "injector.server-lab.info/config": "shared-env"
    }));
    let response = admit(
        router(source, MergePolicy::default()),
        &review("CREATE", "shop", &submitted),
    )
    .await;
    let patched = apply(&submitted, &response);

    assert_eq!(response["allowed"], json!(true));
    assert_eq!(names(&patched, "/spec/containers"), vec!["app", "metrics", "proxy"]);
    assert_eq!(
        patched["spec"]["containers"][0]["env"],
        json!([{"name": "PORT", "value": "8080"}])
    );
}

#[tokio::test]
async fn story_nothing_resolvable_admits_unmodified() {
    let submitted = pod(json!({
        "injector.server-lab.info/inject": "a, b",
        "injector.server-lab.info/config": "c"
    }));
    let response = admit(
        router(InMemoryConfigMaps::new(), MergePolicy::default()),
        &review("CREATE", "shop", &submitted),
    )
    .await;
    assert_eq!(response["allowed"], json!(true));
    assert!(patch_ops(&response).is_none());
}

#[tokio::test]
async fn story_config_maps_are_read_from_the_pod_namespace() {
    // Same name, different namespace: must not be picked up
    let source = InMemoryConfigMaps::new().with("other", "proxy", &[("sidecars.yaml", PROXY_DOC)]);
    let submitted = pod(json!({"injector.server-lab.info/inject": "proxy"}));
    let response = admit(
        router(source, MergePolicy::default()),
        &review("CREATE", "shop", &submitted),
    )
    .await;
    assert!(patch_ops(&response).is_none());
}
