//! Gating stories
//!
//! Pods that do not ask for injection, Pods in system namespaces and
//! non-CREATE operations are admitted untouched.

use serde_json::json;

use sidecar_injector::config::MergePolicy;

use super::helpers::{admit, patch_ops, pod, review, router, InMemoryConfigMaps, UID};

const DOC: &str = "- name: proxy\n  containers:\n    - name: proxy\n      image: proxy:1\n";

fn config(namespace: &str) -> InMemoryConfigMaps {
    InMemoryConfigMaps::new().with(namespace, "proxy", &[("sidecars.yaml", DOC)])
}

#[tokio::test]
async fn story_control_plane_pods_are_never_injected() {
    let submitted = pod(json!({
        "injector.server-lab.info/inject": "proxy",
        "injector.server-lab.info/config": "env"
    }));
    for namespace in ["kube-system", "kube-public"] {
        let response = admit(
            router(config(namespace), MergePolicy::default()),
            &review("CREATE", namespace, &submitted),
        )
        .await;
        assert_eq!(response["uid"], json!(UID));
        assert_eq!(response["allowed"], json!(true));
        assert!(patch_ops(&response).is_none(), "{namespace} was patched");
    }
}

#[tokio::test]
async fn story_updates_and_deletes_pass_through() {
    let submitted = pod(json!({"injector.server-lab.info/inject": "proxy"}));
    for operation in ["UPDATE", "DELETE"] {
        let response = admit(
            router(config("default"), MergePolicy::default()),
            &review(operation, "default", &submitted),
        )
        .await;
        assert_eq!(response["allowed"], json!(true));
        assert!(patch_ops(&response).is_none(), "{operation} was patched");
    }
}

#[tokio::test]
async fn story_unannotated_pod_is_untouched() {
    let submitted = pod(json!({"prometheus.io/scrape": "true"}));
    let response = admit(
        router(config("default"), MergePolicy::default()),
        &review("CREATE", "default", &submitted),
    )
    .await;
    assert_eq!(response["allowed"], json!(true));
    assert!(patch_ops(&response).is_none());
}

#[tokio::test]
async fn story_annotated_create_in_default_namespace_is_patched() {
    let submitted = pod(json!({"injector.server-lab.info/inject": "proxy"}));
    let response = admit(
        router(config("default"), MergePolicy::default()),
        &review("CREATE", "default", &submitted),
    )
    .await;
    let ops = patch_ops(&response).expect("patch present");
    assert_eq!(
        ops,
        vec![json!({
            "op": "add",
            "path": "/spec/containers/-",
            "value": {"name": "proxy", "image": "proxy:1"}
        })]
    );
}
