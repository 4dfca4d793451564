use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{http, Request, Response};
use maplit::btreemap;
use prometheus_client::registry::Registry;
use registry_policy_controller_runtime::{
    core::{PolicySource, RegistryPolicy, StaticPolicy},
    Admission, AdmissionMetrics, Pipeline, VALIDATE_PATH,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower::Service;

fn policy() -> RegistryPolicy {
    RegistryPolicy {
        common: vec!["registry.kupher.io/".into(), "ghcr.io/your-org/".into()],
        per_namespace: btreemap! {
            "devops".into() => vec!["ghcr.io/devops-team/".into()],
        },
    }
}

fn admission(source: impl PolicySource + 'static) -> Admission {
    let mut prom = Registry::default();
    let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
    Admission::new(Pipeline::new(source), metrics)
}

/// Wraps a workload object in an `AdmissionReview` as the API server would.
fn review_of(uid: &str, object: &Value) -> Value {
    let kind = object["kind"].as_str().expect("object must have a kind");
    let (group, version) = match object["apiVersion"].as_str() {
        Some(api_version) => api_version.split_once('/').unwrap_or(("", api_version)),
        None => ("", "v1"),
    };
    let namespace = object["metadata"]["namespace"].as_str().unwrap_or("default");
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": { "group": group, "version": version, "kind": kind },
            "resource": {
                "group": group,
                "version": version,
                "resource": format!("{}s", kind.to_lowercase()),
            },
            "name": object["metadata"]["name"],
            "namespace": namespace,
            "operation": "CREATE",
            "userInfo": { "username": "system:admin" },
            "dryRun": false,
            "object": object,
        },
    })
}

fn post(path: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(http::Method::POST)
        .uri(path)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(body.into()))
        .unwrap()
}

async fn send(admission: &mut Admission, req: Request<Full<Bytes>>) -> (http::StatusCode, Bytes) {
    let rsp: Response<Full<Bytes>> = admission.call(req).await.expect("request must be served");
    let status = rsp.status();
    let body = rsp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn review(admission: &mut Admission, review: &Value) -> Value {
    let body = serde_json::to_vec(review).unwrap();
    let (status, body) = send(admission, post(VALIDATE_PATH, body)).await;
    assert_eq!(status, http::StatusCode::OK);
    serde_json::from_slice(&body).expect("response must be an AdmissionReview")
}

fn fixtures(dir: &str) -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(dir);
    let mut files = std::fs::read_dir(&dir)
        .unwrap_or_else(|error| panic!("failed to read {}: {error}", dir.display()))
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect::<Vec<_>>();
    files.sort();
    assert!(!files.is_empty(), "no fixtures in {}", dir.display());
    files
}

fn load(path: &Path) -> Value {
    let data = std::fs::read_to_string(path).unwrap();
    serde_yaml::from_str(&data)
        .unwrap_or_else(|error| panic!("failed to parse {}: {error}", path.display()))
}

#[tokio::test(flavor = "current_thread")]
async fn admits_pass_scenarios() {
    let mut admission = admission(StaticPolicy::new(policy()));
    for path in fixtures("pass") {
        let rsp = review(&mut admission, &review_of("pass", &load(&path))).await;
        assert_eq!(
            rsp["response"]["allowed"],
            json!(true),
            "{} must be admitted: {rsp}",
            path.display()
        );
        assert_eq!(rsp["response"]["uid"], json!("pass"));
    }
}

#[tokio::test(flavor = "current_thread")]
async fn rejects_fail_scenarios() {
    let mut admission = admission(StaticPolicy::new(policy()));
    for path in fixtures("fail") {
        let rsp = review(&mut admission, &review_of("fail", &load(&path))).await;
        assert_eq!(
            rsp["response"]["allowed"],
            json!(false),
            "{} must be rejected: {rsp}",
            path.display()
        );
        let message = rsp["response"]["status"]["message"].as_str().unwrap_or("");
        assert!(!message.is_empty(), "{} denied without a reason", path.display());
    }
}

#[tokio::test(flavor = "current_thread")]
async fn denial_names_unsupported_kind() {
    let mut admission = admission(StaticPolicy::new(policy()));
    let job = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": { "name": "once", "namespace": "default" },
        "spec": {},
    });
    let rsp = review(&mut admission, &review_of("job", &job)).await;
    assert_eq!(rsp["response"]["allowed"], json!(false));
    assert_eq!(
        rsp["response"]["status"]["message"],
        json!("unsupported kind: Job")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn serves_root_path() {
    let mut admission = admission(StaticPolicy::new(policy()));
    let pod = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "web", "namespace": "default" },
        "spec": { "containers": [{ "name": "web", "image": "ghcr.io/your-org/web:v1" }] },
    });
    let body = serde_json::to_vec(&review_of("root", &pod)).unwrap();
    let (status, body) = send(&mut admission, post("/", body)).await;
    assert_eq!(status, http::StatusCode::OK);
    let rsp: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(rsp["response"]["allowed"], json!(true));
}

#[tokio::test(flavor = "current_thread")]
async fn policy_failure_denies() {
    struct Unavailable;

    #[async_trait::async_trait]
    impl PolicySource for Unavailable {
        async fn load_policy(&self) -> anyhow::Result<RegistryPolicy> {
            anyhow::bail!("configmap not mounted")
        }
    }

    let mut admission = admission(Unavailable);
    for path in fixtures("pass") {
        let rsp = review(&mut admission, &review_of("down", &load(&path))).await;
        assert_eq!(
            rsp["response"]["allowed"],
            json!(false),
            "{} must be rejected without a policy",
            path.display()
        );
    }
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_review_is_bad_request() {
    let mut admission = admission(StaticPolicy::new(policy()));

    let (status, body) = send(&mut admission, post(VALIDATE_PATH, "{not json")).await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert!(!body.is_empty());

    let no_request = json!({ "apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview" });
    let (status, _) = send(
        &mut admission,
        post(VALIDATE_PATH, serde_json::to_vec(&no_request).unwrap()),
    )
    .await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_routes_are_not_found() {
    let mut admission = admission(StaticPolicy::new(policy()));

    let (status, _) = send(&mut admission, post("/mutate", "{}")).await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);

    let get = Request::builder()
        .method(http::Method::GET)
        .uri(VALIDATE_PATH)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let (status, _) = send(&mut admission, get).await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
}
