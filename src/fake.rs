//! An in-memory apiserver behind a real [`kube::Client`], for tests.
use std::{collections::HashMap, sync::Arc};

use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use kube::client::Body;
use parking_lot::Mutex;
use serde_json::{Value, json};

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Requests seen by a [`FakeApiServer`], as `"<METHOD> <path>"`.
#[derive(Clone, Default)]
pub(crate) struct RequestLog(Arc<Mutex<Vec<String>>>);

impl RequestLog {
    pub(crate) fn requests(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub(crate) fn count(&self, request: &str) -> usize {
        self.0.lock().iter().filter(|r| *r == request).count()
    }
}

/// Serves fixed discovery documents plus a tiny object store.
///
/// `POST` to a collection stores the object under `<collection>/<name>`, and
/// `GET`/`PUT`/`DELETE` operate on that key. Anything else answers `404`.
pub(crate) struct FakeApiServer {
    documents: HashMap<String, Value>,
    objects: HashMap<String, Value>,
    log: RequestLog,
}

impl FakeApiServer {
    pub(crate) fn new() -> Self {
        Self {
            documents: HashMap::new(),
            objects: HashMap::new(),
            log: RequestLog::default(),
        }
    }

    /// A cluster serving the core group, `apps/v1` and `batch/v1`.
    pub(crate) fn cluster() -> Self {
        Self::new()
            .document(
                "/version",
                json!({
                    "major": "1",
                    "minor": "33",
                    "gitVersion": "v1.33.1",
                    "gitCommit": "8adc0f041b8e7ad1d30e29cc59c6ae7a15e19828",
                    "gitTreeState": "clean",
                    "buildDate": "2025-05-15T08:19:08Z",
                    "goVersion": "go1.24.2",
                    "compiler": "gc",
                    "platform": "linux/amd64",
                }),
            )
            .document(
                "/apis",
                json!({
                    "kind": "APIGroupList",
                    "apiVersion": "v1",
                    "groups": [
                        group("apps", &["v1"]),
                        group("batch", &["v1"]),
                    ],
                }),
            )
            .document(
                "/api/v1",
                resource_list(
                    "v1",
                    &[
                        ("pods", "Pod", true),
                        ("pods/status", "Pod", true),
                        ("configmaps", "ConfigMap", true),
                        ("namespaces", "Namespace", false),
                    ],
                ),
            )
            .document(
                "/apis/apps/v1",
                resource_list(
                    "apps/v1",
                    &[
                        ("deployments", "Deployment", true),
                        ("deployments/scale", "Scale", true),
                    ],
                ),
            )
            .document(
                "/apis/batch/v1",
                resource_list("batch/v1", &[("jobs", "Job", true), ("cronjobs", "CronJob", true)]),
            )
    }

    /// Answer `GET <path>` with `value`.
    pub(crate) fn document(mut self, path: &str, value: Value) -> Self {
        self.documents.insert(path.to_string(), value);
        self
    }

    /// Spawn the server and return a client talking to it.
    pub(crate) fn start(self) -> (kube::Client, RequestLog) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let log = self.log.clone();
        tokio::spawn(self.serve(handle));
        (kube::Client::new(mock_service, "default"), log)
    }

    async fn serve(mut self, mut handle: ApiServerHandle) {
        while let Some((request, send)) = handle.next_request().await {
            let response = self.respond(request).await;
            send.send_response(response);
        }
    }

    async fn respond(&mut self, request: Request<Body>) -> Response<Body> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        self.log.0.lock().push(format!("{method} {path}"));
        let body = match request.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => return status(StatusCode::BAD_REQUEST, "unreadable body"),
        };

        match method {
            Method::GET => match self.documents.get(&path).or_else(|| self.objects.get(&path)) {
                Some(value) => reply(StatusCode::OK, value),
                None => status(StatusCode::NOT_FOUND, &path),
            },
            Method::POST => {
                let Ok(mut object) = serde_json::from_slice::<Value>(&body) else {
                    return status(StatusCode::BAD_REQUEST, "invalid object");
                };
                let Some(name) = object["metadata"]["name"].as_str().map(str::to_string) else {
                    return status(StatusCode::UNPROCESSABLE_ENTITY, "name is required");
                };
                let key = format!("{path}/{name}");
                if self.objects.contains_key(&key) {
                    return status(StatusCode::CONFLICT, &key);
                }
                object["metadata"]["uid"] = json!(format!("uid-{name}"));
                object["metadata"]["resourceVersion"] = json!("1");
                self.objects.insert(key, object.clone());
                reply(StatusCode::CREATED, &object)
            }
            Method::PUT => {
                let Some(stored) = self.objects.get(&path) else {
                    return status(StatusCode::NOT_FOUND, &path);
                };
                let Ok(mut object) = serde_json::from_slice::<Value>(&body) else {
                    return status(StatusCode::BAD_REQUEST, "invalid object");
                };
                let version = stored["metadata"]["resourceVersion"]
                    .as_str()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or_default();
                object["metadata"]["resourceVersion"] = json!((version + 1).to_string());
                self.objects.insert(path, object.clone());
                reply(StatusCode::OK, &object)
            }
            Method::DELETE => match self.objects.remove(&path) {
                Some(object) => reply(StatusCode::OK, &object),
                None => status(StatusCode::NOT_FOUND, &path),
            },
            _ => status(StatusCode::METHOD_NOT_ALLOWED, method.as_str()),
        }
    }
}

fn group(name: &str, versions: &[&str]) -> Value {
    let versions: Vec<Value> = versions
        .iter()
        .map(|v| json!({ "groupVersion": format!("{name}/{v}"), "version": v }))
        .collect();
    json!({
        "name": name,
        "versions": versions,
        "preferredVersion": versions[0],
    })
}

/// An `APIResourceList` for `group_version` with `(name, kind, namespaced)` entries.
pub(crate) fn resource_list(group_version: &str, resources: &[(&str, &str, bool)]) -> Value {
    let resources: Vec<Value> = resources
        .iter()
        .map(|(name, kind, namespaced)| {
            json!({
                "name": name,
                "singularName": "",
                "namespaced": namespaced,
                "kind": kind,
                "verbs": ["create", "delete", "get", "list", "patch", "update", "watch"],
            })
        })
        .collect();
    json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": group_version,
        "resources": resources,
    })
}

fn reply(code: StatusCode, value: &Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .body(Body::from(serde_json::to_vec(value).unwrap()))
        .unwrap()
}

fn status(code: StatusCode, message: &str) -> Response<Body> {
    let reason = code.canonical_reason().unwrap_or_default().replace(' ', "");
    reply(
        code,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code.as_u16(),
        }),
    )
}
