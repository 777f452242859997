// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API service and in-memory fakes of the
//! controller's injected capabilities.

use crate::chart::{ArchiveLoader, Chart, ChartMetadata, HttpResponse, HttpTransport};
use crate::error::{ChartError, ControllerError, Result};
use crate::kubernetes::{key_for, split_key, DeclarationStore, SecretStore};
use crate::release::{ReleaseClient, ReleaseError, ReleaseInfo};
use crate::types::{HelmRelease, HelmReleaseSpec};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::error::ErrorResponse;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

fn status_json(code: u16, reason: &str, message: String) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", format!("{} \"{}\" not found", resource, name))
}

/// Create a 409 conflict response as returned for a stale resource version
pub fn conflict_json(resource: &str, name: &str) -> String {
    status_json(
        409,
        "Conflict",
        format!(
            "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
            resource, name
        ),
    )
}

/// Create a Secret JSON response
pub fn secret_json(namespace: &str, name: &str, data: &[(&str, &str)]) -> String {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    };
    serde_json::to_string(&secret).unwrap()
}

/// Create a HelmRelease JSON response
pub fn helm_release_json(namespace: &str, name: &str, resource_version: &str) -> String {
    serde_json::json!({
        "apiVersion": "helm.bitnami.com/v1",
        "kind": "HelmRelease",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": resource_version,
            "uid": "test-uid"
        },
        "spec": {
            "chartName": "foo"
        }
    })
    .to_string()
}

/// A HelmRelease for chart `foo` at resource version 1
pub fn make_helm_release(namespace: &str, name: &str) -> HelmRelease {
    let mut release = HelmRelease::new(
        name,
        HelmReleaseSpec {
            chart_name: "foo".to_string(),
            ..Default::default()
        },
    );
    release.metadata.namespace = Some(namespace.to_string());
    release.metadata.resource_version = Some("1".to_string());
    release
}

fn api_error(code: u16, reason: &str, message: String) -> ControllerError {
    ControllerError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

/// HttpTransport serving canned responses by URL, 404 for anything else
#[derive(Clone, Default)]
pub struct FakeTransport {
    responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ok(self, url: &str, body: &str) -> Self {
        self.with_bytes(url, Bytes::from(body.to_string()))
    }

    pub fn with_bytes(self, url: &str, body: Bytes) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), HttpResponse { status: 200, body });
        self
    }

    /// Every request made so far as `(url, auth header)`
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(
        &self,
        url: &str,
        auth_header: Option<&str>,
    ) -> std::result::Result<HttpResponse, ChartError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), auth_header.map(String::from)));

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: Bytes::new(),
            }))
    }
}

/// ArchiveLoader accepting any bytes
pub struct FakeLoader;

impl ArchiveLoader for FakeLoader {
    fn load(&self, archive: Bytes) -> std::result::Result<Chart, ChartError> {
        Ok(Chart {
            metadata: ChartMetadata {
                name: "fake".to_string(),
                version: "0.0.0".to_string(),
                ..Default::default()
            },
            archive,
        })
    }
}

/// A call made against [`FakeReleaseClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseCall {
    Install { namespace: String, release: String },
    Upgrade { namespace: String, release: String },
    Delete { namespace: String, release: String, purge: bool },
    History { namespace: String, release: String },
    Status { namespace: String, release: String },
}

#[derive(Default)]
struct FakeReleaseState {
    releases: HashMap<String, ReleaseInfo>,
    calls: Vec<ReleaseCall>,
    fail_status: bool,
}

/// ReleaseClient keeping releases in memory, keyed by release name
#[derive(Clone, Default)]
pub struct FakeReleaseClient {
    state: Arc<Mutex<FakeReleaseState>>,
}

impl FakeReleaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing release
    pub fn with_release(self, namespace: &str, release: &str) -> Self {
        self.state.lock().unwrap().releases.insert(
            release.to_string(),
            ReleaseInfo {
                name: release.to_string(),
                namespace: namespace.to_string(),
                revision: 1,
                status: "deployed".to_string(),
            },
        );
        self
    }

    /// Make every status lookup fail
    pub fn failing_status(self) -> Self {
        self.state.lock().unwrap().fail_status = true;
        self
    }

    pub fn calls(&self) -> Vec<ReleaseCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than history and status lookups
    pub fn mutations(&self) -> Vec<ReleaseCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    ReleaseCall::History { .. } | ReleaseCall::Status { .. }
                )
            })
            .collect()
    }

    pub fn release(&self, release: &str) -> Option<ReleaseInfo> {
        self.state.lock().unwrap().releases.get(release).cloned()
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().unwrap().releases.len()
    }

    fn record(&self, call: ReleaseCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ReleaseClient for FakeReleaseClient {
    async fn install(
        &self,
        _chart: &Chart,
        namespace: &str,
        release: &str,
        _values: &str,
    ) -> std::result::Result<ReleaseInfo, ReleaseError> {
        self.record(ReleaseCall::Install {
            namespace: namespace.to_string(),
            release: release.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if state.releases.contains_key(release) {
            return Err(ReleaseError::Engine {
                operation: "install",
                release: release.to_string(),
                message: "cannot re-use a name that is still in use".to_string(),
            });
        }
        let info = ReleaseInfo {
            name: release.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            status: "deployed".to_string(),
        };
        state.releases.insert(release.to_string(), info.clone());
        Ok(info)
    }

    async fn upgrade(
        &self,
        namespace: &str,
        release: &str,
        _chart: &Chart,
        _values: &str,
    ) -> std::result::Result<ReleaseInfo, ReleaseError> {
        self.record(ReleaseCall::Upgrade {
            namespace: namespace.to_string(),
            release: release.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        let info = state
            .releases
            .get_mut(release)
            .ok_or_else(|| ReleaseError::NotFound(release.to_string()))?;
        info.revision += 1;
        Ok(info.clone())
    }

    async fn delete(
        &self,
        namespace: &str,
        release: &str,
        purge: bool,
    ) -> std::result::Result<(), ReleaseError> {
        self.record(ReleaseCall::Delete {
            namespace: namespace.to_string(),
            release: release.to_string(),
            purge,
        });

        self.state
            .lock()
            .unwrap()
            .releases
            .remove(release)
            .map(|_| ())
            .ok_or_else(|| ReleaseError::NotFound(release.to_string()))
    }

    async fn history(
        &self,
        namespace: &str,
        release: &str,
        max: u32,
    ) -> std::result::Result<Vec<ReleaseInfo>, ReleaseError> {
        self.record(ReleaseCall::History {
            namespace: namespace.to_string(),
            release: release.to_string(),
        });

        let state = self.state.lock().unwrap();
        let info = state
            .releases
            .get(release)
            .ok_or_else(|| ReleaseError::NotFound(release.to_string()))?;
        Ok(std::iter::once(info.clone()).take(max as usize).collect())
    }

    async fn status(
        &self,
        namespace: &str,
        release: &str,
    ) -> std::result::Result<String, ReleaseError> {
        self.record(ReleaseCall::Status {
            namespace: namespace.to_string(),
            release: release.to_string(),
        });

        let state = self.state.lock().unwrap();
        if state.fail_status {
            return Err(ReleaseError::Engine {
                operation: "status",
                release: release.to_string(),
                message: "connection refused".to_string(),
            });
        }
        state
            .releases
            .get(release)
            .map(|info| info.status.clone())
            .ok_or_else(|| ReleaseError::NotFound(release.to_string()))
    }
}

/// SecretStore holding secrets in memory
#[derive(Clone, Default)]
pub struct FakeSecretStore {
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        self.secrets.insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                api_error(
                    404,
                    "NotFound",
                    format!("secrets \"{}\" not found", name),
                )
            })
    }
}

#[derive(Default)]
struct InMemoryState {
    objects: HashMap<String, HelmRelease>,
    updates: usize,
    concurrent_edit: Option<HelmRelease>,
}

/// DeclarationStore behaving like the API server for updates: a stale
/// resource version is a conflict, and an object being deleted disappears
/// once its last finalizer is removed.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, release: HelmRelease) -> Self {
        self.insert(release);
        self
    }

    /// Store `release` as is, simulating a change made by someone else
    pub fn insert(&self, release: HelmRelease) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key_for(&release), release);
    }

    pub fn get(&self, key: &str) -> Option<HelmRelease> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    /// Store `release` right after the next read, so the reader's copy is stale
    pub fn with_concurrent_edit(self, release: HelmRelease) -> Self {
        self.state.lock().unwrap().concurrent_edit = Some(release);
        self
    }

    /// Number of successful updates
    pub fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }
}

#[async_trait]
impl DeclarationStore for InMemoryStore {
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<HelmRelease>>> {
        split_key(key)?;
        let mut state = self.state.lock().unwrap();
        let found = state.objects.get(key).cloned().map(Arc::new);
        if let Some(edit) = state.concurrent_edit.take() {
            state.objects.insert(key_for(&edit), edit);
        }
        Ok(found)
    }

    async fn update(&self, release: &HelmRelease) -> Result<HelmRelease> {
        let key = key_for(release);
        let mut state = self.state.lock().unwrap();

        let stored_version = state
            .objects
            .get(&key)
            .ok_or_else(|| {
                api_error(
                    404,
                    "NotFound",
                    format!("helmreleases \"{}\" not found", release.name_any()),
                )
            })?
            .resource_version();
        if stored_version != release.resource_version() {
            return Err(api_error(
                409,
                "Conflict",
                format!(
                    "Operation cannot be fulfilled on helmreleases \"{}\"",
                    release.name_any()
                ),
            ));
        }

        let mut updated = release.clone();
        let next = stored_version
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        updated.metadata.resource_version = Some(next.to_string());
        state.updates += 1;

        if updated.is_being_deleted() && updated.finalizers().is_empty() {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }
}
