// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::SecretKeySelector;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Desired state of a chart release.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "helm.bitnami.com", version = "v1", kind = "HelmRelease")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    /// Base URL of the chart repository, defaults to the configured repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub chart_name: String,
    /// Chart version, empty selects the newest version in the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<HelmReleaseAuth>,
    /// Overrides the default `<namespace>-<name>` release name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    /// Unparsed YAML values handed to the release engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseAuth {
    /// Header based authorization for repository and archive requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HelmReleaseAuthHeader>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseAuthHeader {
    /// Key of a secret in the controller's namespace holding the header value
    pub secret_key_ref: SecretKeySelector,
}

/// Where a HelmRelease sits in the finalizer-guarded lifecycle.
///
/// `Gone` is not derived from an object: it is the state of a key whose
/// object is no longer in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Gone,
    New,
    Synced,
    Deleting,
    Deleted,
}

impl HelmRelease {
    /// Release name in the release engine
    pub fn release_name(&self) -> String {
        match self.spec.release_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-{}", self.namespace().unwrap_or_default(), self.name_any()),
        }
    }

    /// Requested chart version, `None` means newest
    pub fn chart_version(&self) -> Option<&str> {
        self.spec
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn values(&self) -> &str {
        self.spec.values.as_deref().unwrap_or_default()
    }

    /// Secret key holding the Authorization header, if any
    pub fn auth_secret_ref(&self) -> Option<&SecretKeySelector> {
        self.spec
            .auth
            .as_ref()
            .and_then(|a| a.header.as_ref())
            .map(|h| &h.secret_key_ref)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers().iter().any(|f| f == token)
    }

    /// Add `token` unless already present. Returns whether the object changed.
    pub fn add_finalizer(&mut self, token: &str) -> bool {
        if self.has_finalizer(token) {
            return false;
        }
        self.finalizers_mut().push(token.to_string());
        true
    }

    /// Remove every occurrence of `token`, leaving other finalizers in place.
    /// Returns whether the object changed.
    pub fn remove_finalizer(&mut self, token: &str) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != token);
        before != finalizers.len()
    }

    pub fn lifecycle(&self, token: &str) -> LifecycleState {
        match (self.has_finalizer(token), self.is_being_deleted()) {
            (false, false) => LifecycleState::New,
            (true, false) => LifecycleState::Synced,
            (true, true) => LifecycleState::Deleting,
            (false, true) => LifecycleState::Deleted,
        }
    }
}
