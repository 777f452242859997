// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cached read access and optimistic writes for HelmRelease objects

use crate::error::Result;
use crate::kubernetes::keys::split_key;
use crate::types::HelmRelease;
use async_trait::async_trait;
use kube::{
    api::PostParams,
    runtime::reflector::{ObjectRef, Store},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The controller's view of HelmRelease declarations.
///
/// Reads come from a cache fed by the watch. Writes replace the whole object
/// and must carry the resource version that was read, so a concurrent change
/// surfaces as a conflict error instead of being overwritten.
#[async_trait]
pub trait DeclarationStore: Send + Sync {
    /// Look up a cached object by its `namespace/name` key
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<HelmRelease>>>;

    /// Persist `release`, failing on a resource version conflict
    async fn update(&self, release: &HelmRelease) -> Result<HelmRelease>;
}

/// DeclarationStore reading from a reflector cache and writing through the API
pub struct KubeDeclarationStore {
    client: Client,
    cache: Store<HelmRelease>,
}

impl KubeDeclarationStore {
    pub fn new(client: Client, cache: Store<HelmRelease>) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl DeclarationStore for KubeDeclarationStore {
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<HelmRelease>>> {
        let (namespace, name) = split_key(key)?;
        Ok(self.cache.get(&ObjectRef::new(name).within(namespace)))
    }

    #[instrument(skip(self, release), fields(release = %release.name_any()))]
    async fn update(&self, release: &HelmRelease) -> Result<HelmRelease> {
        let namespace = release.namespace().unwrap_or_default();
        let api: Api<HelmRelease> = Api::namespaced(self.client.clone(), &namespace);

        debug!(
            "Replacing {}/{} at resource version {:?}",
            namespace,
            release.name_any(),
            release.resource_version()
        );
        Ok(api
            .replace(&release.name_any(), &PostParams::default(), release)
            .await?)
    }
}
