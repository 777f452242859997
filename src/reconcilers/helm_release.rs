// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HelmRelease reconciler - drives a declaration through its finalizer-guarded
//! lifecycle and converges the matching release.

use crate::chart::{ChartFetcher, ChartResolver};
use crate::config::Config;
use crate::constants::FINALIZER;
use crate::error::Result;
use crate::kubernetes::{read_secret_key, DeclarationStore, SecretStore};
use crate::reconcilers::Reconcile;
use crate::release::{ReleaseClient, ReleaseInfo};
use crate::types::{HelmRelease, LifecycleState};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct HelmReleaseReconciler {
    config: Arc<Config>,
    store: Arc<dyn DeclarationStore>,
    secrets: Arc<dyn SecretStore>,
    releases: Arc<dyn ReleaseClient>,
    resolver: ChartResolver,
    fetcher: ChartFetcher,
}

impl HelmReleaseReconciler {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn DeclarationStore>,
        secrets: Arc<dyn SecretStore>,
        releases: Arc<dyn ReleaseClient>,
        resolver: ChartResolver,
        fetcher: ChartFetcher,
    ) -> Self {
        Self {
            config,
            store,
            secrets,
            releases,
            resolver,
            fetcher,
        }
    }

    async fn add_finalizer(&self, release: &HelmRelease) -> Result<()> {
        let mut updated = release.clone();
        if updated.add_finalizer(FINALIZER) {
            self.store.update(&updated).await?;
            info!(
                "Added finalizer to {}/{}",
                release.namespace().unwrap_or_default(),
                release.name_any()
            );
        }
        Ok(())
    }

    /// Value of the Authorization header for chart requests, if the declaration asks for one
    async fn auth_header(&self, release: &HelmRelease) -> Result<Option<String>> {
        let Some(selector) = release.auth_secret_ref() else {
            return Ok(None);
        };

        let header = read_secret_key(
            self.secrets.as_ref(),
            &self.config.controller_namespace,
            &selector.name,
            &selector.key,
        )
        .await?;
        Ok(Some(header))
    }

    fn repo_url<'a>(&'a self, release: &'a HelmRelease) -> &'a str {
        release
            .spec
            .repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.config.default_repo_url)
    }

    async fn release_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.releases.history(namespace, name, 1).await {
            Ok(history) => Ok(!history.is_empty()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the requested chart and install or upgrade the release
    async fn sync(&self, release: &HelmRelease) -> Result<()> {
        let auth_header = self.auth_header(release).await?;

        let resolved = self
            .resolver
            .resolve(
                self.repo_url(release),
                &release.spec.chart_name,
                release.chart_version(),
                auth_header.as_deref(),
            )
            .await?;
        let chart = self.fetcher.fetch(&resolved, auth_header.as_deref()).await?;

        let namespace = release.namespace().unwrap_or_default();
        let name = release.release_name();
        let values = release.values();

        let deployed: ReleaseInfo = if self.release_exists(&namespace, &name).await? {
            info!("Upgrading release {} to {} {}", name, resolved.entry.name, resolved.entry.version);
            self.releases.upgrade(&namespace, &name, &chart, values).await?
        } else {
            info!("Installing release {} from {} {}", name, resolved.entry.name, resolved.entry.version);
            self.releases.install(&chart, &namespace, &name, values).await?
        };
        debug!("Release {} at revision {}", deployed.name, deployed.revision);

        // The release already changed; a failed lookup must not trigger a retry
        match self.releases.status(&namespace, &name).await {
            Ok(status) => info!("Release {} status: {}", name, status),
            Err(e) => warn!("Failed to get status of release {}: {}", name, e),
        }

        Ok(())
    }

    /// Purge the release, then let the declaration go
    async fn finalize(&self, release: &HelmRelease) -> Result<()> {
        let namespace = release.namespace().unwrap_or_default();
        let name = release.release_name();

        match self.releases.delete(&namespace, &name, true).await {
            Ok(()) => info!("Deleted release {}", name),
            Err(e) if e.is_not_found() => debug!("Release {} already deleted", name),
            Err(e) => return Err(e.into()),
        }

        let mut updated = release.clone();
        if updated.remove_finalizer(FINALIZER) {
            self.store.update(&updated).await?;
            info!("Removed finalizer from {}/{}", namespace, release.name_any());
        }
        Ok(())
    }
}

#[async_trait]
impl Reconcile for HelmReleaseReconciler {
    #[instrument(skip(self))]
    async fn reconcile(&self, key: &str) -> Result<()> {
        let Some(release) = self.store.get_by_key(key)? else {
            debug!("{} no longer exists, nothing to do", key);
            return Ok(());
        };

        match release.lifecycle(FINALIZER) {
            LifecycleState::New => self.add_finalizer(&release).await,
            LifecycleState::Synced => self.sync(&release).await,
            LifecycleState::Deleting => self.finalize(&release).await,
            LifecycleState::Deleted | LifecycleState::Gone => {
                debug!("{} already finalized, nothing to do", key);
                Ok(())
            }
        }
    }
}
