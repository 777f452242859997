// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Boundary to the release engine that installs charts into the cluster.

pub mod helm_cli;

pub use helm_cli::HelmCli;

use crate::chart::Chart;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The release does not exist. Callers treat this as a signal, not a failure.
    #[error("release {0} not found")]
    NotFound(String),

    #[error("{operation} of release {release} failed: {message}")]
    Engine {
        operation: &'static str,
        release: String,
        message: String,
    },
}

impl ReleaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReleaseError::NotFound(_))
    }
}

/// A release revision as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub status: String,
}

/// Operations the controller needs from the release engine.
///
/// Releases are scoped by namespace; `namespace` is the namespace of the
/// HelmRelease declaring them.
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    async fn install(
        &self,
        chart: &Chart,
        namespace: &str,
        release: &str,
        values: &str,
    ) -> Result<ReleaseInfo, ReleaseError>;

    async fn upgrade(
        &self,
        namespace: &str,
        release: &str,
        chart: &Chart,
        values: &str,
    ) -> Result<ReleaseInfo, ReleaseError>;

    /// Delete a release. `purge` also drops its stored history.
    async fn delete(&self, namespace: &str, release: &str, purge: bool) -> Result<(), ReleaseError>;

    /// Most recent revisions, newest first, at most `max` of them
    async fn history(
        &self,
        namespace: &str,
        release: &str,
        max: u32,
    ) -> Result<Vec<ReleaseInfo>, ReleaseError>;

    async fn status(&self, namespace: &str, release: &str) -> Result<String, ReleaseError>;
}
