// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolves a chart name and version to a download URL

use crate::chart::index::{ChartVersion, RepositoryIndex};
use crate::chart::transport::HttpTransport;
use crate::chart::url::{index_url, resolve_absolute_url};
use crate::error::ChartError;
use std::sync::Arc;
use tracing::{info, instrument};

/// A chart version located in a repository
#[derive(Debug, Clone)]
pub struct ResolvedChart {
    /// Absolute download URL
    pub url: String,
    pub entry: ChartVersion,
}

pub struct ChartResolver {
    transport: Arc<dyn HttpTransport>,
}

impl ChartResolver {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Download and parse a repository index
    #[instrument(skip(self, auth_header))]
    pub async fn fetch_index(
        &self,
        index_url: &str,
        auth_header: Option<&str>,
    ) -> Result<RepositoryIndex, ChartError> {
        let response = self.transport.get(index_url, auth_header).await?;
        if !response.is_ok() {
            return Err(ChartError::Status {
                what: "repo index",
                url: index_url.to_string(),
                status: response.status,
            });
        }
        RepositoryIndex::from_bytes(&response.body)
    }

    /// Locate `chart` in the repository at `repo_base`. `None` selects the newest version.
    pub async fn resolve(
        &self,
        repo_base: &str,
        chart: &str,
        version: Option<&str>,
        auth_header: Option<&str>,
    ) -> Result<ResolvedChart, ChartError> {
        let url = index_url(repo_base);
        info!("Downloading repo {} index...", url);
        let index = self.fetch_index(&url, auth_header).await?;

        let candidate = index.find_chart_url(chart, version)?;
        let url = resolve_absolute_url(repo_base, candidate)?;
        let entry = index.find_chart_version(chart, version)?.clone();

        Ok(ResolvedChart { url, entry })
    }
}
