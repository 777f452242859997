// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Downloads chart archives and loads them

use crate::chart::index::ChartVersion;
use crate::chart::loader::{ArchiveLoader, Chart};
use crate::chart::resolver::ResolvedChart;
use crate::chart::transport::HttpTransport;
use crate::error::ChartError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Integrity check run on every downloaded archive before it is loaded
pub trait ChartVerifier: Send + Sync {
    fn verify(&self, url: &str, entry: &ChartVersion, archive: &[u8]) -> Result<(), ChartError>;
}

/// Compares the archive's sha256 with the digest published in the repository index.
/// Entries without a digest pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestVerifier;

impl ChartVerifier for DigestVerifier {
    fn verify(&self, url: &str, entry: &ChartVersion, archive: &[u8]) -> Result<(), ChartError> {
        let Some(expected) = entry.digest.as_deref() else {
            debug!("No digest published for {}, skipping verification", url);
            return Ok(());
        };

        let actual = hex::encode(Sha256::digest(archive));
        let expected = expected.trim().to_lowercase();
        let expected = expected.strip_prefix("sha256:").unwrap_or(&expected);
        if expected != actual {
            return Err(ChartError::DigestMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}

pub struct ChartFetcher {
    transport: Arc<dyn HttpTransport>,
    loader: Arc<dyn ArchiveLoader>,
    verifier: Option<Arc<dyn ChartVerifier>>,
}

impl ChartFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, loader: Arc<dyn ArchiveLoader>) -> Self {
        Self {
            transport,
            loader,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ChartVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn verifies(&self) -> bool {
        self.verifier.is_some()
    }

    /// Download an archive and hand it to the loader
    #[instrument(skip(self, auth_header))]
    pub async fn fetch_archive(
        &self,
        url: &str,
        auth_header: Option<&str>,
    ) -> Result<Chart, ChartError> {
        self.download(url, auth_header, None).await
    }

    /// Download a resolved chart, verifying it against its index entry when a verifier is set
    pub async fn fetch(
        &self,
        chart: &ResolvedChart,
        auth_header: Option<&str>,
    ) -> Result<Chart, ChartError> {
        self.download(&chart.url, auth_header, Some(&chart.entry)).await
    }

    async fn download(
        &self,
        url: &str,
        auth_header: Option<&str>,
        entry: Option<&ChartVersion>,
    ) -> Result<Chart, ChartError> {
        info!("Downloading {} ...", url);
        let response = self.transport.get(url, auth_header).await?;
        if !response.is_ok() {
            return Err(ChartError::Status {
                what: "chart download",
                url: url.to_string(),
                status: response.status,
            });
        }

        if let (Some(verifier), Some(entry)) = (&self.verifier, entry) {
            verifier.verify(url, entry, &response.body)?;
        }

        self.loader.load(response.body)
    }
}
