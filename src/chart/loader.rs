// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turning downloaded archive bytes into a chart

use crate::error::ChartError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use tar::Archive;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A loaded chart, handed as-is to the release engine
#[derive(Debug, Clone, Default)]
pub struct Chart {
    pub metadata: ChartMetadata,
    /// The packaged archive the chart was loaded from
    pub archive: Bytes,
}

/// Capability turning archive bytes into a chart
pub trait ArchiveLoader: Send + Sync {
    fn load(&self, archive: Bytes) -> Result<Chart, ChartError>;
}

/// Loads gzip compressed tarballs laid out as `<chart>/Chart.yaml`
#[derive(Debug, Clone, Copy, Default)]
pub struct TarballLoader;

impl ArchiveLoader for TarballLoader {
    fn load(&self, archive: Bytes) -> Result<Chart, ChartError> {
        let metadata = read_chart_metadata(&archive)?;
        Ok(Chart { metadata, archive })
    }
}

fn read_chart_metadata(data: &[u8]) -> Result<ChartMetadata, ChartError> {
    let archive_error = |e: std::io::Error| ChartError::Archive(e.to_string());
    let mut archive = Archive::new(GzDecoder::new(data));

    for entry in archive.entries().map_err(archive_error)? {
        let mut entry = entry.map_err(archive_error)?;
        let path = entry.path().map_err(archive_error)?.to_string_lossy().to_string();

        // Only the top-level chart's Chart.yaml; subcharts live deeper
        let mut parts = path.trim_start_matches("./").split('/');
        if !matches!((parts.next(), parts.next(), parts.next()), (Some(_), Some("Chart.yaml"), None)) {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(archive_error)?;
        let metadata: ChartMetadata = serde_yaml::from_str(&content)
            .map_err(|e| ChartError::Archive(format!("invalid {}: {}", path, e)))?;
        if metadata.name.is_empty() {
            return Err(ChartError::Archive(format!("{} has no chart name", path)));
        }
        return Ok(metadata);
    }

    Err(ChartError::Archive("Chart.yaml not found".to_string()))
}
