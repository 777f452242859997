// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart repository index (`index.yaml`)

use crate::error::ChartError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default)]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartVersion>>,
}

/// One published version of a chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    #[serde(default)]
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
    /// sha256 of the archive, as published by the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl RepositoryIndex {
    /// Parse an index document and order every chart's versions newest first
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChartError> {
        let mut index: RepositoryIndex =
            serde_yaml::from_slice(bytes).map_err(|e| ChartError::IndexParse(e.to_string()))?;
        index.sort_entries();
        Ok(index)
    }

    /// Sort the versions of every chart, highest first
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(&b.version, &a.version));
        }
    }

    /// Find a chart version. `None` selects the first (newest) entry.
    pub fn find_chart_version(
        &self,
        chart: &str,
        version: Option<&str>,
    ) -> Result<&ChartVersion, ChartError> {
        let versions = self
            .entries
            .get(chart)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ChartError::ChartNotFound {
                chart: chart.to_string(),
            })?;

        match version {
            None => Ok(&versions[0]),
            Some(wanted) => versions
                .iter()
                .find(|v| v.version == wanted)
                .ok_or_else(|| ChartError::VersionNotFound {
                    chart: chart.to_string(),
                    version: wanted.to_string(),
                }),
        }
    }

    /// First download URL of a chart version, as written in the index
    pub fn find_chart_url(&self, chart: &str, version: Option<&str>) -> Result<&str, ChartError> {
        let entry = self.find_chart_version(chart, version)?;
        entry.first_url().ok_or_else(|| ChartError::NoDownloadUrls {
            chart: chart.to_string(),
            version: entry.version.clone(),
        })
    }
}

impl ChartVersion {
    pub fn first_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    Version::parse(version.strip_prefix('v').unwrap_or(version)).ok()
}

/// Semantic version order. Versions that are not valid semver sort below all
/// valid ones and compare lexically among themselves.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
