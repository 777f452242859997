// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::release::ReleaseError;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Auth header resolution failed: {0}")]
    AuthHeaderError(String),

    #[error("Chart error: {0}")]
    ChartError(#[from] ChartError),

    #[error("Release engine error: {0}")]
    ReleaseError(#[from] ReleaseError),
}

impl ControllerError {
    /// Failures that retrying the same declaration will not fix
    pub fn is_permanent(&self) -> bool {
        matches!(self, ControllerError::ChartError(e) if e.is_permanent())
    }
}

/// Failures while resolving or downloading a chart
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{what} request to {url} failed with status {status}")]
    Status {
        what: &'static str,
        url: String,
        status: u16,
    },

    #[error("invalid repository index: {0}")]
    IndexParse(String),

    #[error("chart {chart:?} not found in repository")]
    ChartNotFound { chart: String },

    #[error("chart {chart:?} version {version:?} not found in repository")]
    VersionNotFound { chart: String, version: String },

    #[error("chart {chart:?} version {version:?} has no downloadable URLs")]
    NoDownloadUrls { chart: String, version: String },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid chart archive: {0}")]
    Archive(String),

    #[error("chart archive {url} failed integrity check: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

impl ChartError {
    /// Errors that will not go away by retrying against the same repository content
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ChartError::ChartNotFound { .. }
                | ChartError::VersionNotFound { .. }
                | ChartError::NoDownloadUrls { .. }
                | ChartError::InvalidUrl { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
