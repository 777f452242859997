// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ReleaseClient driving the `helm` binary

use crate::chart::Chart;
use crate::release::{ReleaseClient, ReleaseError, ReleaseInfo};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Marker helm prints on stderr for every lookup of a missing release
const NOT_FOUND_MARKER: &str = "release: not found";

pub struct HelmCli {
    binary: String,
    kube_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseOutput {
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    info: ReleaseOutputInfo,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseOutputInfo {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct HistoryOutput {
    revision: u32,
    #[serde(default)]
    status: String,
}

impl From<ReleaseOutput> for ReleaseInfo {
    fn from(out: ReleaseOutput) -> Self {
        ReleaseInfo {
            name: out.name,
            namespace: out.namespace,
            revision: out.version,
            status: out.info.status,
        }
    }
}

impl HelmCli {
    pub fn new(binary: impl Into<String>, kube_context: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            kube_context,
        }
    }

    fn base_args(&self, command: &str, release: &str, namespace: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            command.into(),
            release.into(),
            "--namespace".into(),
            namespace.into(),
        ];
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".into());
            args.push(context.into());
        }
        args
    }

    async fn run(
        &self,
        operation: &'static str,
        release: &str,
        args: Vec<OsString>,
    ) -> Result<Vec<u8>, ReleaseError> {
        debug!("Running {} {:?}", self.binary, args);
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| ReleaseError::Engine {
                operation,
                release: release.to_string(),
                message: format!("failed to run {}: {}", self.binary, e),
            })?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(operation, release, stderr.trim()))
    }

    /// Install or upgrade from a temporary copy of the chart archive
    async fn deploy(
        &self,
        operation: &'static str,
        namespace: &str,
        release: &str,
        chart: &Chart,
        values: &str,
    ) -> Result<ReleaseInfo, ReleaseError> {
        let io_error = |e: std::io::Error| ReleaseError::Engine {
            operation,
            release: release.to_string(),
            message: format!("failed to stage chart: {}", e),
        };

        let mut archive = tempfile::Builder::new()
            .suffix(".tgz")
            .tempfile()
            .map_err(io_error)?;
        archive.write_all(&chart.archive).map_err(io_error)?;
        let mut values_file = NamedTempFile::new().map_err(io_error)?;
        values_file.write_all(values.as_bytes()).map_err(io_error)?;

        let mut args = self.base_args(operation, release, namespace);
        args.push(archive.path().into());
        args.push("--values".into());
        args.push(values_file.path().into());
        args.push("--output".into());
        args.push("json".into());

        let stdout = self.run(operation, release, args).await?;
        parse_json::<ReleaseOutput>(operation, release, &stdout).map(ReleaseInfo::from)
    }
}

fn classify_failure(operation: &'static str, release: &str, stderr: &str) -> ReleaseError {
    if stderr.contains(NOT_FOUND_MARKER) {
        ReleaseError::NotFound(release.to_string())
    } else {
        ReleaseError::Engine {
            operation,
            release: release.to_string(),
            message: stderr.to_string(),
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    release: &str,
    stdout: &[u8],
) -> Result<T, ReleaseError> {
    serde_json::from_slice(stdout).map_err(|e| ReleaseError::Engine {
        operation,
        release: release.to_string(),
        message: format!("unexpected helm output: {}", e),
    })
}

#[async_trait]
impl ReleaseClient for HelmCli {
    #[instrument(skip(self, chart, values))]
    async fn install(
        &self,
        chart: &Chart,
        namespace: &str,
        release: &str,
        values: &str,
    ) -> Result<ReleaseInfo, ReleaseError> {
        self.deploy("install", namespace, release, chart, values).await
    }

    #[instrument(skip(self, chart, values))]
    async fn upgrade(
        &self,
        namespace: &str,
        release: &str,
        chart: &Chart,
        values: &str,
    ) -> Result<ReleaseInfo, ReleaseError> {
        self.deploy("upgrade", namespace, release, chart, values).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, namespace: &str, release: &str, purge: bool) -> Result<(), ReleaseError> {
        let mut args = self.base_args("uninstall", release, namespace);
        if !purge {
            args.push("--keep-history".into());
        }
        self.run("uninstall", release, args).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn history(
        &self,
        namespace: &str,
        release: &str,
        max: u32,
    ) -> Result<Vec<ReleaseInfo>, ReleaseError> {
        let mut args = self.base_args("history", release, namespace);
        args.push("--max".into());
        args.push(max.to_string().into());
        args.push("--output".into());
        args.push("json".into());

        let stdout = self.run("history", release, args).await?;
        let mut revisions: Vec<HistoryOutput> = parse_json("history", release, &stdout)?;
        revisions.sort_by(|a, b| b.revision.cmp(&a.revision));

        Ok(revisions
            .into_iter()
            .map(|r| ReleaseInfo {
                name: release.to_string(),
                namespace: namespace.to_string(),
                revision: r.revision,
                status: r.status,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn status(&self, namespace: &str, release: &str) -> Result<String, ReleaseError> {
        let mut args = self.base_args("status", release, namespace);
        args.push("--output".into());
        args.push("json".into());

        let stdout = self.run("status", release, args).await?;
        let out: ReleaseOutput = parse_json("status", release, &stdout)?;
        Ok(out.info.status)
    }
}
