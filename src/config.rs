// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::defaults;

/// Controller configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository used when a HelmRelease does not set `repoUrl`
    pub default_repo_url: String,
    /// Namespace the controller runs in; auth secrets are read from here
    pub controller_namespace: String,
    /// Timeout applied to every chart index and archive request
    pub http_timeout: Duration,
    /// Failed reconciles of a key are retried this many times before the key is dropped
    pub max_retries: u32,
    /// Number of concurrent worker loops
    pub workers: usize,
    /// Path of the helm binary driving the release engine
    pub helm_binary: String,
    /// Optional kube context passed to every helm invocation
    pub kube_context: Option<String>,
    /// Check downloaded archives against the digest published in the repository index
    pub verify_chart_digest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_repo_url: defaults::REPO_URL.to_string(),
            controller_namespace: defaults::NAMESPACE.to_string(),
            http_timeout: Duration::from_secs(defaults::TIMEOUT_SECONDS),
            max_retries: defaults::MAX_RETRIES,
            workers: defaults::WORKERS,
            helm_binary: defaults::HELM_BINARY.to_string(),
            kube_context: None,
            verify_chart_digest: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup, empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base = Config::default();

        let http_timeout = match var("TIMEOUT_SECONDS") {
            Some(v) => Duration::from_secs(parse("TIMEOUT_SECONDS", &v)?),
            None => base.http_timeout,
        };
        let max_retries = match var("MAX_RETRIES") {
            Some(v) => parse("MAX_RETRIES", &v)?,
            None => base.max_retries,
        };
        let workers = match var("WORKERS") {
            Some(v) => parse::<usize>("WORKERS", &v)?.max(1),
            None => base.workers,
        };
        let verify_chart_digest = match var("VERIFY_CHART_DIGEST") {
            Some(v) => parse("VERIFY_CHART_DIGEST", &v)?,
            None => base.verify_chart_digest,
        };

        Ok(Config {
            default_repo_url: var("DEFAULT_REPO_URL").unwrap_or(base.default_repo_url),
            controller_namespace: var("POD_NAMESPACE").unwrap_or(base.controller_namespace),
            http_timeout,
            max_retries,
            workers,
            helm_binary: var("HELM_BINARY").unwrap_or(base.helm_binary),
            kube_context: var("HELM_KUBE_CONTEXT"),
            verify_chart_digest,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, value))
}
