// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Repository URL handling

use crate::error::ChartError;
use url::{ParseError, Url};

const INDEX_FILE: &str = "index.yaml";

/// URL of the index document of a repository
pub fn index_url(repo_base: &str) -> String {
    let base = repo_base.trim();
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{}/{}", base, INDEX_FILE)
}

/// Directory holding the repository's index, which relative chart URLs are relative to
fn repository_directory(repo_base: &str) -> &str {
    let base = repo_base.trim();
    let base = base.strip_suffix('/').unwrap_or(base);
    base.strip_suffix(INDEX_FILE)
        .and_then(|b| b.strip_suffix('/'))
        .unwrap_or(base)
}

/// Resolve a chart URL taken from an index against the repository base.
///
/// Absolute URLs are returned as they are. Relative ones are appended to the
/// repository directory, never resolved against the index file itself.
pub fn resolve_absolute_url(repo_base: &str, candidate: &str) -> Result<String, ChartError> {
    let candidate = candidate.trim();

    match Url::parse(candidate) {
        Ok(_) => return Ok(candidate.to_string()),
        Err(ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => {
            return Err(ChartError::InvalidUrl {
                url: candidate.to_string(),
                reason: e.to_string(),
            })
        }
    }

    let directory = repository_directory(repo_base);
    let mut url = Url::parse(directory).map_err(|e| ChartError::InvalidUrl {
        url: directory.to_string(),
        reason: e.to_string(),
    })?;

    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        candidate.trim_start_matches('/')
    );
    url.set_path(&path);
    Ok(url.to_string())
}
