// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Startup gate on the HelmRelease CRD being served

use crate::constants::crd::{GROUP, KIND, POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS, VERSION};
use crate::error::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Verbs the controller's watch depends on
const REQUIRED_VERBS: [&str; 2] = ["list", "watch"];

/// Block until `helm.bitnami.com/v1` serves a watchable HelmRelease resource.
/// Polls every POLL_INTERVAL_SECS, doubling up to POLL_MAX_INTERVAL_SECS.
pub async fn wait_for_helm_release_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match helm_release_served(client).await {
            Ok(true) => {
                info!("{} CRD ({}/{}) is available", KIND, GROUP, VERSION);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "{} CRD ({}/{}) not served yet, waiting {} seconds...",
                    KIND, GROUP, VERSION, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRD: {}, retrying in {} seconds...",
                    KIND, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// A 404 on the group version means the CRD is not installed yet
async fn helm_release_served(client: &Client) -> Result<bool> {
    match client
        .list_api_group_resources(&format!("{}/{}", GROUP, VERSION))
        .await
    {
        Ok(resources) => Ok(serves_helm_release(&resources)),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn serves_helm_release(resources: &APIResourceList) -> bool {
    resources.resources.iter().any(|resource| {
        // Subresources such as helmreleases/status share the kind
        resource.kind == KIND
            && !resource.name.contains('/')
            && REQUIRED_VERBS
                .iter()
                .all(|verb| resource.verbs.iter().any(|v| v == verb))
    })
}
