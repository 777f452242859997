// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use helm_release_controller::chart::{ReqwestTransport, TarballLoader};
use helm_release_controller::config::Config;
use helm_release_controller::controller::Controller;
use helm_release_controller::kubernetes::wait_for_helm_release_crd;
use helm_release_controller::release::HelmCli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting HelmRelease controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: default_repo_url={}, namespace={}, workers={}",
        config.default_repo_url, config.controller_namespace, config.workers
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Wait for the HelmRelease CRD before starting the watch
    info!("Waiting for HelmRelease CRD to become available...");
    wait_for_helm_release_crd(&client).await?;

    let transport = ReqwestTransport::new(config.http_timeout)
        .context("failed to create chart repository HTTP client")?;
    let releases = HelmCli::new(config.helm_binary.clone(), config.kube_context.clone());

    let controller = Controller::new(
        client,
        config,
        Arc::new(releases),
        Arc::new(transport),
        Arc::new(TarballLoader),
    );

    controller.run(shutdown_signal()).await?;

    info!("HelmRelease controller stopped");
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
