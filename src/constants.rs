// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Finalizer token placed on every HelmRelease the controller takes ownership of
pub const FINALIZER: &str = "helm.bitnami.com/helmrelease";

/// The HelmRelease custom resource
pub mod crd {
    pub const GROUP: &str = "helm.bitnami.com";
    pub const VERSION: &str = "v1";
    pub const KIND: &str = "HelmRelease";

    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Defaults applied when the corresponding environment variable is unset
pub mod defaults {
    pub const REPO_URL: &str = "https://kubernetes-charts.storage.googleapis.com";
    /// Namespace holding auth secrets when POD_NAMESPACE is unset
    pub const NAMESPACE: &str = "kube-system";
    pub const TIMEOUT_SECONDS: u64 = 180;
    pub const MAX_RETRIES: u32 = 5;
    pub const WORKERS: usize = 1;
    pub const HELM_BINARY: &str = "helm";
}

/// Per-key retry backoff after failed reconciles
pub mod backoff {
    pub const BASE_DELAY_MILLIS: u64 = 5;
    pub const MAX_DELAY_SECS: u64 = 1000;
}
