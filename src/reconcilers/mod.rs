// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers converging one `namespace/name` key at a time.

pub mod helm_release;

pub use helm_release::HelmReleaseReconciler;

use crate::error::Result;
use async_trait::async_trait;

/// Converge the object identified by `key` towards its declared state.
///
/// Implementations must be idempotent: a key is reconciled again after any
/// failure and after every change to its object.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, key: &str) -> Result<()>;
}
