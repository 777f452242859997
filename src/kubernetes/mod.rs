// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, object keys, the declaration cache and secrets.

pub mod crd;
pub mod keys;
pub mod secrets;
pub mod store;

pub use crd::wait_for_helm_release_crd;
pub use keys::{key_for, split_key};
pub use secrets::{read_secret_key, KubeSecretStore, SecretStore};
pub use store::{DeclarationStore, KubeDeclarationStore};
