// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret lookup used to resolve repository credentials

use crate::error::{ControllerError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::instrument;

/// Read access to secret data
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}

/// SecretStore backed by the Kubernetes API
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    #[instrument(skip(self))]
    async fn get(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets.get(name).await?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }
}

/// Read one key of a secret as a UTF-8 string
pub async fn read_secret_key(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String> {
    let data = store.get(namespace, name).await.map_err(|e| {
        ControllerError::AuthHeaderError(format!(
            "failed to get secret {}/{}: {}",
            namespace, name, e
        ))
    })?;

    let Some(value) = data.get(key) else {
        return Err(ControllerError::AuthHeaderError(format!(
            "secret {}/{} does not contain key '{}'",
            namespace, name, key
        )));
    };

    String::from_utf8(value.clone()).map_err(|e| {
        ControllerError::AuthHeaderError(format!(
            "key '{}' of secret {}/{} is not valid UTF-8: {}",
            key, namespace, name, e
        ))
    })
}
