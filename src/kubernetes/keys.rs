// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `namespace/name` keys identifying reconciled objects

use crate::error::{ControllerError, Result};
use kube::{Resource, ResourceExt};

/// Build the reconcile key of an object
pub fn key_for<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, obj.name_any()),
        _ => obj.name_any(),
    }
}

/// Split a reconcile key into namespace and name. Cluster-scoped keys have an empty namespace.
pub fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok(("", *name)),
        [ns, name] if !name.is_empty() => Ok((*ns, *name)),
        _ => Err(ControllerError::InvalidKey(key.to_string())),
    }
}
