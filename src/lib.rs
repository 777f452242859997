// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod chart;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod kubernetes;
pub mod reconcilers;
pub mod release;
pub mod types;

#[cfg(test)]
pub mod test_utils;
