// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP access to chart repositories

use crate::error::ChartError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use tracing::{debug, instrument};

/// Response of a GET request, with the body fully read
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Capability used for every chart repository request
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url`, sending `auth_header` as the `Authorization` header when set
    async fn get(&self, url: &str, auth_header: Option<&str>) -> Result<HttpResponse, ChartError>;
}

/// HttpTransport backed by reqwest, with a timeout on every request
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ChartError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChartError::Http {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, auth_header), fields(authenticated = auth_header.is_some()))]
    async fn get(&self, url: &str, auth_header: Option<&str>) -> Result<HttpResponse, ChartError> {
        let mut request = self.client.get(url);
        if let Some(header) = auth_header.filter(|h| !h.is_empty()) {
            request = request.header(AUTHORIZATION, header);
        }

        let http_error = |e: reqwest::Error| ChartError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(http_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(http_error)?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}
