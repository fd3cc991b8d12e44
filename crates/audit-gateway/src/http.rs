//! HTTP implementation of the backend gateway
//!
//! One shared `reqwest::Client` per gateway. Each call runs inside a
//! `gateway.call` span so request latency and outcome land in the logs.

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{endpoints, BackendGateway};
use crate::types::{
    AnalyzeQueryRequest, ContextFlags, EvidenceValidation, HealthStatus, QueryAnalysis,
    ScriptAnalysis, UploadFile, WorkpaperResult,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::Instrument;

/// Longest error body kept in a `GatewayError::Status`
const MAX_ERROR_BODY: usize = 512;

/// Gateway backed by the audit FastAPI service
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create gateway with its own HTTP client
    ///
    /// # Errors
    /// - `GatewayError::Transport` if the TLS backend cannot be initialised
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::transport("client", e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Create gateway over an existing client (shared connection pool)
    #[inline]
    #[must_use]
    pub fn with_client(config: GatewayConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let body = self.call_bytes(endpoint, request).await?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::malformed(endpoint, e.to_string()))
    }

    async fn call_bytes(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, GatewayError> {
        let span = tracing::info_span!(
            "gateway.call",
            endpoint = endpoint,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );

        async move {
            let started = Instant::now();
            tracing::debug!("dispatching request");

            let response = request
                .send()
                .await
                .map_err(|e| GatewayError::transport(endpoint, e.to_string()))?;
            tracing::Span::current().record("status", response.status().as_u16());

            let response = check_status(endpoint, response).await?;
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::transport(endpoint, e.to_string()))?;

            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            tracing::Span::current().record("latency_ms", latency_ms);
            Ok(body.to_vec())
        }
        .instrument(span)
        .await
    }
}

async fn check_status(endpoint: &'static str, response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    tracing::warn!(status = status.as_u16(), "backend returned error status");
    Err(GatewayError::status(endpoint, status.as_u16(), body))
}

fn file_part(endpoint: &'static str, file: &UploadFile) -> Result<Part, GatewayError> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
    match &file.content_type {
        Some(mime) => part
            .mime_str(mime)
            .map_err(|e| GatewayError::invalid_request(endpoint, e.to_string())),
        None => Ok(part),
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn analyze_query(
        &self,
        user_input: &str,
        flags: ContextFlags,
    ) -> Result<QueryAnalysis, GatewayError> {
        let url = self.config.endpoint(endpoints::ANALYZE_QUERY)?;
        let body = AnalyzeQueryRequest {
            user_input: user_input.to_string(),
            flags,
        };
        self.call_json(endpoints::ANALYZE_QUERY, self.client.post(url).json(&body))
            .await
    }

    async fn upload_script(&self, file: &UploadFile) -> Result<ScriptAnalysis, GatewayError> {
        let url = self.config.endpoint(endpoints::UPLOAD_SCRIPT)?;
        let form = Form::new().part("file", file_part(endpoints::UPLOAD_SCRIPT, file)?);
        self.call_json(endpoints::UPLOAD_SCRIPT, self.client.post(url).multipart(form))
            .await
    }

    async fn upload_evidence(
        &self,
        session_id: &str,
        files: &[UploadFile],
    ) -> Result<EvidenceValidation, GatewayError> {
        let url = self.config.endpoint(endpoints::UPLOAD_EVIDENCE)?;
        let mut form = Form::new().text("session_id", session_id.to_string());
        for file in files {
            form = form.part("files", file_part(endpoints::UPLOAD_EVIDENCE, file)?);
        }
        self.call_json(endpoints::UPLOAD_EVIDENCE, self.client.post(url).multipart(form))
            .await
    }

    async fn generate_workpaper(&self, session_id: &str) -> Result<WorkpaperResult, GatewayError> {
        let url = self.config.endpoint(endpoints::GENERATE_WORKPAPER)?;
        let body = serde_json::json!({ "session_id": session_id });
        self.call_json(endpoints::GENERATE_WORKPAPER, self.client.post(url).json(&body))
            .await
    }

    async fn download_workpaper(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        let mut url = self.config.endpoint(endpoints::DOWNLOAD_REPORT)?;
        url.query_pairs_mut().append_pair("filename", filename);
        self.call_bytes(endpoints::DOWNLOAD_REPORT, self.client.get(url))
            .await
    }

    async fn health(&self) -> Result<HealthStatus, GatewayError> {
        let url = self.config.endpoint(endpoints::HEALTH)?;
        self.call_json(endpoints::HEALTH, self.client.get(url)).await
    }
}
