//! Geometry Backend client
//!
//! A `GeometryClient` is bound to one set of access data (bearer token and
//! model view URL). Workflows obtain clients through a `GeometryConnector`
//! so tests can hand out in-memory backends instead.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::Instant;

use super::http::{send_empty, send_json, send_model_json};
use crate::error::{CliError, CliResult};
use crate::models::{
    ComputationResponse, ExportView, GeometryAccessData, GeometryModelView, GeometrySessionView,
    OutputView, SdtfUploadSpec, UploadSlot,
};

#[async_trait]
pub trait GeometryBackend: Send + Sync {
    async fn get_model(&self, model_id: &str) -> CliResult<GeometryModelView>;

    /// PUT raw bytes to a pre-signed URL
    async fn upload_bytes(&self, url: &str, bytes: &[u8], content_type: &str) -> CliResult<()>;

    async fn init_session(&self, ticket: &str) -> CliResult<GeometrySessionView>;

    async fn close_session(&self, session_id: &str) -> CliResult<()>;

    /// Request one upload slot per spec, returned in request order
    async fn request_sdtf_upload(
        &self,
        session_id: &str,
        specs: &[SdtfUploadSpec],
    ) -> CliResult<Vec<UploadSlot>>;

    /// Submit one customization request without waiting
    async fn customize(&self, session_id: &str, values: &Map<String, Value>) -> CliResult<ComputationResponse>;

    /// Submit one export request without waiting
    async fn export(
        &self,
        session_id: &str,
        values: &Map<String, Value>,
        export_id: &str,
    ) -> CliResult<ComputationResponse>;

    async fn model_session_statistics(&self, guid: &str, from: &str, to: &str) -> CliResult<Value>;

    /// Run a customization, resubmitting while any output reports a delay
    async fn submit_customization(
        &self,
        session_id: &str,
        values: &Map<String, Value>,
        max_wait: Option<Duration>,
    ) -> CliResult<Vec<OutputView>> {
        let start = Instant::now();
        loop {
            let response = self.customize(session_id, values).await?;
            match response.output_delay() {
                None => return Ok(response.outputs),
                Some(delay) => wait_for_delay(start, delay, max_wait).await?,
            }
        }
    }

    /// Run an export, resubmitting while it reports a delay
    async fn submit_export(
        &self,
        session_id: &str,
        values: &Map<String, Value>,
        export_id: &str,
        max_wait: Option<Duration>,
    ) -> CliResult<ExportView> {
        let start = Instant::now();
        loop {
            let response = self.export(session_id, values, export_id).await?;
            if let Some(delay) = response.export_delay(export_id) {
                wait_for_delay(start, delay, max_wait).await?;
                continue;
            }
            return response
                .exports
                .into_iter()
                .find(|e| e.id == export_id)
                .ok_or_else(|| CliError::Parse(format!("Export {} missing from response", export_id)));
        }
    }
}

/// Sleep for a backend-requested delay unless that would exceed `max_wait`
async fn wait_for_delay(start: Instant, delay_ms: u64, max_wait: Option<Duration>) -> CliResult<()> {
    let delay = Duration::from_millis(delay_ms);
    if let Some(max_wait) = max_wait {
        if start.elapsed() + delay > max_wait {
            return Err(CliError::CustomizationTimeout(max_wait.as_millis() as u64));
        }
    }
    tracing::debug!(delay_ms, "Computation in progress, waiting");
    tokio::time::sleep(delay).await;
    Ok(())
}

/// Hands out Geometry Backend clients for access data
pub trait GeometryConnector: Send + Sync {
    type Backend: GeometryBackend;

    fn connect(&self, access: &GeometryAccessData) -> CliResult<Self::Backend>;
}

#[derive(Debug, Deserialize)]
struct SdtfUploadAssets {
    #[serde(default)]
    sdtf: Vec<UploadSlot>,
}

#[derive(Debug, Deserialize)]
struct SdtfUploadResponse {
    asset: SdtfUploadAssets,
}

/// reqwest implementation of `GeometryBackend`
#[derive(Debug, Clone)]
pub struct GeometryClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GeometryClient {
    pub fn new(http: reqwest::Client, access: &GeometryAccessData) -> Self {
        Self {
            http,
            base_url: access.model_view_url.trim_end_matches('/').to_string(),
            access_token: access.access_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(&self.access_token)
    }
}

#[async_trait]
impl GeometryBackend for GeometryClient {
    async fn get_model(&self, model_id: &str) -> CliResult<GeometryModelView> {
        send_model_json(
            self.http
                .get(self.url(&format!("model/{}", model_id)))
                .bearer_auth(&self.access_token),
        )
        .await
    }

    async fn upload_bytes(&self, url: &str, bytes: &[u8], content_type: &str) -> CliResult<()> {
        tracing::debug!(bytes = bytes.len(), content_type = %content_type, "Uploading");
        send_empty(
            self.http
                .put(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes.to_vec()),
        )
        .await
    }

    async fn init_session(&self, ticket: &str) -> CliResult<GeometrySessionView> {
        let session: GeometrySessionView = send_json(self.post(&format!("ticket/{}", ticket))).await?;
        tracing::info!(session_id = %session.session_id, "Session opened");
        Ok(session)
    }

    async fn close_session(&self, session_id: &str) -> CliResult<()> {
        send_empty(self.post(&format!("session/{}/close", session_id))).await?;
        tracing::info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    async fn request_sdtf_upload(
        &self,
        session_id: &str,
        specs: &[SdtfUploadSpec],
    ) -> CliResult<Vec<UploadSlot>> {
        let response: SdtfUploadResponse =
            send_json(self.post(&format!("session/{}/sdtf/upload", session_id)).json(specs)).await?;
        Ok(response.asset.sdtf)
    }

    async fn customize(&self, session_id: &str, values: &Map<String, Value>) -> CliResult<ComputationResponse> {
        send_json(self.post(&format!("session/{}/output", session_id)).json(values)).await
    }

    async fn export(
        &self,
        session_id: &str,
        values: &Map<String, Value>,
        export_id: &str,
    ) -> CliResult<ComputationResponse> {
        let body = json!({
            "parameters": values,
            "exports": { "id": export_id },
        });
        send_json(self.post(&format!("session/{}/export", session_id)).json(&body)).await
    }

    async fn model_session_statistics(&self, guid: &str, from: &str, to: &str) -> CliResult<Value> {
        let body = json!({
            "parameters": [{
                "modelid": guid,
                "timestamp_from": from,
                "timestamp_to": to,
            }]
        });
        send_json(self.post("analytics/session/model").json(&body)).await
    }
}
