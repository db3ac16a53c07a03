//! Customizations with structured data input
//!
//! Container buffers are uploaded first (one slot request, then all
//! uploads concurrently), after which the request body references them by
//! asset id.

use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::geometry_client::GeometryBackend;
use crate::error::{CliError, CliResult};
use crate::models::{GeometrySessionView, OutputView, SdtfUploadSpec, SDTF_CONTENT_TYPE};

/// Where a structured data value comes from
#[derive(Debug, Clone)]
pub enum SdtfSource {
    /// Previously uploaded container
    Id(String),
    /// Container to upload; the same `Arc` used for several values is uploaded once
    Buffer(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub enum ParameterValue {
    Literal(String),
    Sdtf {
        source: SdtfSource,
        /// Chunk to select within the container
        chunk_name: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct SdtfCustomizationResult {
    /// Request body as structured JSON, containing the uploaded asset ids
    pub request_body: Map<String, Value>,
    pub outputs: Vec<OutputView>,
}

/// Check every value against the session's declared parameters
fn validate(session: &GeometrySessionView, parameters: &[(String, ParameterValue)]) -> CliResult<()> {
    for (id, value) in parameters {
        let descriptor = session
            .parameter(id)
            .ok_or_else(|| CliError::InvalidParameter(format!("Parameter {} does not exist", id)))?;

        if matches!(value, ParameterValue::Sdtf { .. }) && !descriptor.param_type.accepts_sdtf() {
            return Err(CliError::InvalidParameter(format!(
                "Parameter {} ({}) does not support sdTF data",
                id, descriptor.param_type
            )));
        }
    }
    Ok(())
}

/// Buffers to upload, deduplicated by identity, in first-use order
fn collect_uploads(parameters: &[(String, ParameterValue)]) -> Vec<Arc<[u8]>> {
    let mut uploads: Vec<Arc<[u8]>> = Vec::new();
    for (_, value) in parameters {
        if let ParameterValue::Sdtf {
            source: SdtfSource::Buffer(buffer),
            ..
        } = value
        {
            if !uploads.iter().any(|b| Arc::ptr_eq(b, buffer)) {
                uploads.push(Arc::clone(buffer));
            }
        }
    }
    uploads
}

/// Build the structured request body
///
/// `asset_ids[i]` is the id the backend assigned to `uploads[i]`. A
/// container without chunk name is referenced by its plain id.
pub fn build_request_body(
    parameters: &[(String, ParameterValue)],
    uploads: &[Arc<[u8]>],
    asset_ids: &[String],
) -> CliResult<Map<String, Value>> {
    let mut body = Map::new();

    for (id, value) in parameters {
        let entry = match value {
            ParameterValue::Literal(s) => Value::String(s.clone()),
            ParameterValue::Sdtf { source, chunk_name } => {
                let asset_id = match source {
                    SdtfSource::Id(asset_id) => asset_id.clone(),
                    SdtfSource::Buffer(buffer) => uploads
                        .iter()
                        .position(|b| Arc::ptr_eq(b, buffer))
                        .and_then(|index| asset_ids.get(index))
                        .cloned()
                        .ok_or_else(|| {
                            CliError::Parse(format!("No uploaded asset for parameter {}", id))
                        })?,
                };
                match chunk_name {
                    Some(name) => json!({ "asset": { "id": asset_id, "chunk": { "name": name } } }),
                    None => Value::String(asset_id),
                }
            }
        };
        body.insert(id.clone(), entry);
    }

    Ok(body)
}

/// Body as submitted: structured values are sent JSON-encoded as strings
pub fn stringify_request_body(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .map(|(id, value)| {
            let value = match value {
                Value::String(_) => value.clone(),
                other => Value::String(other.to_string()),
            };
            (id.clone(), value)
        })
        .collect()
}

/// Run a customization whose parameter values may reference structured data
pub async fn run_customization_using_sdtf<G: GeometryBackend + ?Sized>(
    geometry: &G,
    session: &GeometrySessionView,
    parameters: &[(String, ParameterValue)],
    max_wait: Option<Duration>,
) -> CliResult<SdtfCustomizationResult> {
    validate(session, parameters)?;

    let uploads = collect_uploads(parameters);
    let mut asset_ids = Vec::with_capacity(uploads.len());

    if !uploads.is_empty() {
        let specs: Vec<SdtfUploadSpec> = uploads
            .iter()
            .map(|b| SdtfUploadSpec::for_length(b.len()))
            .collect();
        let slots = geometry.request_sdtf_upload(&session.session_id, &specs).await?;
        if slots.len() != uploads.len() {
            return Err(CliError::Parse(format!(
                "Requested {} upload slots, received {}",
                uploads.len(),
                slots.len()
            )));
        }

        tracing::info!(count = uploads.len(), "Uploading sdTF assets");
        try_join_all(
            uploads
                .iter()
                .zip(&slots)
                .map(|(buffer, slot)| geometry.upload_bytes(&slot.href, buffer, SDTF_CONTENT_TYPE)),
        )
        .await?;

        asset_ids.extend(slots.into_iter().map(|slot| slot.id));
    }

    let request_body = build_request_body(parameters, &uploads, &asset_ids)?;
    tracing::info!(body = %serde_json::Value::Object(request_body.clone()), "Customization request body");

    let outputs = geometry
        .submit_customization(&session.session_id, &stringify_request_body(&request_body), max_wait)
        .await?;

    Ok(SdtfCustomizationResult { request_body, outputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComputationResponse, GeometryModelView, UploadSlot};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SessionBackend {
        slot_requests: Mutex<Vec<Vec<SdtfUploadSpec>>>,
        uploads: Mutex<Vec<(String, usize, String)>>,
        submitted: Mutex<Vec<Map<String, Value>>>,
        /// Upload URL rejected by the storage backend
        rejected_upload: Option<String>,
    }

    #[async_trait]
    impl GeometryBackend for SessionBackend {
        async fn get_model(&self, _model_id: &str) -> CliResult<GeometryModelView> {
            unimplemented!()
        }
        async fn upload_bytes(&self, url: &str, bytes: &[u8], content_type: &str) -> CliResult<()> {
            if self.rejected_upload.as_deref() == Some(url) {
                return Err(CliError::RemoteValidation {
                    status: 403,
                    message: "signature expired".to_string(),
                });
            }
            self.uploads
                .lock()
                .unwrap()
                .push((url.to_string(), bytes.len(), content_type.to_string()));
            Ok(())
        }
        async fn init_session(&self, _ticket: &str) -> CliResult<GeometrySessionView> {
            unimplemented!()
        }
        async fn close_session(&self, _session_id: &str) -> CliResult<()> {
            unimplemented!()
        }
        async fn request_sdtf_upload(
            &self,
            _session_id: &str,
            specs: &[SdtfUploadSpec],
        ) -> CliResult<Vec<UploadSlot>> {
            self.slot_requests.lock().unwrap().push(specs.to_vec());
            Ok((0..specs.len())
                .map(|i| UploadSlot {
                    id: format!("asset-{}", i),
                    href: format!("https://upload.example/{}", i),
                })
                .collect())
        }
        async fn customize(&self, _session_id: &str, values: &Map<String, Value>) -> CliResult<ComputationResponse> {
            self.submitted.lock().unwrap().push(values.clone());
            Ok(ComputationResponse::default())
        }
        async fn export(
            &self,
            _session_id: &str,
            _values: &Map<String, Value>,
            _export_id: &str,
        ) -> CliResult<ComputationResponse> {
            unimplemented!()
        }
        async fn model_session_statistics(&self, _guid: &str, _from: &str, _to: &str) -> CliResult<Value> {
            unimplemented!()
        }
    }

    fn session() -> GeometrySessionView {
        serde_json::from_value(json!({
            "sessionId": "s1",
            "parameters": {
                "crv": {"id": "crv", "name": "Curve", "type": "sCurve"},
                "txt": {"id": "txt", "name": "Text", "type": "sString"},
                "num": {"id": "num", "name": "Count", "type": "Number"}
            }
        }))
        .unwrap()
    }

    fn sdtf(buffer: &Arc<[u8]>, chunk: Option<&str>) -> ParameterValue {
        ParameterValue::Sdtf {
            source: SdtfSource::Buffer(Arc::clone(buffer)),
            chunk_name: chunk.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_shared_buffer_uploaded_once() {
        let backend = SessionBackend::default();
        let buffer: Arc<[u8]> = Arc::from(vec![0u8; 42]);
        let parameters = vec![
            ("crv".to_string(), sdtf(&buffer, Some("Curve"))),
            ("txt".to_string(), sdtf(&buffer, Some("String"))),
            ("num".to_string(), ParameterValue::Literal("3".to_string())),
        ];

        let result = run_customization_using_sdtf(&backend, &session(), &parameters, None)
            .await
            .unwrap();

        let slot_requests = backend.slot_requests.lock().unwrap();
        assert_eq!(slot_requests.len(), 1);
        assert_eq!(slot_requests[0].len(), 1);
        assert_eq!(slot_requests[0][0].content_length, 42);

        let uploads = backend.uploads.lock().unwrap();
        assert_eq!(
            *uploads,
            vec![("https://upload.example/0".to_string(), 42, SDTF_CONTENT_TYPE.to_string())]
        );

        assert_eq!(
            result.request_body["crv"],
            json!({"asset": {"id": "asset-0", "chunk": {"name": "Curve"}}})
        );
        assert_eq!(result.request_body["num"], json!("3"));
    }

    #[tokio::test]
    async fn test_submitted_body_is_stringified() {
        let backend = SessionBackend::default();
        let buffer: Arc<[u8]> = Arc::from(vec![7u8; 3]);
        let parameters = vec![("crv".to_string(), sdtf(&buffer, Some("Curve")))];

        run_customization_using_sdtf(&backend, &session(), &parameters, None)
            .await
            .unwrap();

        let submitted = backend.submitted.lock().unwrap();
        let value = submitted[0]["crv"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(value).unwrap();
        assert_eq!(parsed["asset"]["chunk"]["name"], "Curve");
    }

    #[tokio::test]
    async fn test_failed_upload_aborts_before_customization() {
        let backend = SessionBackend {
            rejected_upload: Some("https://upload.example/1".to_string()),
            ..Default::default()
        };
        let curve: Arc<[u8]> = Arc::from(vec![1u8; 8]);
        let text: Arc<[u8]> = Arc::from(vec![2u8; 4]);
        let parameters = vec![
            ("crv".to_string(), sdtf(&curve, Some("Curve"))),
            ("txt".to_string(), sdtf(&text, Some("String"))),
        ];

        let result = run_customization_using_sdtf(&backend, &session(), &parameters, None).await;

        assert!(matches!(result, Err(CliError::RemoteValidation { status: 403, .. })));
        assert_eq!(backend.slot_requests.lock().unwrap()[0].len(), 2);
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_id_without_chunk_is_plain_string() {
        let backend = SessionBackend::default();
        let parameters = vec![(
            "crv".to_string(),
            ParameterValue::Sdtf {
                source: SdtfSource::Id("existing".to_string()),
                chunk_name: None,
            },
        )];

        let result = run_customization_using_sdtf(&backend, &session(), &parameters, None)
            .await
            .unwrap();

        assert_eq!(result.request_body["crv"], json!("existing"));
        assert!(backend.slot_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_parameter_rejected() {
        let backend = SessionBackend::default();
        let parameters = vec![("nope".to_string(), ParameterValue::Literal("x".to_string()))];

        let result = run_customization_using_sdtf(&backend, &session(), &parameters, None).await;
        assert!(matches!(result, Err(CliError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_sdtf_for_plain_parameter_rejected() {
        let backend = SessionBackend::default();
        let buffer: Arc<[u8]> = Arc::from(vec![1u8]);
        let parameters = vec![("num".to_string(), sdtf(&buffer, None))];

        let result = run_customization_using_sdtf(&backend, &session(), &parameters, None).await;
        assert!(matches!(result, Err(CliError::InvalidParameter(_))));
        assert!(backend.uploads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_distinct_buffers_with_equal_content_both_uploaded() {
        let a: Arc<[u8]> = Arc::from(vec![1u8, 2]);
        let b: Arc<[u8]> = Arc::from(vec![1u8, 2]);
        let parameters = vec![
            ("crv".to_string(), sdtf(&a, None)),
            ("txt".to_string(), sdtf(&b, None)),
        ];
        assert_eq!(collect_uploads(&parameters).len(), 2);
    }
}
