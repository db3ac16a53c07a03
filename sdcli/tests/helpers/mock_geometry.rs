//! Scriptable Geometry Backend
//!
//! A `MockGeometry` is also its own connector: every connection shares the
//! same recorded state.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use sdcli::error::{CliError, CliResult};
use sdcli::models::{
    ComputationResponse, GeometryAccessData, GeometryModelView, GeometrySessionView, ModelCheckState,
    SdtfUploadSpec, UploadSlot,
};
use sdcli::services::{GeometryBackend, GeometryConnector};

pub const UPLOAD_URL: &str = "https://upload.example/definition";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpload {
    pub url: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct GeometryState {
    /// Check states replayed by `get_model`; the last one repeats
    pub states: Mutex<VecDeque<ModelCheckState>>,
    pub status_message: Option<String>,
    pub max_comp_time: u64,
    pub fetches: Mutex<usize>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub connections: Mutex<Vec<GeometryAccessData>>,
    /// Guids whose statistics request fails with `ModelNotFound`
    pub missing_guids: Vec<String>,
    /// Guids whose statistics request fails with a server error
    pub failing_guids: Vec<String>,
    pub statistics_requests: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct MockGeometry(Arc<GeometryState>);

impl Deref for MockGeometry {
    type Target = GeometryState;

    fn deref(&self) -> &GeometryState {
        &self.0
    }
}

impl MockGeometry {
    pub fn with_states(states: Vec<ModelCheckState>, max_comp_time: u64) -> Self {
        Self::from_state(GeometryState {
            states: Mutex::new(states.into()),
            max_comp_time,
            ..Default::default()
        })
    }

    pub fn from_state(state: GeometryState) -> Self {
        MockGeometry(Arc::new(state))
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    fn next_state(&self) -> ModelCheckState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap_or(ModelCheckState::Unknown)
        } else {
            states.front().copied().unwrap_or(ModelCheckState::Unknown)
        }
    }
}

impl GeometryConnector for MockGeometry {
    type Backend = MockGeometry;

    fn connect(&self, access: &GeometryAccessData) -> CliResult<MockGeometry> {
        self.connections.lock().unwrap().push(access.clone());
        Ok(self.clone())
    }
}

#[async_trait]
impl GeometryBackend for MockGeometry {
    async fn get_model(&self, model_id: &str) -> CliResult<GeometryModelView> {
        *self.fetches.lock().unwrap() += 1;
        let state = self.next_state();
        Ok(serde_json::from_value(json!({
            "model": {"id": model_id, "stat": state, "msg": self.status_message},
            "setting": {"compute": {"max_comp_time": self.max_comp_time}},
            "file": {"upload": UPLOAD_URL},
        }))
        .unwrap())
    }

    async fn upload_bytes(&self, url: &str, bytes: &[u8], content_type: &str) -> CliResult<()> {
        self.uploads.lock().unwrap().push(RecordedUpload {
            url: url.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        });
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
        _specs: &[SdtfUploadSpec],
    ) -> CliResult<Vec<UploadSlot>> {
        unimplemented!()
    }

    async fn customize(&self, _session_id: &str, _values: &Map<String, Value>) -> CliResult<ComputationResponse> {
        unimplemented!()
    }

    async fn export(
        &self,
        _session_id: &str,
        _values: &Map<String, Value>,
        _export_id: &str,
    ) -> CliResult<ComputationResponse> {
        unimplemented!()
    }

    async fn model_session_statistics(&self, guid: &str, from: &str, to: &str) -> CliResult<Value> {
        self.statistics_requests.lock().unwrap().push(guid.to_string());
        if self.missing_guids.iter().any(|g| g == guid) {
            return Err(CliError::ModelNotFound(guid.to_string()));
        }
        if self.failing_guids.iter().any(|g| g == guid) {
            return Err(CliError::RemoteValidation {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(json!({ "modelid": guid, "from": from, "to": to, "sessions": 3 }))
    }
}
