//! Geometry Backend views
//!
//! Parameters and outputs arrive as JSON objects keyed by id. Their
//! declaration order is significant (it decides chunk matching ties), so
//! they are decoded into ordered vectors rather than maps.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Check status of a model on the Geometry Backend
///
/// `not_uploaded → uploaded → pending → {confirmed, denied}`; `pending` also
/// doubles as the terminal "awaiting manual review" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCheckState {
    NotUploaded,
    Uploaded,
    Pending,
    Confirmed,
    Denied,
    #[serde(other)]
    Unknown,
}

impl ModelCheckState {
    /// States after which the checking process has nothing left to do
    pub fn is_check_complete(&self) -> bool {
        matches!(
            self,
            ModelCheckState::Confirmed | ModelCheckState::Denied | ModelCheckState::Pending
        )
    }

    /// States worth waiting on at all
    pub fn may_change(&self) -> bool {
        matches!(
            self,
            ModelCheckState::NotUploaded | ModelCheckState::Uploaded | ModelCheckState::Pending
        )
    }
}

impl fmt::Display for ModelCheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelCheckState::NotUploaded => "not_uploaded",
            ModelCheckState::Uploaded => "uploaded",
            ModelCheckState::Pending => "pending",
            ModelCheckState::Confirmed => "confirmed",
            ModelCheckState::Denied => "denied",
            ModelCheckState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub stat: ModelCheckState,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeSetting {
    #[serde(default)]
    pub ftype: Option<String>,
    /// Maximum computation time in milliseconds
    #[serde(default)]
    pub max_comp_time: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSetting {
    #[serde(default)]
    pub compute: ComputeSetting,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelFile {
    /// Pre-signed upload URL, present until the definition is uploaded
    #[serde(default)]
    pub upload: Option<String>,
}

/// Response of the model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryModelView {
    pub model: ModelInfo,
    #[serde(default)]
    pub setting: ModelSetting,
    #[serde(default)]
    pub file: ModelFile,
}

/// Declared type of a session parameter, e.g. `Number`, `String`, `sCurve`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterType(pub String);

impl ParameterType {
    pub fn new(s: impl Into<String>) -> Self {
        ParameterType(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Types starting with a lowercase `s` accept structured data input
    pub fn accepts_sdtf(&self) -> bool {
        self.0.starts_with('s')
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameter declared by a model session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Upper bound: string length for text parameters, value for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputView {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Milliseconds to wait before the result is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default)]
    pub content: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportView {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub export_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default)]
    pub content: Vec<Value>,
}

/// Session metadata returned by session initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometrySessionView {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default, deserialize_with = "ordered_values")]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, deserialize_with = "ordered_values")]
    pub outputs: Vec<OutputView>,
    #[serde(default, deserialize_with = "ordered_values")]
    pub exports: Vec<ExportView>,
}

impl GeometrySessionView {
    pub fn parameter(&self, id: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.id == id)
    }
}

/// Response of a customization or export request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComputationResponse {
    #[serde(default, deserialize_with = "ordered_values")]
    pub outputs: Vec<OutputView>,
    #[serde(default, deserialize_with = "ordered_values")]
    pub exports: Vec<ExportView>,
}

impl ComputationResponse {
    /// Longest delay requested by any output, if the computation is still running
    pub fn output_delay(&self) -> Option<u64> {
        self.outputs.iter().filter_map(|o| o.delay).filter(|d| *d > 0).max()
    }

    pub fn export_delay(&self, export_id: &str) -> Option<u64> {
        self.exports
            .iter()
            .find(|e| e.id == export_id)
            .and_then(|e| e.delay)
            .filter(|d| *d > 0)
    }
}

/// Decode a JSON object keyed by id into its values, keeping key order
pub(crate) fn ordered_values<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let map = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    map.into_iter()
        .map(|(key, value)| {
            serde_json::from_value(value).map_err(|e| D::Error::custom(format!("{}: {}", key, e)))
        })
        .collect()
}

/// Content type of structured data container uploads
pub const SDTF_CONTENT_TYPE: &str = "model/vnd.sdtf";

/// One requested structured data upload slot
#[derive(Debug, Clone, Serialize)]
pub struct SdtfUploadSpec {
    pub namespace: &'static str,
    pub content_length: usize,
    pub content_type: &'static str,
}

impl SdtfUploadSpec {
    pub fn for_length(content_length: usize) -> Self {
        Self {
            namespace: "pub",
            content_length,
            content_type: SDTF_CONTENT_TYPE,
        }
    }
}

/// Granted upload slot: the future asset id and where to PUT the bytes
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSlot {
    pub id: String,
    pub href: String,
}
