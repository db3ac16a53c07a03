//! Binary layout of a structured data container
//!
//! ```text
//! +--------+---------+--------------+----------------+----------------+
//! | "sdtf" | version | total length | content length | content format |
//! +--------+---------+--------------+----------------+----------------+
//! | JSON content (content length bytes)                               |
//! +-------------------------------------------------------------------+
//! | binary body (total length - header - content length bytes)        |
//! +-------------------------------------------------------------------+
//! ```
//!
//! All header fields are little-endian `u32`. The JSON content is a set of
//! flat arrays (`chunks`, `nodes`, `items`, `typeHints`, `attributes`, ...)
//! that reference each other by index.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::SdtfError;

pub const MAGIC: &[u8; 4] = b"sdtf";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 20;
pub const CONTENT_FORMAT_JSON: u32 = 0;

/// Fixed-size container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub total_length: u32,
    pub content_length: u32,
    pub content_format: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.total_length.to_le_bytes());
        out[12..16].copy_from_slice(&self.content_length.to_le_bytes());
        out[16..20].copy_from_slice(&self.content_format.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SdtfError> {
        let header = bytes
            .get(..HEADER_LEN)
            .ok_or(SdtfError::TooShort(bytes.len()))?;

        if &header[0..4] != MAGIC {
            return Err(SdtfError::BadMagic);
        }

        let field = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&header[at..at + 4]);
            u32::from_le_bytes(raw)
        };

        Ok(Self {
            version: field(4),
            total_length: field(8),
            content_length: field(12),
            content_format: field(16),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    #[serde(default)]
    pub generator: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl Default for AssetInfo {
    fn default() -> Self {
        Self {
            generator: format!("sdcli {}", env!("CARGO_PKG_VERSION")),
            version: "1.0".to_string(),
            copyright: None,
        }
    }
}

/// Chunk or node: a named grouping of items and child nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<usize>,
}

/// Single data item, stored inline (`value`) or in the binary body (`accessor`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeHintDef {
    pub name: String,
}

/// JSON content of a container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdtfContent {
    #[serde(default)]
    pub asset: AssetInfo,
    #[serde(default)]
    pub chunks: Vec<NodeDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub type_hints: Vec<TypeHintDef>,
    #[serde(default)]
    pub attributes: Vec<BTreeMap<String, AttributeDef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<Value>,
}

/// Serialize content and an optional binary body into container bytes
pub fn encode(content: &SdtfContent, body: &[u8]) -> Result<Vec<u8>, SdtfError> {
    let json = serde_json::to_vec(content)?;

    let total = HEADER_LEN + json.len() + body.len();
    let total_length = u32::try_from(total).map_err(|_| SdtfError::TooLarge(total))?;
    let content_length = u32::try_from(json.len()).map_err(|_| SdtfError::TooLarge(json.len()))?;

    let header = Header {
        version: FORMAT_VERSION,
        total_length,
        content_length,
        content_format: CONTENT_FORMAT_JSON,
    };

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&json);
    out.extend_from_slice(body);
    Ok(out)
}

/// Split container bytes into decoded content and the binary body
pub fn decode(bytes: &[u8]) -> Result<(SdtfContent, &[u8]), SdtfError> {
    let header = Header::decode(bytes)?;

    if header.version != FORMAT_VERSION {
        return Err(SdtfError::UnsupportedVersion(header.version));
    }
    if header.content_format != CONTENT_FORMAT_JSON {
        return Err(SdtfError::UnsupportedContentFormat(header.content_format));
    }

    let total = header.total_length as usize;
    if total > bytes.len() {
        return Err(SdtfError::Truncated {
            expected: total,
            actual: bytes.len(),
        });
    }

    let content_end = HEADER_LEN + header.content_length as usize;
    let json = bytes
        .get(HEADER_LEN..content_end)
        .filter(|_| content_end <= total)
        .ok_or(SdtfError::Truncated {
            expected: content_end,
            actual: total,
        })?;

    let content = serde_json::from_slice(json)?;
    Ok((content, &bytes[content_end..total]))
}
