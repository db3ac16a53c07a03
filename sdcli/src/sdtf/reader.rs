//! Reading structured data containers

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use super::format::{self, NodeDef, SdtfContent};
use super::SdtfError;

/// Named sub-list of a chunk (a Grasshopper tree branch)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub item_count: usize,
}

/// Chunk with all references resolved
#[derive(Debug, Clone)]
pub struct ParsedChunk {
    pub name: Option<String>,
    pub type_hint: Option<String>,
    pub attributes: Vec<(String, Value)>,
    pub branches: Vec<Branch>,
    /// Items in the chunk and every node below it
    pub item_count: usize,
}

/// Unit of data the chunk matcher works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    /// Stable identifier within its container
    pub id: String,
    /// Chunk name, used to select the chunk within an uploaded container
    pub friendly_name: Option<String>,
    pub type_hint: Option<String>,
    pub item_count: usize,
}

/// Parsed container
#[derive(Debug, Clone)]
pub struct SdtfAsset {
    pub generator: String,
    pub chunks: Vec<ParsedChunk>,
}

impl SdtfAsset {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SdtfError> {
        let (content, _body) = format::decode(bytes)?;
        Self::from_content(&content)
    }

    pub async fn read_from_file(path: &Path) -> Result<Self, SdtfError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    pub async fn read_from_url(http: &reqwest::Client, url: &str) -> Result<Self, SdtfError> {
        let bytes = fetch_bytes(http, url).await?;
        Self::from_bytes(&bytes)
    }

    pub fn from_content(content: &SdtfContent) -> Result<Self, SdtfError> {
        let chunks = content
            .chunks
            .iter()
            .map(|chunk| resolve_chunk(content, chunk))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            generator: content.asset.generator.clone(),
            chunks,
        })
    }

    /// Matcher view of the chunks, in container order
    pub fn data_chunks(&self) -> Vec<DataChunk> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| DataChunk {
                id: chunk
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("#{}", index)),
                friendly_name: chunk.name.clone(),
                type_hint: chunk.type_hint.clone(),
                item_count: chunk.item_count,
            })
            .collect()
    }
}

/// Download container bytes from a URL
pub async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, SdtfError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| SdtfError::Download(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SdtfError::Download(format!("{} returned {}", url, status)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SdtfError::Download(e.to_string()))?;
    Ok(bytes.to_vec())
}

fn type_hint_name(content: &SdtfContent, index: Option<usize>) -> Result<Option<String>, SdtfError> {
    index
        .map(|i| {
            content
                .type_hints
                .get(i)
                .map(|hint| hint.name.clone())
                .ok_or(SdtfError::DanglingReference { kind: "typeHint", index: i })
        })
        .transpose()
}

fn node(content: &SdtfContent, index: usize) -> Result<&NodeDef, SdtfError> {
    content
        .nodes
        .get(index)
        .ok_or(SdtfError::DanglingReference { kind: "node", index })
}

fn resolve_chunk(content: &SdtfContent, chunk: &NodeDef) -> Result<ParsedChunk, SdtfError> {
    for &item in &chunk.items {
        if content.items.get(item).is_none() {
            return Err(SdtfError::DanglingReference { kind: "item", index: item });
        }
    }

    let mut branches = Vec::with_capacity(chunk.nodes.len());
    let mut visited = HashSet::new();
    let mut item_count = chunk.items.len();

    for &index in &chunk.nodes {
        let branch = node(content, index)?;
        branches.push(Branch {
            name: branch.name.clone().unwrap_or_else(|| format!("#{}", index)),
            item_count: branch.items.len(),
        });
        item_count += count_items(content, index, &mut visited)?;
    }

    let type_hint = match type_hint_name(content, chunk.type_hint)? {
        Some(hint) => Some(hint),
        None => uniform_item_hint(content, chunk)?,
    };

    let attributes = match chunk.attributes {
        Some(index) => content
            .attributes
            .get(index)
            .ok_or(SdtfError::DanglingReference { kind: "attributes", index })?
            .iter()
            .map(|(key, attr)| (key.clone(), attr.value.clone().unwrap_or(Value::Null)))
            .collect(),
        None => Vec::new(),
    };

    Ok(ParsedChunk {
        name: chunk.name.clone(),
        type_hint,
        attributes,
        branches,
        item_count,
    })
}

/// Count items below a node, guarding against reference cycles
///
/// Walks with an explicit stack so deep node chains cannot exhaust the
/// thread stack.
fn count_items(
    content: &SdtfContent,
    index: usize,
    visited: &mut HashSet<usize>,
) -> Result<usize, SdtfError> {
    let mut count = 0;
    let mut pending: Vec<usize> = vec![index];

    while let Some(current) = pending.pop() {
        if !visited.insert(current) {
            continue;
        }
        let def = node(content, current)?;
        count += def.items.len();
        pending.extend(def.nodes.iter().copied());
    }
    Ok(count)
}

/// Type hint shared by every item of a chunk without its own hint
fn uniform_item_hint(content: &SdtfContent, chunk: &NodeDef) -> Result<Option<String>, SdtfError> {
    let mut item_indices: Vec<usize> = chunk.items.clone();
    for &index in &chunk.nodes {
        item_indices.extend(node(content, index)?.items.iter().copied());
    }

    let mut hints = HashSet::new();
    for index in item_indices {
        let item = content
            .items
            .get(index)
            .ok_or(SdtfError::DanglingReference { kind: "item", index })?;
        hints.insert(item.type_hint);
    }

    match hints.into_iter().collect::<Vec<_>>().as_slice() {
        [single] => type_hint_name(content, *single),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdtf::format::{ItemDef, TypeHintDef};
    use serde_json::json;

    fn content_with_untyped_chunk() -> SdtfContent {
        SdtfContent {
            chunks: vec![NodeDef {
                name: Some("Numbers".to_string()),
                nodes: vec![0],
                ..Default::default()
            }],
            nodes: vec![NodeDef {
                name: Some("[0]".to_string()),
                items: vec![0, 1],
                ..Default::default()
            }],
            items: vec![
                ItemDef {
                    type_hint: Some(0),
                    value: Some(json!(1.5)),
                    ..Default::default()
                },
                ItemDef {
                    type_hint: Some(0),
                    value: Some(json!(2.5)),
                    ..Default::default()
                },
            ],
            type_hints: vec![TypeHintDef {
                name: "double".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_chunk_hint_derived_from_uniform_items() {
        let asset = SdtfAsset::from_content(&content_with_untyped_chunk()).unwrap();
        assert_eq!(asset.chunks[0].type_hint.as_deref(), Some("double"));
        assert_eq!(asset.chunks[0].item_count, 2);
    }

    #[test]
    fn test_mixed_item_hints_leave_chunk_untyped() {
        let mut content = content_with_untyped_chunk();
        content.type_hints.push(TypeHintDef {
            name: "string".to_string(),
        });
        content.items[1].type_hint = Some(1);

        let asset = SdtfAsset::from_content(&content).unwrap();
        assert!(asset.chunks[0].type_hint.is_none());
    }

    #[test]
    fn test_dangling_node_reference_is_error() {
        let mut content = content_with_untyped_chunk();
        content.chunks[0].nodes = vec![5];
        assert!(matches!(
            SdtfAsset::from_content(&content),
            Err(SdtfError::DanglingReference { kind: "node", index: 5 })
        ));
    }

    #[test]
    fn test_node_cycle_is_counted_once() {
        let mut content = content_with_untyped_chunk();
        content.nodes[0].nodes = vec![0];
        let asset = SdtfAsset::from_content(&content).unwrap();
        assert_eq!(asset.chunks[0].item_count, 2);
    }

    #[test]
    fn test_long_node_chain_does_not_exhaust_stack() {
        const CHAIN: usize = 100_000;

        let mut content = content_with_untyped_chunk();
        content.nodes[0].nodes = vec![1];
        for i in 1..CHAIN {
            content.nodes.push(NodeDef {
                nodes: if i + 1 < CHAIN { vec![i + 1] } else { Vec::new() },
                items: if i + 1 == CHAIN { vec![0] } else { Vec::new() },
                ..Default::default()
            });
        }

        let asset = SdtfAsset::from_content(&content).unwrap();
        assert_eq!(asset.chunks[0].item_count, 3);

        // A dangling link at the end of the chain is still reported
        content.nodes[CHAIN - 1].nodes = vec![CHAIN];
        assert!(matches!(
            SdtfAsset::from_content(&content),
            Err(SdtfError::DanglingReference { kind: "node", .. })
        ));
    }

    #[test]
    fn test_unnamed_chunk_gets_positional_id() {
        let mut content = content_with_untyped_chunk();
        content.chunks[0].name = None;
        let asset = SdtfAsset::from_content(&content).unwrap();
        let chunks = asset.data_chunks();
        assert_eq!(chunks[0].id, "#0");
        assert!(chunks[0].friendly_name.is_none());
    }
}
