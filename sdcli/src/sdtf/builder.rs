//! Writing structured data containers
//!
//! Chunks are written as Grasshopper-style trees: every branch becomes a
//! node named after its path (`[0,1]`), holding the branch's items.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::format::{self, AttributeDef, ItemDef, NodeDef, SdtfContent, TypeHintDef};
use super::SdtfError;

/// One value together with its type hint
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub value: Value,
    pub type_hint: String,
}

impl DataItem {
    pub fn new(value: impl Into<Value>, type_hint: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            type_hint: type_hint.into(),
        }
    }
}

/// Grasshopper data tree: `branches[i]` lives at `paths[i]`
#[derive(Debug, Clone, Default)]
pub struct TreeData {
    pub branches: Vec<Vec<DataItem>>,
    pub paths: Vec<Vec<u32>>,
}

#[derive(Debug, Default)]
pub struct SdtfBuilder {
    content: SdtfContent,
}

impl SdtfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk holding a data tree
    ///
    /// The chunk's own type hint is set when all of its items share one.
    pub fn add_chunk_for_tree_data(
        &mut self,
        name: &str,
        tree: TreeData,
        attributes: Vec<(String, Value)>,
    ) -> Result<&mut Self, SdtfError> {
        if tree.branches.len() != tree.paths.len() {
            return Err(SdtfError::MismatchedTree {
                branches: tree.branches.len(),
                paths: tree.paths.len(),
            });
        }

        let mut chunk_hints: Vec<String> = Vec::new();
        let mut node_indices = Vec::with_capacity(tree.branches.len());

        for (branch, path) in tree.branches.into_iter().zip(tree.paths) {
            let mut item_indices = Vec::with_capacity(branch.len());
            for item in branch {
                if !chunk_hints.contains(&item.type_hint) {
                    chunk_hints.push(item.type_hint.clone());
                }
                let type_hint = self.type_hint_index(&item.type_hint);
                self.content.items.push(ItemDef {
                    type_hint: Some(type_hint),
                    value: Some(item.value),
                    ..Default::default()
                });
                item_indices.push(self.content.items.len() - 1);
            }

            self.content.nodes.push(NodeDef {
                name: Some(path_name(&path)),
                items: item_indices,
                ..Default::default()
            });
            node_indices.push(self.content.nodes.len() - 1);
        }

        let type_hint = match chunk_hints.as_slice() {
            [single] => Some(self.type_hint_index(single)),
            _ => None,
        };
        let attributes = if attributes.is_empty() {
            None
        } else {
            Some(self.add_attributes(attributes))
        };

        self.content.chunks.push(NodeDef {
            name: Some(name.to_string()),
            type_hint,
            attributes,
            nodes: node_indices,
            items: Vec::new(),
        });
        Ok(self)
    }

    pub fn build(self) -> SdtfContent {
        self.content
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SdtfError> {
        format::encode(&self.content, &[])
    }

    fn type_hint_index(&mut self, name: &str) -> usize {
        if let Some(index) = self.content.type_hints.iter().position(|h| h.name == name) {
            return index;
        }
        self.content.type_hints.push(TypeHintDef {
            name: name.to_string(),
        });
        self.content.type_hints.len() - 1
    }

    fn add_attributes(&mut self, attributes: Vec<(String, Value)>) -> usize {
        let mut map = BTreeMap::new();
        for (key, value) in attributes {
            let type_hint = json_type_hint(&value).map(|hint| self.type_hint_index(hint));
            map.insert(
                key,
                AttributeDef {
                    type_hint,
                    value: Some(value),
                    accessor: None,
                },
            );
        }
        self.content.attributes.push(map);
        self.content.attributes.len() - 1
    }
}

fn path_name(path: &[u32]) -> String {
    let parts: Vec<String> = path.iter().map(|p| p.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Type hint of plain JSON attribute values (arrays take their first element's)
fn json_type_hint(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("int64"),
        Value::Number(_) => Some("double"),
        Value::Array(items) => items.first().and_then(json_type_hint),
        _ => None,
    }
}

/// Chunks available in the example container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleChunk {
    /// Tree of strings with two branches
    String,
    /// List of two polyline curves
    Curve,
    /// List of three points
    Point,
}

impl ExampleChunk {
    pub const ALL: [ExampleChunk; 3] = [ExampleChunk::String, ExampleChunk::Curve, ExampleChunk::Point];
}

fn polyline(points: &[[f64; 3]]) -> Value {
    json!({ "points": points })
}

/// Build the example container holding the requested chunks
pub fn make_example_sdtf(kinds: &[ExampleChunk]) -> Result<Vec<u8>, SdtfError> {
    let mut builder = SdtfBuilder::new();

    if kinds.contains(&ExampleChunk::String) {
        let tree = TreeData {
            branches: vec![
                vec![DataItem::new("foo", "string"), DataItem::new("bar", "string")],
                vec![DataItem::new("baz", "string")],
            ],
            paths: vec![vec![0, 0], vec![0, 1]],
        };
        builder.add_chunk_for_tree_data("String", tree, vec![("Name".to_string(), json!(["Text"]))])?;
    }

    if kinds.contains(&ExampleChunk::Curve) {
        let first = polyline(&[[0.1, 0.2, 0.3], [0.4, 0.6, 0.8], [0.5, 0.7, 0.9]]);
        // Same curve moved one unit along x
        let second = polyline(&[[1.1, 0.2, 0.3], [1.4, 0.6, 0.8], [1.5, 0.7, 0.9]]);
        let tree = TreeData {
            branches: vec![vec![
                DataItem::new(first, "rhino.polylinecurve"),
                DataItem::new(second, "rhino.polylinecurve"),
            ]],
            paths: vec![vec![0]],
        };
        builder.add_chunk_for_tree_data("Curve", tree, vec![("Name".to_string(), json!(["Crv"]))])?;
    }

    if kinds.contains(&ExampleChunk::Point) {
        let tree = TreeData {
            branches: vec![vec![
                DataItem::new(json!([0.1, 0.2, 0.3]), "rhino.point"),
                DataItem::new(json!([0.4, 0.6, 0.8]), "rhino.point"),
                DataItem::new(json!([0.5, 0.7, 0.9]), "rhino.point"),
            ]],
            paths: vec![vec![0]],
        };
        builder.add_chunk_for_tree_data("Point", tree, vec![("Name".to_string(), json!(["Pt"]))])?;
    }

    builder.to_bytes()
}
