//! Chunk → parameter matching
//!
//! Binds the chunks of one or more structured data containers to the
//! parameters of a session. Matching is best effort and greedy: chunks are
//! visited in container order, each takes the first free parameter of its
//! type in declaration order, and nothing is ever re-assigned. Chunks that
//! cannot be bound are reported as diagnostics, never as errors.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::sdtf_customization::{ParameterValue, SdtfSource};
use crate::models::{ParameterDescriptor, ParameterType};
use crate::sdtf::{parameter_type_for_hint, DataChunk, SdtfAsset, SdtfError};

/// A container's bytes together with the chunks it holds
#[derive(Debug, Clone)]
pub struct SdtfInput {
    pub buffer: Arc<[u8]>,
    pub chunks: Vec<DataChunk>,
}

impl SdtfInput {
    /// Parse container bytes into a matcher input
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SdtfError> {
        let chunks = SdtfAsset::from_bytes(&bytes)?.data_chunks();
        Ok(Self {
            buffer: Arc::from(bytes),
            chunks,
        })
    }
}

/// One chunk bound to one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParameterBinding {
    pub chunk_id: String,
    pub parameter_id: String,
    /// Index into `MatchOutcome::uploads`
    pub buffer_index: usize,
    /// Name selecting the chunk within its container
    pub chunk_name_hint: Option<String>,
}

/// Why a chunk was skipped, or a warning about an ambiguous match
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchDiagnostic {
    #[error("Chunk {chunk_id} has no name or no type hint, skipping")]
    MissingNameOrTypeHint { chunk_id: String },

    #[error("Chunk {chunk_id}: type hint {type_hint} does not map to a parameter type, skipping")]
    UnmappedTypeHint { chunk_id: String, type_hint: String },

    #[error("Chunk {chunk_id}: no parameter of type {parameter_type}, skipping")]
    NoCompatibleParameter { chunk_id: String, parameter_type: ParameterType },

    #[error("Chunk {chunk_id}: {candidates} parameters of type {parameter_type}, using the first free one")]
    MultipleCandidates {
        chunk_id: String,
        parameter_type: ParameterType,
        candidates: usize,
    },

    #[error("Chunk {chunk_id}: all parameters of type {parameter_type} already matched to other chunks, skipping")]
    AllCandidatesClaimed { chunk_id: String, parameter_type: ParameterType },
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub bindings: Vec<ChunkParameterBinding>,
    /// Buffers referenced by bindings, each once
    pub uploads: Vec<Arc<[u8]>>,
    pub diagnostics: Vec<MatchDiagnostic>,
}

impl MatchOutcome {
    /// Parameter values for a customization request, one per binding
    pub fn into_parameter_values(self) -> Vec<(String, ParameterValue)> {
        let uploads = self.uploads;
        self.bindings
            .into_iter()
            .map(|binding| {
                let value = ParameterValue::Sdtf {
                    source: SdtfSource::Buffer(Arc::clone(&uploads[binding.buffer_index])),
                    chunk_name: binding.chunk_name_hint,
                };
                (binding.parameter_id, value)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ChunkMatcher;

impl ChunkMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Bind chunks to parameters
    ///
    /// **Algorithm** (per chunk, in container order):
    /// 1. Skip chunks without name or type hint
    /// 2. Map the type hint to a parameter type; skip unmapped hints
    /// 3. Collect parameters of that type in declaration order; skip when
    ///    there are none, warn when there are several
    /// 4. Take the first candidate not bound to an earlier chunk; skip when
    ///    all are taken
    /// 5. Record the binding and schedule the chunk's buffer for upload
    ///    unless the same buffer is already scheduled
    pub fn match_chunks(&self, inputs: &[SdtfInput], parameters: &[ParameterDescriptor]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let mut claimed: HashSet<&str> = HashSet::new();

        for input in inputs {
            for chunk in &input.chunks {
                let chunk_id = chunk.id.clone();

                let (name, type_hint) = match (&chunk.friendly_name, &chunk.type_hint) {
                    (Some(name), Some(hint)) => (name, hint),
                    _ => {
                        outcome.push_diagnostic(MatchDiagnostic::MissingNameOrTypeHint { chunk_id });
                        continue;
                    }
                };

                let Some(parameter_type) = parameter_type_for_hint(type_hint) else {
                    outcome.push_diagnostic(MatchDiagnostic::UnmappedTypeHint {
                        chunk_id,
                        type_hint: type_hint.clone(),
                    });
                    continue;
                };

                let candidates: Vec<&ParameterDescriptor> = parameters
                    .iter()
                    .filter(|p| p.param_type == parameter_type)
                    .collect();

                if candidates.is_empty() {
                    outcome.push_diagnostic(MatchDiagnostic::NoCompatibleParameter {
                        chunk_id,
                        parameter_type,
                    });
                    continue;
                }
                if candidates.len() > 1 {
                    outcome.push_diagnostic(MatchDiagnostic::MultipleCandidates {
                        chunk_id: chunk_id.clone(),
                        parameter_type: parameter_type.clone(),
                        candidates: candidates.len(),
                    });
                }

                let Some(parameter) = candidates.into_iter().find(|p| !claimed.contains(p.id.as_str())) else {
                    outcome.push_diagnostic(MatchDiagnostic::AllCandidatesClaimed {
                        chunk_id,
                        parameter_type,
                    });
                    continue;
                };
                claimed.insert(parameter.id.as_str());

                let buffer_index = outcome.schedule_upload(&input.buffer);
                tracing::info!(
                    chunk = %chunk_id,
                    parameter_id = %parameter.id,
                    parameter_name = %parameter.name,
                    "Matched chunk to parameter"
                );
                outcome.bindings.push(ChunkParameterBinding {
                    chunk_id,
                    parameter_id: parameter.id.clone(),
                    buffer_index,
                    chunk_name_hint: Some(name.clone()),
                });
            }
        }

        outcome
    }
}

impl MatchOutcome {
    fn push_diagnostic(&mut self, diagnostic: MatchDiagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    /// Index of the buffer in `uploads`, adding it if not yet present
    fn schedule_upload(&mut self, buffer: &Arc<[u8]>) -> usize {
        if let Some(index) = self.uploads.iter().position(|b| Arc::ptr_eq(b, buffer)) {
            return index;
        }
        self.uploads.push(Arc::clone(buffer));
        self.uploads.len() - 1
    }
}
