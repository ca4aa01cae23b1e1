//! Document assembly pipeline.
//!
//! Orchestrates one generation request: fetch template bytes, decode,
//! substitute, encode, persist the result and hand back a time-limited
//! retrieval URL. The only component touching external collaborators; the
//! substitution core stays pure.
//!
//! States run one way, `Requested -> ParametersValidated -> TemplateFetched
//! -> Substituted -> Persisted -> Completed`, with `Failed(reason)` reachable
//! from any non-terminal state. There are no internal retries; a failed
//! request is resubmitted by the caller as a new generation with a new id.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::MetadataStore;
use crate::engine::{substitute, validate, ValidationError};
use crate::generation::models::{GenerationRecord, GenerationStatus};
use crate::storage::ObjectStorage;

/// Retrieval URLs expire after one hour.
pub const SIGNED_URL_TTL_SECS: u64 = 3600;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Failure reasons a generation can terminate with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("duplicate parameter name '{0}'")]
    DuplicateParameterName(String),
    #[error("template unavailable: {0}")]
    TemplateUnavailable(String),
    #[error("storage read failed: {0}")]
    StorageRead(String),
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("generation cancelled")]
    Cancelled,
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub generation_id: Uuid,
    pub result_key: String,
    pub download_url: String,
}

/// One pipeline instance per service; each `run` call is an independent
/// sequential invocation with no shared mutable state across requests.
pub struct AssemblyPipeline {
    metadata: Arc<dyn MetadataStore + Send + Sync>,
    storage: Arc<dyn ObjectStorage + Send + Sync>,
}

impl AssemblyPipeline {
    pub fn new(
        metadata: Arc<dyn MetadataStore + Send + Sync>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
    ) -> Self {
        Self { metadata, storage }
    }

    /// Run one generation for `principal` against `template_id`.
    ///
    /// The generation record is inserted before validation so failed requests
    /// are still recorded for audit; `result_key` is only ever set on
    /// completion. `cancel` is observed at every collaborator call, the only
    /// suspension points of the pipeline.
    pub async fn run(
        &self,
        principal: &str,
        template_id: Uuid,
        values: HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<GenerationOutcome, PipelineError> {
        if principal.trim().is_empty() {
            return Err(PipelineError::Unauthorized);
        }

        let template = self
            .metadata
            .get_template(&template_id)
            .await
            .map_err(PipelineError::TemplateUnavailable)?
            .ok_or_else(|| {
                PipelineError::TemplateUnavailable(format!("template {} not found", template_id))
            })?;

        if template.owner != principal {
            return Err(PipelineError::Unauthorized);
        }

        let parameters = self
            .metadata
            .get_parameters(&template_id)
            .await
            .map_err(PipelineError::TemplateUnavailable)?;

        let generation = GenerationRecord::new(template_id, principal.to_string(), &values);
        let generation_id = generation.id;
        self.metadata
            .insert_generation(&generation)
            .await
            .map_err(PipelineError::StorageWrite)?;
        let mut state = GenerationStatus::Requested;

        if let Some(first) = validate(&parameters, &values)
            .err()
            .and_then(|errors| errors.into_first())
        {
            return Err(self
                .fail(generation_id, state, PipelineError::Validation(first))
                .await);
        }
        state = self.advance(generation_id, state, GenerationStatus::ParametersValidated);

        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(self.fail(generation_id, state, PipelineError::Cancelled).await);
            }
            result = self.storage.download_file(&template.storage_key) => result,
        };
        let raw_bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(self
                    .fail(generation_id, state, PipelineError::TemplateUnavailable(e))
                    .await);
            }
        };
        state = self.advance(generation_id, state, GenerationStatus::TemplateFetched);

        let body = match decode_template_body(&raw_bytes) {
            Ok(body) => body,
            Err(e) => {
                return Err(self
                    .fail(generation_id, state, PipelineError::TemplateUnavailable(e))
                    .await);
            }
        };

        // Only declared parameters take part in substitution. A stray key,
        // in relaxed mode, could otherwise claim placeholder spans that
        // belong to real parameters.
        let declared: HashMap<String, String> = values
            .into_iter()
            .filter(|(name, _)| parameters.iter().any(|p| p.name == *name))
            .collect();
        let filled = substitute(&body, &declared, template.format.match_mode());
        let output = filled.into_bytes();
        state = self.advance(generation_id, state, GenerationStatus::Substituted);

        let result_key = format!(
            "{}/{}.{}",
            principal,
            generation_id,
            template.format.extension()
        );

        let uploaded = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(self.fail(generation_id, state, PipelineError::Cancelled).await);
            }
            result = self.storage.upload_file(&result_key, &output) => result,
        };
        if let Err(e) = uploaded {
            return Err(self
                .fail(generation_id, state, PipelineError::StorageWrite(e))
                .await);
        }
        state = self.advance(generation_id, state, GenerationStatus::Persisted);

        let signed = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(self.fail(generation_id, state, PipelineError::Cancelled).await);
            }
            result = self.storage.create_signed_url(&result_key, SIGNED_URL_TTL_SECS) => result,
        };
        let download_url = match signed {
            Ok(url) => url,
            Err(e) => {
                return Err(self
                    .fail(generation_id, state, PipelineError::StorageRead(e))
                    .await);
            }
        };

        self.metadata
            .finalize_generation(&generation_id, &result_key)
            .await
            .map_err(PipelineError::StorageWrite)?;
        self.advance(generation_id, state, GenerationStatus::Completed);

        Ok(GenerationOutcome {
            generation_id,
            result_key,
            download_url,
        })
    }

    fn advance(
        &self,
        generation_id: Uuid,
        from: GenerationStatus,
        to: GenerationStatus,
    ) -> GenerationStatus {
        log::debug!(
            "generation {}: {} -> {}",
            generation_id,
            from.as_str(),
            to.as_str()
        );
        to
    }

    async fn fail(
        &self,
        generation_id: Uuid,
        state: GenerationStatus,
        error: PipelineError,
    ) -> PipelineError {
        log::error!(
            "generation {} failed in state {}: {}",
            generation_id,
            state.as_str(),
            error
        );
        if let Err(e) = self
            .metadata
            .mark_generation_failed(&generation_id, &error.to_string())
            .await
        {
            log::error!(
                "could not record failure for generation {}: {}",
                generation_id,
                e
            );
        }
        error
    }
}

/// Decode fetched template bytes into a text body.
///
/// The substitution engine works on an already-extracted textual document
/// part. A compressed Office Open XML package handed to it would corrupt the
/// binary regions, so zip input is refused here rather than mangled.
fn decode_template_body(bytes: &[u8]) -> Result<String, String> {
    if bytes.starts_with(ZIP_MAGIC) {
        return Err(
            "template is a compressed Office package; expected an extracted document part"
                .to_string(),
        );
    }
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("template is not valid UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_text() {
        assert_eq!(
            decode_template_body(b"Dear {{name}}").unwrap(),
            "Dear {{name}}"
        );
    }

    #[test]
    fn refuses_zip_packages() {
        let err = decode_template_body(b"PK\x03\x04rest-of-archive").unwrap_err();
        assert!(err.contains("compressed Office package"));
    }

    #[test]
    fn refuses_non_utf8_bytes() {
        let err = decode_template_body(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.contains("not valid UTF-8"));
    }
}
