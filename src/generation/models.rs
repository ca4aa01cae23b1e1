use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Pipeline state of a generation request. Transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Requested,
    ParametersValidated,
    TemplateFetched,
    Substituted,
    Persisted,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Requested => "requested",
            GenerationStatus::ParametersValidated => "parameters_validated",
            GenerationStatus::TemplateFetched => "template_fetched",
            GenerationStatus::Substituted => "substituted",
            GenerationStatus::Persisted => "persisted",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "requested" => Some(GenerationStatus::Requested),
            "parameters_validated" => Some(GenerationStatus::ParametersValidated),
            "template_fetched" => Some(GenerationStatus::TemplateFetched),
            "substituted" => Some(GenerationStatus::Substituted),
            "persisted" => Some(GenerationStatus::Persisted),
            "completed" => Some(GenerationStatus::Completed),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }
}

/// One request to produce a filled document. Created per invocation,
/// finalized at most once, never deleted by the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub template_id: Uuid,
    /// Opaque principal id of the caller.
    pub requested_by: String,
    /// Raw value map as submitted, kept for audit.
    pub parameter_values: serde_json::Value,
    pub status: GenerationStatus,
    pub failure_reason: Option<String>,
    /// Key of the generated bytes; set exactly once, on completion.
    pub result_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationRecord {
    pub fn new(template_id: Uuid, requested_by: String, values: &HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id,
            requested_by,
            parameter_values: serde_json::to_value(values)
                .unwrap_or(serde_json::Value::Null),
            status: GenerationStatus::Requested,
            failure_reason: None,
            result_key: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Body of a generate call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Parameter name to raw string value.
    pub parameters: HashMap<String, String>,
}

/// Successful generate response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub document_id: String,
    /// Time-limited retrieval URL; expires after 3600 seconds.
    pub download_url: String,
}
