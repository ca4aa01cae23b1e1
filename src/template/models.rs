use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::MatchMode;

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Text,
    Number,
    Email,
    Date,
    Textarea,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Text => "text",
            ParameterType::Number => "number",
            ParameterType::Email => "email",
            ParameterType::Date => "date",
            ParameterType::Textarea => "textarea",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(ParameterType::Text),
            "number" => Some(ParameterType::Number),
            "email" => Some(ParameterType::Email),
            "date" => Some(ParameterType::Date),
            "textarea" => Some(ParameterType::Textarea),
            _ => None,
        }
    }
}

/// Document family of an uploaded template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Word,
    Excel,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Word => "word",
            DocumentFormat::Excel => "excel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "word" => Some(DocumentFormat::Word),
            "excel" => Some(DocumentFormat::Excel),
            _ => None,
        }
    }

    /// File extension used for storage keys.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Word => "docx",
            DocumentFormat::Excel => "xlsx",
        }
    }

    /// Word bodies get the split-token heuristic; Excel bodies match exactly.
    pub fn match_mode(&self) -> MatchMode {
        match self {
            DocumentFormat::Word => MatchMode::Relaxed,
            DocumentFormat::Excel => MatchMode::Exact,
        }
    }
}

/// A typed parameter bound to a template's placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateParameter {
    #[schema(example = "company_name")]
    pub name: String,
    #[schema(example = "Company name")]
    pub label: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub required: bool,
    #[serde(default)]
    #[schema(example = "Acme Corp")]
    pub default_value: Option<String>,
    /// Declaration order; drives deterministic validation.
    #[serde(default)]
    pub position: i32,
}

/// Incoming parameter definition; position is assigned from array order.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ParameterDefinition {
    #[schema(example = "company_name")]
    pub name: String,
    #[schema(example = "Company name")]
    pub label: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl ParameterDefinition {
    pub fn into_parameter(self, position: i32) -> TemplateParameter {
        TemplateParameter {
            name: self.name,
            label: self.label,
            param_type: self.param_type,
            required: self.required,
            default_value: self.default_value,
            position,
        }
    }
}

/// An uploaded template document. Bytes are immutable after upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateRecord {
    #[schema(example = "f1e2d3c4-b5a6-7890-1234-567890abcdef")]
    pub id: Uuid,
    /// Opaque principal id of the uploader.
    pub owner: String,
    #[schema(example = "Claim approval letter")]
    pub name: String,
    pub description: Option<String>,
    pub format: DocumentFormat,
    /// Key of the raw bytes in the object store.
    #[schema(example = "principal-1/1735689600000.docx")]
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl TemplateRecord {
    pub fn new(
        owner: String,
        name: String,
        description: Option<String>,
        format: DocumentFormat,
        storage_key: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name,
            description,
            format,
            storage_key,
            created_at: Utc::now(),
        }
    }
}
