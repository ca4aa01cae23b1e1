//! Metadata store collaborator.
//!
//! Template records, ordered parameter definitions and generation records are
//! persisted through a simple record API. The Postgres implementation uses
//! sqlx's runtime query API; the `(template_id, name)` uniqueness constraint
//! lives in the schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::generation::models::{GenerationRecord, GenerationStatus};
use crate::template::models::{
    DocumentFormat, ParameterType, TemplateParameter, TemplateRecord,
};

/// Record operations the service depends on.
#[async_trait]
pub trait MetadataStore {
    async fn insert_template(&self, template: &TemplateRecord) -> Result<(), String>;
    async fn get_template(&self, id: &Uuid) -> Result<Option<TemplateRecord>, String>;
    async fn list_templates(&self, owner: &str) -> Result<Vec<TemplateRecord>, String>;

    /// Replace the whole parameter schema of a template.
    async fn replace_parameters(
        &self,
        template_id: &Uuid,
        parameters: &[TemplateParameter],
    ) -> Result<(), String>;
    /// Parameter schema in declaration order.
    async fn get_parameters(&self, template_id: &Uuid) -> Result<Vec<TemplateParameter>, String>;

    async fn insert_generation(&self, generation: &GenerationRecord) -> Result<(), String>;
    async fn get_generation(&self, id: &Uuid) -> Result<Option<GenerationRecord>, String>;
    async fn mark_generation_failed(&self, id: &Uuid, reason: &str) -> Result<(), String>;
    /// Record the result key and completion time. Called at most once.
    async fn finalize_generation(&self, id: &Uuid, result_key: &str) -> Result<(), String>;
}

/// Postgres-backed metadata store.
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it is not there yet.
    pub async fn bootstrap(&self) -> Result<(), String> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id UUID PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                format TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS template_parameters (
                template_id UUID NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                label TEXT NOT NULL,
                param_type TEXT NOT NULL,
                required BOOLEAN NOT NULL,
                default_value TEXT,
                position INT NOT NULL,
                PRIMARY KEY (template_id, name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                id UUID PRIMARY KEY,
                template_id UUID NOT NULL,
                requested_by TEXT NOT NULL,
                parameter_values JSONB NOT NULL,
                status TEXT NOT NULL,
                failure_reason TEXT,
                result_key TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| format!("schema bootstrap failed: {}", e))?;
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    owner: String,
    name: String,
    description: Option<String>,
    format: String,
    storage_key: String,
    created_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_record(self) -> Result<TemplateRecord, String> {
        let format = DocumentFormat::parse(&self.format)
            .ok_or_else(|| format!("unknown document format '{}' in store", self.format))?;
        Ok(TemplateRecord {
            id: self.id,
            owner: self.owner,
            name: self.name,
            description: self.description,
            format,
            storage_key: self.storage_key,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ParameterRow {
    name: String,
    label: String,
    param_type: String,
    required: bool,
    default_value: Option<String>,
    position: i32,
}

impl ParameterRow {
    fn into_parameter(self) -> Result<TemplateParameter, String> {
        let param_type = ParameterType::parse(&self.param_type)
            .ok_or_else(|| format!("unknown parameter type '{}' in store", self.param_type))?;
        Ok(TemplateParameter {
            name: self.name,
            label: self.label,
            param_type,
            required: self.required,
            default_value: self.default_value,
            position: self.position,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GenerationRow {
    id: Uuid,
    template_id: Uuid,
    requested_by: String,
    parameter_values: serde_json::Value,
    status: String,
    failure_reason: Option<String>,
    result_key: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl GenerationRow {
    fn into_record(self) -> Result<GenerationRecord, String> {
        let status = GenerationStatus::parse(&self.status)
            .ok_or_else(|| format!("unknown generation status '{}' in store", self.status))?;
        Ok(GenerationRecord {
            id: self.id,
            template_id: self.template_id,
            requested_by: self.requested_by,
            parameter_values: self.parameter_values,
            status,
            failure_reason: self.failure_reason,
            result_key: self.result_key,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn insert_template(&self, template: &TemplateRecord) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, owner, name, description, format, storage_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(template.id)
        .bind(&template.owner)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.format.as_str())
        .bind(&template.storage_key)
        .bind(template.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("failed to insert template: {}", e))?;
        Ok(())
    }

    async fn get_template(&self, id: &Uuid) -> Result<Option<TemplateRecord>, String> {
        let row: Option<TemplateRow> = sqlx::query_as(
            "SELECT id, owner, name, description, format, storage_key, created_at FROM templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("failed to fetch template: {}", e))?;

        row.map(TemplateRow::into_record).transpose()
    }

    async fn list_templates(&self, owner: &str) -> Result<Vec<TemplateRecord>, String> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            "SELECT id, owner, name, description, format, storage_key, created_at FROM templates WHERE owner = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("failed to list templates: {}", e))?;

        rows.into_iter().map(TemplateRow::into_record).collect()
    }

    async fn replace_parameters(
        &self,
        template_id: &Uuid,
        parameters: &[TemplateParameter],
    ) -> Result<(), String> {
        sqlx::query("DELETE FROM template_parameters WHERE template_id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("failed to clear parameters: {}", e))?;

        for parameter in parameters {
            sqlx::query(
                r#"
                INSERT INTO template_parameters (template_id, name, label, param_type, required, default_value, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(template_id)
            .bind(&parameter.name)
            .bind(&parameter.label)
            .bind(parameter.param_type.as_str())
            .bind(parameter.required)
            .bind(&parameter.default_value)
            .bind(parameter.position)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("failed to insert parameter '{}': {}", parameter.name, e))?;
        }
        Ok(())
    }

    async fn get_parameters(&self, template_id: &Uuid) -> Result<Vec<TemplateParameter>, String> {
        let rows: Vec<ParameterRow> = sqlx::query_as(
            "SELECT name, label, param_type, required, default_value, position FROM template_parameters WHERE template_id = $1 ORDER BY position",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("failed to fetch parameters: {}", e))?;

        rows.into_iter().map(ParameterRow::into_parameter).collect()
    }

    async fn insert_generation(&self, generation: &GenerationRecord) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO generations (id, template_id, requested_by, parameter_values, status, failure_reason, result_key, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(generation.id)
        .bind(generation.template_id)
        .bind(&generation.requested_by)
        .bind(&generation.parameter_values)
        .bind(generation.status.as_str())
        .bind(&generation.failure_reason)
        .bind(&generation.result_key)
        .bind(generation.created_at)
        .bind(generation.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("failed to insert generation: {}", e))?;
        Ok(())
    }

    async fn get_generation(&self, id: &Uuid) -> Result<Option<GenerationRecord>, String> {
        let row: Option<GenerationRow> = sqlx::query_as(
            "SELECT id, template_id, requested_by, parameter_values, status, failure_reason, result_key, created_at, completed_at FROM generations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("failed to fetch generation: {}", e))?;

        row.map(GenerationRow::into_record).transpose()
    }

    async fn mark_generation_failed(&self, id: &Uuid, reason: &str) -> Result<(), String> {
        sqlx::query(
            "UPDATE generations SET status = $2, failure_reason = $3, completed_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.as_str())
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| format!("failed to mark generation failed: {}", e))?;
        Ok(())
    }

    async fn finalize_generation(&self, id: &Uuid, result_key: &str) -> Result<(), String> {
        sqlx::query(
            "UPDATE generations SET status = $2, result_key = $3, completed_at = $4 WHERE id = $1 AND result_key IS NULL",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.as_str())
        .bind(result_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| format!("failed to finalize generation: {}", e))?;
        Ok(())
    }
}
