//! End-to-end pipeline scenarios against in-memory collaborators.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{MemoryMetadataStore, MockObjectStorage};
use docmerge_server::generation::models::GenerationStatus;
use docmerge_server::generation::pipeline::{AssemblyPipeline, PipelineError, SIGNED_URL_TTL_SECS};
use docmerge_server::template::models::{
    DocumentFormat, ParameterType, TemplateParameter, TemplateRecord,
};

const PRINCIPAL: &str = "principal-1";

fn param(name: &str, param_type: ParameterType, required: bool, position: i32) -> TemplateParameter {
    TemplateParameter {
        name: name.to_string(),
        label: name.to_string(),
        param_type,
        required,
        default_value: None,
        position,
    }
}

fn values(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

struct Fixture {
    metadata: Arc<MemoryMetadataStore>,
    storage: Arc<MockObjectStorage>,
    pipeline: AssemblyPipeline,
    template_id: Uuid,
}

async fn fixture(
    format: DocumentFormat,
    body: Option<&str>,
    parameters: Vec<TemplateParameter>,
    storage: MockObjectStorage,
) -> Fixture {
    let metadata = Arc::new(MemoryMetadataStore::new());
    let storage = Arc::new(storage);

    let storage_key = format!("{}/1735689600000.{}", PRINCIPAL, format.extension());
    let template = TemplateRecord::new(
        PRINCIPAL.to_string(),
        "letter".to_string(),
        None,
        format,
        storage_key.clone(),
    );
    let template_id = template.id;
    metadata.seed_template(template).await;
    metadata.seed_parameters(template_id, parameters).await;
    if let Some(body) = body {
        storage.seed_file(&storage_key, body.as_bytes()).await;
    }

    let pipeline = AssemblyPipeline::new(metadata.clone(), storage.clone());
    Fixture {
        metadata,
        storage,
        pipeline,
        template_id,
    }
}

#[tokio::test]
async fn claim_letter_generates_end_to_end() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("Dear {{company_name}}, your claim {{claim_id}} is approved."),
        vec![
            param("company_name", ParameterType::Text, true, 0),
            param("claim_id", ParameterType::Text, true, 1),
        ],
        MockObjectStorage::new(),
    )
    .await;

    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("company_name", "Acme"), ("claim_id", "42")]),
            CancellationToken::new(),
        )
        .await
        .expect("pipeline should complete");

    assert_eq!(
        outcome.result_key,
        format!("{}/{}.docx", PRINCIPAL, outcome.generation_id)
    );
    assert_eq!(
        outcome.download_url,
        format!("mock://signed/{}?ttl={}", outcome.result_key, SIGNED_URL_TTL_SECS)
    );

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(
        String::from_utf8(stored).unwrap(),
        "Dear Acme, your claim 42 is approved."
    );

    let generation = fx
        .metadata
        .all_generations()
        .await
        .into_iter()
        .find(|g| g.id == outcome.generation_id)
        .unwrap();
    assert_eq!(generation.status, GenerationStatus::Completed);
    assert_eq!(generation.result_key.as_deref(), Some(outcome.result_key.as_str()));
}

#[tokio::test]
async fn invalid_email_fails_before_any_storage_call() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("Contact: {{email}}"),
        vec![param("email", ParameterType::Email, true, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let err = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("email", "not-an-email")]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::Validation(inner) => {
            assert_eq!(inner.parameter(), "email");
            assert!(inner.to_string().contains("email"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    // The fixture seeds one file directly; no pipeline-driven calls happened.
    assert_eq!(fx.storage.total_calls(), 0);

    let generation = &fx.metadata.all_generations().await[0];
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.result_key.is_none());
}

#[tokio::test]
async fn missing_template_bytes_fail_as_unavailable() {
    let fx = fixture(
        DocumentFormat::Word,
        None, // record exists, object store has nothing
        vec![param("name", ParameterType::Text, false, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let err = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("name", "X")]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TemplateUnavailable(_)));

    // Audit record exists but references no result key.
    let generation = &fx.metadata.all_generations().await[0];
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.result_key.is_none());
}

#[tokio::test]
async fn unknown_template_id_is_unavailable() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("body"),
        vec![],
        MockObjectStorage::new(),
    )
    .await;

    let err = fx
        .pipeline
        .run(
            PRINCIPAL,
            Uuid::new_v4(),
            HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TemplateUnavailable(_)));
    assert!(fx.metadata.all_generations().await.is_empty());
}

#[tokio::test]
async fn foreign_principal_is_rejected_before_storage() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("{{name}}"),
        vec![param("name", ParameterType::Text, true, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let err = fx
        .pipeline
        .run(
            "someone-else",
            fx.template_id,
            values(&[("name", "X")]),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Unauthorized));
    assert_eq!(fx.storage.total_calls(), 0);
}

#[tokio::test]
async fn placeholder_free_template_round_trips_byte_for_byte() {
    let body = "No markers anywhere in this ASCII body.\nSecond line.";
    let fx = fixture(
        DocumentFormat::Excel,
        Some(body),
        vec![param("unused", ParameterType::Text, false, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("unused", "value")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(stored, body.as_bytes());
    assert!(outcome.result_key.ends_with(".xlsx"));
}

#[tokio::test]
async fn word_templates_use_the_split_token_heuristic() {
    let body = "x {{<w:t>client</w:t>}} y";
    let fx = fixture(
        DocumentFormat::Word,
        Some(body),
        vec![param("client", ParameterType::Text, true, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("client", "Acme")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(String::from_utf8(stored).unwrap(), "x Acme y");
}

#[tokio::test]
async fn excel_templates_match_exactly_only() {
    let body = "x {{<t>client</t>}} y";
    let fx = fixture(
        DocumentFormat::Excel,
        Some(body),
        vec![param("client", ParameterType::Text, false, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("client", "Acme")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(stored, body.as_bytes());
}

#[tokio::test]
async fn undeclared_value_keys_cannot_claim_placeholders() {
    let body = "Dear {{company_name}}, your claim {{claim_id}} is approved.";
    let fx = fixture(
        DocumentFormat::Word,
        Some(body),
        vec![
            param("company_name", ParameterType::Text, true, 0),
            param("claim_id", ParameterType::Text, true, 1),
        ],
        MockObjectStorage::new(),
    )
    .await;

    // The empty string is a substring of every placeholder interior; in
    // relaxed mode it would match them all if it took part in scanning.
    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[
                ("company_name", "Acme"),
                ("claim_id", "42"),
                ("", "CLOBBERED"),
                ("id", "X"),
            ]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(
        String::from_utf8(stored).unwrap(),
        "Dear Acme, your claim 42 is approved."
    );
}

#[tokio::test]
async fn only_undeclared_keys_leave_the_body_untouched() {
    let body = "Dear {{company_name}}";
    let fx = fixture(
        DocumentFormat::Word,
        Some(body),
        vec![param("company_name", ParameterType::Text, false, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let outcome = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("", "X"), ("name", "Y")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = fx.storage.file_contents(&outcome.result_key).await.unwrap();
    assert_eq!(stored, body.as_bytes());
}

#[tokio::test]
async fn compressed_package_bytes_are_refused() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("placeholder"),
        vec![],
        MockObjectStorage::new(),
    )
    .await;
    // Overwrite the seeded body with zip-magic bytes.
    let storage_key = format!("{}/1735689600000.docx", PRINCIPAL);
    fx.storage.seed_file(&storage_key, b"PK\x03\x04archive").await;

    let err = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::TemplateUnavailable(message) => {
            assert!(message.contains("compressed Office package"));
        }
        other => panic!("expected TemplateUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_without_persisting_a_result() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("Dear {{name}}"),
        vec![param("name", ParameterType::Text, true, 0)],
        MockObjectStorage::new().with_delay(200),
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fx
        .pipeline
        .run(
            PRINCIPAL,
            fx.template_id,
            values(&[("name", "X")]),
            cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));

    let generation = &fx.metadata.all_generations().await[0];
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.result_key.is_none());
    assert_eq!(fx.storage.uploads.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resubmission_creates_a_new_generation_identity() {
    let fx = fixture(
        DocumentFormat::Word,
        Some("Dear {{name}}"),
        vec![param("name", ParameterType::Text, true, 0)],
        MockObjectStorage::new(),
    )
    .await;

    let vals = values(&[("name", "Acme")]);
    let first = fx
        .pipeline
        .run(PRINCIPAL, fx.template_id, vals.clone(), CancellationToken::new())
        .await
        .unwrap();
    let second = fx
        .pipeline
        .run(PRINCIPAL, fx.template_id, vals, CancellationToken::new())
        .await
        .unwrap();

    assert_ne!(first.generation_id, second.generation_id);
    assert_ne!(first.result_key, second.result_key);
    assert_eq!(fx.metadata.all_generations().await.len(), 2);
}
