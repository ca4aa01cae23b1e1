//! Generate and generation-status handlers.

use actix_web::{
    web::{self, Json, Path},
    HttpRequest, HttpResponse, Responder,
};
use log::{error, info};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::validate_request_token;
use crate::db::AppState;
use crate::generation::models::{GenerateRequest, GenerateResponse, GenerationRecord};
use crate::generation::pipeline::{AssemblyPipeline, PipelineError};
use crate::ErrorResponse;

#[utoipa::path(
    context_path = "/api",
    tag = "Generation Service",
    post,
    path = "/templates/{id}/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Document generated", body = GenerateResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template to generate from")
    )
)]
pub async fn generate_document(
    req: HttpRequest,
    id: Path<Uuid>,
    body: Json<GenerateRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let template_id = id.into_inner();
    info!(
        "Executing generate_document handler for template: {}",
        template_id
    );
    // Reject before any collaborator call is made.
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => {
            return HttpResponse::Unauthorized()
                .json(ErrorResponse::new("Unauthorized", &e.to_string()));
        }
    };

    let pipeline = AssemblyPipeline::new(data.metadata.clone(), data.storage.clone());
    let cancel = CancellationToken::new();

    match pipeline
        .run(
            &claims.sub,
            template_id,
            body.into_inner().parameters,
            cancel,
        )
        .await
    {
        Ok(outcome) => {
            info!(
                "Generation {} completed for principal {}",
                outcome.generation_id, claims.sub
            );
            HttpResponse::Ok().json(GenerateResponse {
                success: true,
                document_id: outcome.generation_id.to_string(),
                download_url: outcome.download_url,
            })
        }
        Err(e) => {
            error!("Generation failed for template {}: {}", template_id, e);
            pipeline_error_response(e)
        }
    }
}

fn pipeline_error_response(error: PipelineError) -> HttpResponse {
    let message = error.to_string();
    match error {
        PipelineError::Validation(_) | PipelineError::DuplicateParameterName(_) => {
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message))
        }
        PipelineError::TemplateUnavailable(_) => {
            HttpResponse::NotFound().json(ErrorResponse::not_found(&message))
        }
        PipelineError::Unauthorized => {
            HttpResponse::Unauthorized().json(ErrorResponse::new("Unauthorized", &message))
        }
        PipelineError::StorageRead(_)
        | PipelineError::StorageWrite(_)
        | PipelineError::Cancelled => {
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&message))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generation Service",
    get,
    path = "/generations/{id}",
    responses(
        (status = 200, description = "Generation record", body = GenerationRecord),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Generation not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the generation to retrieve")
    )
)]
pub async fn get_generation(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let generation_id = id.into_inner();
    info!(
        "Executing get_generation handler for ID: {}",
        generation_id
    );
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => {
            return HttpResponse::Unauthorized()
                .json(ErrorResponse::new("Unauthorized", &e.to_string()));
        }
    };

    match data.metadata.get_generation(&generation_id).await {
        Ok(Some(generation)) if generation.requested_by == claims.sub => {
            HttpResponse::Ok().json(generation)
        }
        Ok(_) => {
            error!("Generation not found for ID: {}", generation_id);
            HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Generation with ID {} not found",
                generation_id
            )))
        }
        Err(e) => {
            error!("Failed to get generation {}: {}", generation_id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve generation"))
        }
    }
}
