//! Template CRUD handlers: upload, listing and parameter schema definition.

use actix_multipart::Multipart;
use actix_web::{
    web::{self, Json, Path},
    HttpRequest, HttpResponse, Responder,
};
use futures::TryStreamExt;
use lazy_static::lazy_static;
use log::{debug, error, info};
use regex::Regex;
use sanitize_filename::sanitize;
use std::collections::HashSet;
use std::io::Write;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::auth::validate_request_token;
use crate::db::AppState;
use crate::template::models::{
    DocumentFormat, ParameterDefinition, TemplateParameter, TemplateRecord,
};
use crate::ErrorResponse;

lazy_static! {
    /// Identifier grammar for parameter names.
    static ref PARAMETER_NAME: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

struct TemplateUpload {
    bytes: Vec<u8>,
    original_filename: String,
    name: Option<String>,
    description: Option<String>,
    format: Option<DocumentFormat>,
}

async fn read_template_upload(mut payload: Multipart) -> Result<TemplateUpload, String> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut original_filename = String::new();
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut format: Option<DocumentFormat> = None;

    while let Some(mut field) = payload.try_next().await.map_err(|e| e.to_string())? {
        let content_disposition = field
            .content_disposition()
            .ok_or("Content-Disposition not set")?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| "No field name".to_string())?;

        match field_name {
            "file" => {
                let file_name = content_disposition
                    .get_filename()
                    .ok_or_else(|| "No filename".to_string())?;
                original_filename = sanitize(file_name);

                let mut temp_file = NamedTempFile::new()
                    .map_err(|e| format!("Failed to create temporary file: {}", e))?;
                while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
                    temp_file
                        .write_all(&chunk)
                        .map_err(|e| format!("Failed to write chunk to temp file: {}", e))?;
                }
                let data = std::fs::read(temp_file.path())
                    .map_err(|e| format!("Failed to read temp file: {}", e))?;
                bytes = Some(data);
            }
            "name" => {
                name = Some(read_text_field(&mut field).await?);
            }
            "description" => {
                description = Some(read_text_field(&mut field).await?);
            }
            "format" => {
                let value = read_text_field(&mut field).await?;
                format = Some(
                    DocumentFormat::parse(value.trim())
                        .ok_or_else(|| format!("Unknown document format '{}'", value.trim()))?,
                );
            }
            _ => continue,
        }
    }

    match bytes {
        Some(bytes) => Ok(TemplateUpload {
            bytes,
            original_filename,
            name,
            description,
            format,
        }),
        None => Err("No file was uploaded".to_string()),
    }
}

async fn read_text_field(field: &mut actix_multipart::Field) -> Result<String, String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct UploadTemplateRequest {
    #[allow(unused)]
    pub file: Vec<u8>,
    #[allow(unused)]
    pub name: Option<String>,
    #[allow(unused)]
    pub description: Option<String>,
    /// "word" or "excel"
    #[allow(unused)]
    pub format: String,
}

#[utoipa::path(
    context_path = "/api",
    tag = "Template Service",
    post,
    path = "/templates",
    request_body(content = inline(UploadTemplateRequest), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Template created successfully", body = TemplateRecord),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn upload_template(
    req: HttpRequest,
    payload: Multipart,
    data: web::Data<AppState>,
) -> impl Responder {
    info!("Executing upload_template handler");
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(e),
    };

    let upload = match read_template_upload(payload).await {
        Ok(upload) => upload,
        Err(e) => {
            error!("Failed during template upload process: {}", e);
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e));
        }
    };

    let format = match upload.format {
        Some(format) => format,
        None => {
            error!("Upload missing 'format' field");
            return HttpResponse::BadRequest()
                .json(ErrorResponse::bad_request("Missing 'format' field"));
        }
    };

    let storage_key = format!(
        "{}/{}.{}",
        claims.sub,
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    );
    debug!("Uploading template bytes to storage key '{}'", storage_key);
    if let Err(e) = data.storage.upload_file(&storage_key, &upload.bytes).await {
        error!("Failed to upload template to storage: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to store template"));
    }

    let record = TemplateRecord::new(
        claims.sub.clone(),
        upload.name.unwrap_or(upload.original_filename),
        upload.description,
        format,
        storage_key,
    );

    debug!("Inserting template record {:?}", record.id);
    if let Err(e) = data.metadata.insert_template(&record).await {
        error!("Failed to insert template record: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to save template"));
    }

    data.template_cache.invalidate(&claims.sub).await;
    info!("Template {} created for principal {}", record.id, claims.sub);
    HttpResponse::Created().json(record)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Template Service",
    get,
    path = "/templates",
    responses(
        (status = 200, description = "List of the caller's templates", body = [TemplateRecord]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn list_templates(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    info!("Executing list_templates handler");
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(e),
    };

    if let Some(cached) = data.template_cache.get(&claims.sub).await {
        debug!("Serving template list for {} from cache", claims.sub);
        return HttpResponse::Ok().json(cached);
    }

    match data.metadata.list_templates(&claims.sub).await {
        Ok(templates) => {
            data.template_cache
                .insert(claims.sub.clone(), templates.clone())
                .await;
            HttpResponse::Ok().json(templates)
        }
        Err(e) => {
            error!("Failed to list templates: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve templates"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Template Service",
    get,
    path = "/templates/{id}",
    responses(
        (status = 200, description = "Template found", body = TemplateRecord),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template to retrieve")
    )
)]
pub async fn get_template(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let template_id = id.into_inner();
    info!("Executing get_template handler for ID: {}", template_id);
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(e),
    };

    match data.metadata.get_template(&template_id).await {
        Ok(Some(template)) if template.owner == claims.sub => {
            HttpResponse::Ok().json(template)
        }
        Ok(_) => {
            error!("Template not found for ID: {}", template_id);
            HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with ID {} not found",
                template_id
            )))
        }
        Err(e) => {
            error!("Failed to get template {}: {}", template_id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Template Service",
    put,
    path = "/templates/{id}/parameters",
    request_body = Vec<ParameterDefinition>,
    responses(
        (status = 200, description = "Parameter schema replaced", body = [TemplateParameter]),
        (status = 400, description = "Invalid parameter definition", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 409, description = "Duplicate parameter name", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template to define parameters for")
    )
)]
pub async fn define_parameters(
    req: HttpRequest,
    id: Path<Uuid>,
    body: Json<Vec<ParameterDefinition>>,
    data: web::Data<AppState>,
) -> impl Responder {
    let template_id = id.into_inner();
    info!(
        "Executing define_parameters handler for template: {}",
        template_id
    );
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(e),
    };

    match data.metadata.get_template(&template_id).await {
        Ok(Some(template)) if template.owner == claims.sub => {}
        Ok(_) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with ID {} not found",
                template_id
            )));
        }
        Err(e) => {
            error!("Failed to fetch template {}: {}", template_id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"));
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for definition in body.iter() {
        if !PARAMETER_NAME.is_match(&definition.name) {
            error!("Rejected parameter name '{}'", definition.name);
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                "Parameter name '{}' must match [A-Za-z0-9_]+",
                definition.name
            )));
        }
        if !seen.insert(definition.name.as_str()) {
            error!("Duplicate parameter name '{}'", definition.name);
            return HttpResponse::Conflict().json(ErrorResponse::new(
                "Conflict",
                &format!("duplicate parameter name '{}'", definition.name),
            ));
        }
    }

    let parameters: Vec<TemplateParameter> = body
        .into_inner()
        .into_iter()
        .enumerate()
        .map(|(position, definition)| definition.into_parameter(position as i32))
        .collect();

    if let Err(e) = data
        .metadata
        .replace_parameters(&template_id, &parameters)
        .await
    {
        error!(
            "Failed to replace parameters for template {}: {}",
            template_id, e
        );
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to save parameters"));
    }

    info!(
        "Parameter schema for template {} replaced ({} parameters)",
        template_id,
        parameters.len()
    );
    HttpResponse::Ok().json(parameters)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Template Service",
    get,
    path = "/templates/{id}/parameters",
    responses(
        (status = 200, description = "Ordered parameter schema", body = [TemplateParameter]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the template")
    )
)]
pub async fn get_parameters(
    req: HttpRequest,
    id: Path<Uuid>,
    data: web::Data<AppState>,
) -> impl Responder {
    let template_id = id.into_inner();
    info!(
        "Executing get_parameters handler for template: {}",
        template_id
    );
    let claims = match validate_request_token(&req) {
        Ok(claims) => claims,
        Err(e) => return unauthorized(e),
    };

    match data.metadata.get_template(&template_id).await {
        Ok(Some(template)) if template.owner == claims.sub => {}
        Ok(_) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with ID {} not found",
                template_id
            )));
        }
        Err(e) => {
            error!("Failed to fetch template {}: {}", template_id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"));
        }
    }

    match data.metadata.get_parameters(&template_id).await {
        Ok(parameters) => HttpResponse::Ok().json(parameters),
        Err(e) => {
            error!(
                "Failed to fetch parameters for template {}: {}",
                template_id, e
            );
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve parameters"))
        }
    }
}

fn unauthorized(e: actix_web::Error) -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorResponse::new("Unauthorized", &e.to_string()))
}
