use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod db;
pub mod engine;
pub mod generation;
pub mod storage;
pub mod template;

pub use crate::db::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::template::handlers::upload_template,
            crate::template::handlers::list_templates,
            crate::template::handlers::get_template,
            crate::template::handlers::define_parameters,
            crate::template::handlers::get_parameters,
            crate::generation::handlers::generate_document,
            crate::generation::handlers::get_generation
        ),
        components(
            schemas(
                template::models::TemplateRecord,
                template::models::TemplateParameter,
                template::models::ParameterDefinition,
                template::models::ParameterType,
                template::models::DocumentFormat,
                template::handlers::UploadTemplateRequest,
                generation::models::GenerateRequest,
                generation::models::GenerateResponse,
                generation::models::GenerationRecord,
                generation::models::GenerationStatus,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Template Service", description = "Template upload and parameter schema endpoints."),
            (name = "Generation Service", description = "Document generation endpoints.")
        ),
        servers(
            (url = "http://127.0.0.1:8080", description = "Localhost Staging server")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok(); // Load .env file
    let app_state = match AppState::new().await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to initialise application state. Check SUPABASE_DATABASE_URL and SUPABASE_URL in .env and ensure the collaborators are reachable. Error: {}", e);
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("docmerge_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
                web::scope("/api")
                    .service(
                        web::resource("/templates")
                            .route(web::get().to(template::handlers::list_templates))
                            .route(web::post().to(template::handlers::upload_template)),
                    )
                    .service(
                        web::resource("/templates/{id}")
                            .route(web::get().to(template::handlers::get_template)),
                    )
                    .service(
                        web::resource("/templates/{id}/parameters")
                            .route(web::get().to(template::handlers::get_parameters))
                            .route(web::put().to(template::handlers::define_parameters)),
                    )
                    .service(
                        web::resource("/templates/{id}/generate")
                            .route(web::post().to(generation::handlers::generate_document)),
                    )
                    .service(
                        web::resource("/generations/{id}")
                            .route(web::get().to(generation::handlers::get_generation)),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .max_connections(25000)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
