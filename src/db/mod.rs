//! Application state and store wiring.
//!
//! `AppState` holds the collaborators every handler needs: the metadata
//! store, the object store and a per-principal template listing cache. Both
//! stores sit behind traits so integration tests can run against in-memory
//! implementations.

mod metadata;

pub use metadata::{MetadataStore, PgMetadataStore};

use moka::future::Cache;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{ObjectStorage, SupabaseConfig, SupabaseStorage};
use crate::template::models::TemplateRecord;

#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn MetadataStore + Send + Sync>,
    pub storage: Arc<dyn ObjectStorage + Send + Sync>,
    pub template_cache: Cache<String, Vec<TemplateRecord>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let supabase_config = SupabaseConfig::from_env()?;
        Self::new_with_config(supabase_config).await
    }

    pub async fn new_with_config(
        supabase_config: SupabaseConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let database_url =
            env::var("SUPABASE_DATABASE_URL").map_err(|_| "SUPABASE_DATABASE_URL must be set")?;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(100)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&database_url)
            .await?;

        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent("docmerge-server/0.3")
            .build()
            .expect("Failed to create reqwest client");

        let metadata = PgMetadataStore::new(pool);
        metadata.bootstrap().await?;

        let storage = Arc::new(SupabaseStorage::new(supabase_config, http_client.clone()));

        Ok(Self::assemble(Arc::new(metadata), storage, http_client))
    }

    /// Wire the state from pre-built stores. Used by tests.
    pub fn new_with_stores(
        metadata: Arc<dyn MetadataStore + Send + Sync>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent("docmerge-server/0.3")
            .build()
            .expect("Failed to create reqwest client");
        Self::assemble(metadata, storage, http_client)
    }

    fn assemble(
        metadata: Arc<dyn MetadataStore + Send + Sync>,
        storage: Arc<dyn ObjectStorage + Send + Sync>,
        http_client: reqwest::Client,
    ) -> Self {
        let template_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(100)
            .build();

        AppState {
            metadata,
            storage,
            template_cache,
            http_client,
        }
    }
}
