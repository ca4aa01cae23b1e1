//! Object store collaborator.
//!
//! Raw bytes live in a Supabase Storage bucket, reached over its REST API.
//! Handlers and the pipeline only see the `ObjectStorage` trait so tests can
//! swap in an in-memory implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::env;

/// Connection settings for the Supabase Storage API.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub bucket_name: String,
}

impl SupabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let supabase_url = env::var("SUPABASE_URL")
            .map_err(|_| anyhow::anyhow!("SUPABASE_URL must be set"))?;
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| anyhow::anyhow!("SUPABASE_ANON_KEY must be set"))?;
        let bucket_name =
            env::var("BUCKET_NAME").unwrap_or_else(|_| "docmerge-documents".to_string());

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            bucket_name,
        })
    }
}

/// Storage operations the service depends on.
#[async_trait]
pub trait ObjectStorage {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<(), String>;
    async fn download_file(&self, key: &str) -> Result<Vec<u8>, String>;
    async fn delete_file(&self, key: &str) -> Result<(), String>;
    /// Time-limited retrieval URL for a stored object.
    async fn create_signed_url(&self, key: &str, expires_in_secs: u64) -> Result<String, String>;
}

/// Supabase Storage backed implementation.
pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.supabase_url, self.config.bucket_name, key
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<(), String> {
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string();

        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.config.supabase_anon_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| format!("upload request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("upload rejected ({}): {}", status, body));
        }
        Ok(())
    }

    async fn download_file(&self, key: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.config.supabase_anon_key)
            .send()
            .await
            .map_err(|e| format!("download request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("object '{}' not available ({})", key, response.status()));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| format!("failed to read object body: {}", e))
    }

    async fn delete_file(&self, key: &str) -> Result<(), String> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&self.config.supabase_anon_key)
            .send()
            .await
            .map_err(|e| format!("delete request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("delete rejected ({})", response.status()));
        }
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, expires_in_secs: u64) -> Result<String, String> {
        let sign_url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.supabase_url, self.config.bucket_name, key
        );

        let response = self
            .client
            .post(sign_url)
            .bearer_auth(&self.config.supabase_anon_key)
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }))
            .send()
            .await
            .map_err(|e| format!("sign request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("sign rejected ({})", response.status()));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse sign response: {}", e))?;

        Ok(format!(
            "{}/storage/v1{}",
            self.config.supabase_url, signed.signed_url
        ))
    }
}
