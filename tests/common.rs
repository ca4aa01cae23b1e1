//! Shared test doubles: in-memory object storage and metadata store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use docmerge_server::db::MetadataStore;
use docmerge_server::generation::models::{GenerationRecord, GenerationStatus};
use docmerge_server::storage::ObjectStorage;
use docmerge_server::template::models::{TemplateParameter, TemplateRecord};

/// In-memory object storage with call counters, so tests can assert that no
/// storage calls happen on early failures.
pub struct MockObjectStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub signs: AtomicUsize,
    /// Artificial latency per call, for cancellation tests.
    pub delay_ms: u64,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
            delay_ms: 0,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub async fn seed_file(&self, key: &str, data: &[u8]) {
        let mut files = self.files.lock().await;
        files.insert(key.to_string(), data.to_vec());
    }

    pub async fn has_file(&self, key: &str) -> bool {
        let files = self.files.lock().await;
        files.contains_key(key)
    }

    pub async fn file_contents(&self, key: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(key).cloned()
    }

    pub fn total_calls(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
            + self.uploads.load(Ordering::SeqCst)
            + self.signs.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<(), String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut files = self.files.lock().await;
        files.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn download_file(&self, key: &str) -> Result<Vec<u8>, String> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let files = self.files.lock().await;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| format!("object '{}' not available (404)", key))
    }

    async fn delete_file(&self, key: &str) -> Result<(), String> {
        let mut files = self.files.lock().await;
        files.remove(key);
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, expires_in_secs: u64) -> Result<String, String> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let files = self.files.lock().await;
        if !files.contains_key(key) {
            return Err(format!("object '{}' not available (404)", key));
        }
        Ok(format!("mock://signed/{}?ttl={}", key, expires_in_secs))
    }
}

/// In-memory metadata store.
pub struct MemoryMetadataStore {
    templates: Arc<Mutex<HashMap<Uuid, TemplateRecord>>>,
    parameters: Arc<Mutex<HashMap<Uuid, Vec<TemplateParameter>>>>,
    generations: Arc<Mutex<HashMap<Uuid, GenerationRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(Mutex::new(HashMap::new())),
            parameters: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn seed_template(&self, template: TemplateRecord) {
        let mut templates = self.templates.lock().await;
        templates.insert(template.id, template);
    }

    pub async fn seed_parameters(&self, template_id: Uuid, parameters: Vec<TemplateParameter>) {
        let mut all = self.parameters.lock().await;
        all.insert(template_id, parameters);
    }

    pub async fn all_generations(&self) -> Vec<GenerationRecord> {
        let generations = self.generations.lock().await;
        generations.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_template(&self, template: &TemplateRecord) -> Result<(), String> {
        let mut templates = self.templates.lock().await;
        templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn get_template(&self, id: &Uuid) -> Result<Option<TemplateRecord>, String> {
        let templates = self.templates.lock().await;
        Ok(templates.get(id).cloned())
    }

    async fn list_templates(&self, owner: &str) -> Result<Vec<TemplateRecord>, String> {
        let templates = self.templates.lock().await;
        Ok(templates
            .values()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }

    async fn replace_parameters(
        &self,
        template_id: &Uuid,
        parameters: &[TemplateParameter],
    ) -> Result<(), String> {
        let mut all = self.parameters.lock().await;
        all.insert(*template_id, parameters.to_vec());
        Ok(())
    }

    async fn get_parameters(&self, template_id: &Uuid) -> Result<Vec<TemplateParameter>, String> {
        let all = self.parameters.lock().await;
        Ok(all.get(template_id).cloned().unwrap_or_default())
    }

    async fn insert_generation(&self, generation: &GenerationRecord) -> Result<(), String> {
        let mut generations = self.generations.lock().await;
        generations.insert(generation.id, generation.clone());
        Ok(())
    }

    async fn get_generation(&self, id: &Uuid) -> Result<Option<GenerationRecord>, String> {
        let generations = self.generations.lock().await;
        Ok(generations.get(id).cloned())
    }

    async fn mark_generation_failed(&self, id: &Uuid, reason: &str) -> Result<(), String> {
        let mut generations = self.generations.lock().await;
        if let Some(generation) = generations.get_mut(id) {
            generation.status = GenerationStatus::Failed;
            generation.failure_reason = Some(reason.to_string());
            generation.completed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn finalize_generation(&self, id: &Uuid, result_key: &str) -> Result<(), String> {
        let mut generations = self.generations.lock().await;
        if let Some(generation) = generations.get_mut(id) {
            if generation.result_key.is_none() {
                generation.status = GenerationStatus::Completed;
                generation.result_key = Some(result_key.to_string());
                generation.completed_at = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }
}
