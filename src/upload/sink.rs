use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::session::ByteProgress;
use crate::models::evidence::ClientToken;

const CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Storage request failed: {0}")]
    Transport(String),

    #[error("Storage rejected the upload (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Cannot read local file: {0}")]
    Io(#[from] std::io::Error),
}

/// One object to store, addressed by its client token.
#[derive(Debug, Clone, Copy)]
pub struct SinkObject<'a> {
    pub client_token: ClientToken,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

impl SinkObject<'_> {
    /// Storage key: the token namespaces the name so retries land on the
    /// same object.
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.client_token, sanitize_file_name(self.file_name))
    }
}

/// Durable storage for uploaded bytes. Implementations must be idempotent
/// on the client token: storing the same token twice yields the same URL
/// and no second object.
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn put(
        &self,
        object: SinkObject<'_>,
        progress: &ByteProgress,
    ) -> Result<String, SinkError>;
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Supabase Storage over its REST API.
#[derive(Clone)]
pub struct SupabaseStorageSink {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorageSink {
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

#[async_trait]
impl UploadSink for SupabaseStorageSink {
    async fn put(
        &self,
        object: SinkObject<'_>,
        progress: &ByteProgress,
    ) -> Result<String, SinkError> {
        let path = object.object_path();
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);
        debug!("Uploading {} ({} bytes) to {url}", object.file_name, object.bytes.len());

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("content-type", object.mime_type)
            .header("x-upsert", "false")
            .body(object.bytes.to_vec())
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        // 409 means an earlier attempt with this token already landed.
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            progress.report(object.bytes.len() as u64);
            return Ok(self.public_url(&path));
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Process-local sink for development and tests.
#[derive(Default)]
pub struct MemorySink {
    objects: RwLock<HashMap<ClientToken, (String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl UploadSink for MemorySink {
    async fn put(
        &self,
        object: SinkObject<'_>,
        progress: &ByteProgress,
    ) -> Result<String, SinkError> {
        if let Some((url, _)) = self.objects.read().await.get(&object.client_token) {
            progress.report(object.bytes.len() as u64);
            return Ok(url.clone());
        }

        let mut sent = 0usize;
        for chunk in object.bytes.chunks(CHUNK_BYTES) {
            sent += chunk.len();
            progress.report(sent as u64);
            tokio::task::yield_now().await;
        }

        let url = format!("memory://{}", object.object_path());
        self.objects
            .write()
            .await
            .entry(object.client_token)
            .or_insert_with(|| (url.clone(), object.bytes.to_vec()));
        Ok(url)
    }
}
