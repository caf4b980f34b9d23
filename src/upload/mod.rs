//! Multi-file upload pipeline: per-file tracking, aggregate progress,
//! partial-failure reporting and caller-driven retry.

pub mod pipeline;
pub mod session;
pub mod sink;

use std::path::{Path, PathBuf};

use crate::models::evidence::ClientToken;

pub use pipeline::{UploadOutcome, UploadPipeline};
pub use session::{ByteProgress, UploadSession};
pub use sink::{MemorySink, SinkError, SinkObject, SupabaseStorageSink, UploadSink};

/// Hard ceiling on files in one session.
pub const MAX_FILES_PER_SESSION: usize = 10;

pub const MEGABYTE: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A file on the caller's side, not yet uploaded.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
    /// Supplied when the caller retries a file it already tried once.
    pub client_token: Option<ClientToken>,
}

impl LocalFile {
    pub fn in_memory(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
            client_token: None,
        }
    }

    pub fn on_disk(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        path: impl AsRef<Path>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            source: FileSource::Path(path.as_ref().to_path_buf()),
            client_token: None,
        }
    }

    pub fn with_token(mut self, token: ClientToken) -> Self {
        self.client_token = Some(token);
        self
    }
}

impl FileSource {
    pub(crate) async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

/// Per-caller limits. The size cap is always explicit: offer attachments
/// and milestone evidence use very different ceilings.
#[derive(Debug, Clone)]
pub struct UploadConstraints {
    pub max_files: usize,
    pub max_file_bytes: u64,
    /// MIME types (`image/png`), MIME families (`video/*`) or file
    /// extensions (`.pdf`).
    pub allowed_types: Vec<String>,
}

impl UploadConstraints {
    pub fn new(max_file_bytes: u64) -> Self {
        Self {
            max_files: MAX_FILES_PER_SESSION,
            max_file_bytes,
            allowed_types: vec![
                "image/*".to_string(),
                "video/*".to_string(),
                "application/pdf".to_string(),
            ],
        }
    }

    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Reason the file at `index` is refused, if it is.
    pub fn rejection(&self, index: usize, file: &LocalFile) -> Option<String> {
        let max_files = self.max_files.min(MAX_FILES_PER_SESSION);
        if index >= max_files {
            return Some(format!("at most {max_files} files per upload"));
        }
        if file.size_bytes > self.max_file_bytes {
            return Some(format!(
                "{} is {} bytes, limit is {} bytes",
                file.file_name, file.size_bytes, self.max_file_bytes
            ));
        }
        if !self.allows(&file.mime_type, &file.file_name) {
            return Some(format!(
                "{} has unsupported type {}",
                file.file_name, file.mime_type
            ));
        }
        None
    }

    fn allows(&self, mime_type: &str, file_name: &str) -> bool {
        let mime_type = mime_type.to_ascii_lowercase();
        let file_name = file_name.to_ascii_lowercase();

        self.allowed_types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            if allowed.starts_with('.') {
                file_name.ends_with(&allowed)
            } else if let Some(family) = allowed.strip_suffix("/*") {
                mime_type
                    .split_once('/')
                    .is_some_and(|(prefix, _)| prefix == family)
            } else {
                mime_type == allowed
            }
        })
    }
}
