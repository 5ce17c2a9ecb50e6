//! External object-store transfer (phase one of the two-phase upload).
//!
//! Bytes go to the store first; only the resulting URL ever reaches the
//! backend. The store is behind a trait so the upload orchestration and its
//! tests can run without a network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use payflow_core::config::StorageSettings;

/// Fractional transfer progress callback, 0–100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

pub fn progress_sink<F>(f: F) -> ProgressFn
where
    F: Fn(u8) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn silent_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// A file staged for upload: name, declared content type, raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StoredFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), content_type: content_type.into(), bytes }
    }

    /// Read a file from disk, inferring the content type from its extension.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let content_type = content_type_for(&name);
        Ok(Self { name, content_type: content_type.to_string(), bytes })
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("storage transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("object store rejected the upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("object store response carried no file URL")]
    MissingUrl,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Transfer a file, reporting progress, and return its stable URL.
    async fn put(&self, file: StoredFile, progress: ProgressFn) -> Result<String, TransferError>;
}

/// Unsigned-preset upload to the configured external store.
#[derive(Clone, Debug)]
pub struct CloudStore {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct StoreResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

impl CloudStore {
    pub fn new(settings: &StorageSettings) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            upload_url: settings.upload_url(),
            upload_preset: settings.upload_preset.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for CloudStore {
    async fn put(&self, file: StoredFile, progress: ProgressFn) -> Result<String, TransferError> {
        let total = file.bytes.len();
        let chunks: Vec<Vec<u8>> =
            file.bytes.chunks(UPLOAD_CHUNK_BYTES).map(|chunk| chunk.to_vec()).collect();

        progress(0);
        let mut sent = 0usize;
        let tick = progress.clone();
        let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks.into_iter().map(
            move |chunk| {
                sent += chunk.len();
                let pct = ((sent * 100) / total.max(1)).min(100) as u8;
                tick(pct);
                Ok::<_, std::io::Error>(chunk)
            },
        )));

        let part = reqwest::multipart::Part::stream_with_length(body, total as u64)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self.http.post(&self.upload_url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let raw = response.text().await?;

        if !(200..300).contains(&status) {
            let mut message = raw;
            message.truncate(200);
            tracing::warn!(
                event_name = "store.upload.rejected",
                status,
                file_name = %file.name,
                "object store rejected the upload"
            );
            return Err(TransferError::Rejected { status, message });
        }

        let decoded: StoreResponse =
            serde_json::from_str(&raw).map_err(|_| TransferError::MissingUrl)?;
        let url = decoded.secure_url.or(decoded.url).ok_or(TransferError::MissingUrl)?;

        progress(100);
        tracing::info!(
            event_name = "store.upload.completed",
            file_name = %file.name,
            bytes = total,
            "file transferred to object store"
        );
        Ok(url)
    }
}

/// In-process store for tests and offline runs.
#[derive(Clone, Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        match self.objects.lock() {
            Ok(objects) => objects.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }

    pub fn len(&self) -> usize {
        match self.objects.lock() {
            Ok(objects) => objects.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, file: StoredFile, progress: ProgressFn) -> Result<String, TransferError> {
        progress(0);
        let url = format!("memory://payflow/{}", file.name);
        match self.objects.lock() {
            Ok(mut objects) => objects.insert(file.name, file.bytes),
            Err(poisoned) => poisoned.into_inner().insert(file.name, file.bytes),
        };
        progress(100);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{content_type_for, progress_sink, InMemoryObjectStore, ObjectStore, StoredFile};

    #[test]
    fn content_type_follows_the_extension() {
        assert_eq!(content_type_for("invoice.PDF"), "application/pdf");
        assert_eq!(content_type_for("scan.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn in_memory_store_returns_a_stable_url_and_reports_completion() {
        let store = InMemoryObjectStore::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            progress_sink(move |pct| seen.lock().unwrap().push(pct))
        };

        let url = store
            .put(StoredFile::new("receipt.pdf", "application/pdf", vec![1, 2, 3]), sink)
            .await
            .expect("put should succeed");

        assert_eq!(url, "memory://payflow/receipt.pdf");
        assert_eq!(store.object("receipt.pdf"), Some(vec![1, 2, 3]));
        assert_eq!(*seen.lock().unwrap(), vec![0, 100]);
    }
}
