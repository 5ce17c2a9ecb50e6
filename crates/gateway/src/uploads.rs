//! Two-phase document association.
//!
//! Phase one transfers bytes to the object store; phase two hands the resulting
//! URL to the backend. The phases fail distinctly: a transfer failure never
//! reaches the backend, and an association failure leaves an orphaned stored
//! file behind (cleanup is out of band).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use payflow_core::domain::request::{DocumentSlot, PurchaseRequest, RequestId};
use payflow_core::session::Session;

use crate::client::Gateway;
use crate::error::GatewayError;
use crate::store::{ObjectStore, ProgressFn, StoredFile, TransferError};

/// Per-file progress for a batch: (file index, 0–100).
pub type BatchProgressFn = Arc<dyn Fn(usize, u8) + Send + Sync>;

/// The association half of the gateway, separated so upload orchestration can
/// be exercised against an in-memory double.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    async fn associate_slot(
        &self,
        session: &Session,
        id: RequestId,
        slot: DocumentSlot,
        external_url: &str,
    ) -> Result<(), GatewayError>;

    async fn associate_attachments(
        &self,
        session: &Session,
        id: RequestId,
        external_urls: &[String],
    ) -> Result<(), GatewayError>;
}

#[async_trait]
impl DocumentGateway for Gateway {
    async fn associate_slot(
        &self,
        session: &Session,
        id: RequestId,
        slot: DocumentSlot,
        external_url: &str,
    ) -> Result<(), GatewayError> {
        match slot {
            DocumentSlot::Proforma => {
                self.upload_proforma(session, id, external_url).await?;
            }
            DocumentSlot::Receipt => {
                self.submit_receipt(session, id, external_url).await?;
            }
            DocumentSlot::PurchaseOrderFile => {
                return Err(GatewayError::Validation {
                    message: "purchase order files are generated server-side".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn associate_attachments(
        &self,
        session: &Session,
        id: RequestId,
        external_urls: &[String],
    ) -> Result<(), GatewayError> {
        self.upload_attachments(session, id, external_urls).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("slot `{slot}` already holds a document")]
    SlotOccupied { slot: DocumentSlot },
    #[error("slot `{slot}` is not uploaded from the client")]
    UnsupportedSlot { slot: DocumentSlot },
    #[error("file transfer failed: {0}")]
    Transfer(#[source] TransferError),
    #[error("document association failed: {0}")]
    Association(#[source] GatewayError),
}

/// Batch failure, surfacing what succeeded before the error.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("transfer of `{failed}` failed after {} completed transfers: {source}", uploaded.len())]
    Transfer { uploaded: Vec<String>, failed: String, source: TransferError },
    #[error("association of {} transferred files failed: {source}", uploaded.len())]
    Association { uploaded: Vec<String>, source: GatewayError },
}

impl BatchError {
    pub fn uploaded(&self) -> &[String] {
        match self {
            Self::Transfer { uploaded, .. } | Self::Association { uploaded, .. } => uploaded,
        }
    }
}

pub struct DocumentUploader<'a, S, G>
where
    S: ObjectStore + ?Sized,
    G: DocumentGateway + ?Sized,
{
    store: &'a S,
    gateway: &'a G,
}

impl<'a, S, G> DocumentUploader<'a, S, G>
where
    S: ObjectStore + ?Sized,
    G: DocumentGateway + ?Sized,
{
    pub fn new(store: &'a S, gateway: &'a G) -> Self {
        Self { store, gateway }
    }

    /// Transfer one file and associate it with a named slot. The slot must be
    /// empty on the caller's freshly fetched copy; populated slots are
    /// append-once and never overwritten.
    pub async fn attach_slot(
        &self,
        session: &Session,
        request: &PurchaseRequest,
        slot: DocumentSlot,
        file: StoredFile,
        progress: ProgressFn,
    ) -> Result<String, UploadError> {
        if matches!(slot, DocumentSlot::PurchaseOrderFile) {
            return Err(UploadError::UnsupportedSlot { slot });
        }
        if !request.slot_is_empty(slot) {
            return Err(UploadError::SlotOccupied { slot });
        }

        let url = self.store.put(file, progress).await.map_err(UploadError::Transfer)?;
        self.gateway
            .associate_slot(session, request.id, slot, &url)
            .await
            .map_err(UploadError::Association)?;
        Ok(url)
    }

    /// Transfer a batch of attachments in submission order, then associate all
    /// URLs with the backend in a single call. A transfer failure stops the
    /// batch before association; the error reports what had already gone up.
    pub async fn attach_batch(
        &self,
        session: &Session,
        id: RequestId,
        files: Vec<StoredFile>,
        progress: BatchProgressFn,
    ) -> Result<Vec<String>, BatchError> {
        let mut uploaded = Vec::with_capacity(files.len());

        for (index, file) in files.into_iter().enumerate() {
            let name = file.name.clone();
            let per_file: ProgressFn = {
                let progress = progress.clone();
                Arc::new(move |pct| progress(index, pct))
            };

            match self.store.put(file, per_file).await {
                Ok(url) => uploaded.push(url),
                Err(source) => {
                    return Err(BatchError::Transfer { uploaded, failed: name, source });
                }
            }
        }

        if let Err(source) = self.gateway.associate_attachments(session, id, &uploaded).await {
            return Err(BatchError::Association { uploaded, source });
        }
        Ok(uploaded)
    }
}
