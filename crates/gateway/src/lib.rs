pub mod client;
pub mod error;
pub mod store;
pub mod uploads;

pub use client::{Gateway, NewAccount};
pub use error::GatewayError;
pub use store::{
    progress_sink, silent_progress, CloudStore, InMemoryObjectStore, ObjectStore, ProgressFn,
    StoredFile, TransferError,
};
pub use uploads::{BatchError, BatchProgressFn, DocumentGateway, DocumentUploader, UploadError};
