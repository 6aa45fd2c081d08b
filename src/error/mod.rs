use crate::ingest::IngestError;
use crate::presentation::PresentationError;
use crate::store::StoreError;
use crate::theme::ThemeError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Presentation(#[from] PresentationError),
    #[error("an image upload is still in progress")]
    UploadInProgress,
    #[error("image worker stopped before returning a result")]
    WorkerDisconnected,
    #[error("invalid arguments: {0}")]
    Usage(String),
}

impl AppError {
    /// Whether the in-memory state moved and only persistence failed.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Theme(ThemeError::Store(_))
                | Self::Presentation(PresentationError::StorageWriteFailed(_))
        )
    }
}
