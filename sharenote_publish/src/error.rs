use sharenote_core::{MalformedUnit, StorageError};
use sharenote_crypto::CryptoError;
use sharenote_template::TemplateError;
use thiserror::Error;

pub type Result<T, E = PublishError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Every attempt failed transiently.
    #[error("storing {key} failed after all retries")]
    TransientStorage {
        key: String,
        #[source]
        source: StorageError,
    },
    /// The backend explicitly refused; no retry was attempted.
    #[error("storage backend rejected {key}: {reason}")]
    PermanentStorage { key: String, reason: String },
    #[error(transparent)]
    MalformedUnit(#[from] MalformedUnit),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("invalid public url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no active document")]
    NoActiveDocument,
    #[error("document has not been shared")]
    NotShared,
    #[error("host error: {0:#}")]
    Host(#[from] anyhow::Error),
}

impl PublishError {
    pub(crate) fn from_storage(key: &str, err: StorageError) -> Self {
        match err {
            StorageError::Rejected { key, reason } => Self::PermanentStorage { key, reason },
            source @ StorageError::Transient(_) => Self::TransientStorage {
                key: key.to_owned(),
                source,
            },
        }
    }
}
