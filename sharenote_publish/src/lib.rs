//! Publishing shared notes to an object store.
//!
//! The [`UploadQueue`] moves [`PublishUnit`](sharenote_core::PublishUnit)s
//! into a [`StorageBackend`](sharenote_core::StorageBackend): it skips
//! content that is already stored, retries transient failures with a fixed
//! delay and settles every unit of a batch concurrently. The [`Publisher`]
//! builds on it to share, re-share and delete the active document of a
//! [`Host`].

mod error;
mod host;
mod publisher;
mod queue;
mod retry;
mod transform;

pub use error::{PublishError, Result};
pub use host::{Host, ShareMetadata, ShareMetadataUpdate, SourceDocument, SourceFile, ThemeSource};
pub use publisher::{
    CONNECTION_TEST_KEY, DELETE_PROMPT, ENCRYPTED_TITLE, PublishConfig, PublishOptions,
    PublishOutcome, Publisher,
};
pub use queue::{
    BatchOutcome, ItemOutcome, ProgressSink, TracingProgress, UploadBatch, UploadQueue,
};
pub use retry::{RetryPolicy, with_retry};
pub use transform::{ContentTransform, Passthrough, Transformed};
