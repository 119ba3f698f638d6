//! Upload queue: content-addressed dedup, bounded retry, concurrent fan-out.
//!
//! Units are collected into an [`UploadBatch`] and settled together by
//! [`UploadQueue::drain`]. Every unit settles on its own: one failure flips
//! the batch's success flag but never cancels or delays its siblings.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::future::join_all;
use sharenote_core::{
    Blake3Addresser, ContentAddresser, Payload, PublishUnit, StorageBackend, UnitKind,
    resolve_public_url,
};
use url::Url;

use crate::{
    error::Result,
    retry::{RetryPolicy, with_retry},
    transform::{ContentTransform, Passthrough},
};

/// How a single unit settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// An object already existed at the unit's key; nothing was transferred.
    Deduped { url: Url },
    Uploaded { url: Url },
    Failed { reason: String },
}

impl ItemOutcome {
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Deduped { url } | Self::Uploaded { url } => Some(url),
            Self::Failed { .. } => None,
        }
    }
}

/// Aggregate result of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// False as soon as any unit failed.
    pub success: bool,
    /// URLs of every settled unit, in enqueue order.
    pub urls: Vec<Url>,
    /// Storage keys of failed units, in enqueue order.
    pub failed: Vec<String>,
}

/// Receives progress while a batch drains.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, label: &str, settled: usize, total: usize);
}

impl ProgressSink for () {
    fn progress(&self, _label: &str, _settled: usize, _total: usize) {}
}

/// Reports progress as `info` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn progress(&self, label: &str, settled: usize, total: usize) {
        tracing::info!("Uploading {label} {settled} of {total}...");
    }
}

type Continuation = Box<dyn FnOnce(&ItemOutcome) + Send>;

struct QueueItem {
    unit: PublishUnit,
    on_done: Continuation,
}

/// Units waiting to be drained together.
///
/// Draining consumes the batch, so a batch settles exactly once.
#[derive(Default)]
pub struct UploadBatch {
    items: Vec<QueueItem>,
    force: bool,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the existence probe and upload every unit.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for UploadBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBatch")
            .field("items", &self.items.len())
            .field("force", &self.force)
            .finish()
    }
}

pub struct UploadQueue {
    backend: Arc<dyn StorageBackend>,
    addresser: Arc<dyn ContentAddresser>,
    transform: Arc<dyn ContentTransform>,
    public_base_url: Url,
    retry: RetryPolicy,
}

impl UploadQueue {
    pub fn new(backend: Arc<dyn StorageBackend>, public_base_url: Url) -> Self {
        Self {
            backend,
            addresser: Arc::new(Blake3Addresser),
            transform: Arc::new(Passthrough),
            public_base_url,
            retry: RetryPolicy::ASSET,
        }
    }

    pub fn with_addresser(mut self, addresser: Arc<dyn ContentAddresser>) -> Self {
        self.addresser = addresser;
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn ContentTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn addresser(&self) -> &dyn ContentAddresser {
        self.addresser.as_ref()
    }

    pub fn public_base_url(&self) -> &Url {
        &self.public_base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Adds `unit` to `batch`; `on_done` runs exactly once when it settles.
    ///
    /// Assets and attachments pass through the content transform first. If
    /// it changes the content, the unit is rehashed and so gets a new key.
    /// A failing transform keeps the original content.
    pub async fn enqueue(
        &self,
        batch: &mut UploadBatch,
        mut unit: PublishUnit,
        on_done: impl FnOnce(&ItemOutcome) + Send + 'static,
    ) {
        if unit.kind() != UnitKind::NoteDocument {
            let payload = unit.payload();
            let transformed = self
                .transform
                .transform(payload.content.clone(), &payload.filetype)
                .await;
            match transformed {
                Ok(t) if t.changed => {
                    tracing::debug!(
                        "transformed {} ({} -> {} bytes)",
                        unit.storage_key(),
                        unit.payload().byte_length(),
                        t.content.len()
                    );
                    *unit.payload_mut() = Payload::new(t.content, t.filetype, self.addresser());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        "content transform failed for {}, uploading original: {e:#}",
                        unit.storage_key()
                    );
                }
            }
        }
        batch.items.push(QueueItem {
            unit,
            on_done: Box::new(on_done),
        });
    }

    /// Settles every unit of `batch` concurrently.
    ///
    /// Resolves once all units have settled, whatever their outcome.
    pub async fn drain(
        &self,
        batch: UploadBatch,
        progress: &dyn ProgressSink,
        label: &str,
    ) -> BatchOutcome {
        let UploadBatch { items, force } = batch;
        let total = items.len();
        let settled = AtomicUsize::new(0);

        let results = join_all(items.into_iter().map(|item| {
            let settled = &settled;
            async move {
                let key = item.unit.storage_key();
                let outcome = match self.settle(&item.unit, force).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!("failed to upload {label} {key}: {e}");
                        ItemOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                let n = settled.fetch_add(1, Ordering::Relaxed) + 1;
                progress.progress(label, n, total);
                (item.on_done)(&outcome);
                (key, outcome)
            }
        }))
        .await;

        let mut batch_outcome = BatchOutcome {
            success: true,
            ..Default::default()
        };
        for (key, outcome) in results {
            match outcome {
                ItemOutcome::Deduped { url } | ItemOutcome::Uploaded { url } => {
                    batch_outcome.urls.push(url)
                }
                ItemOutcome::Failed { .. } => {
                    batch_outcome.success = false;
                    batch_outcome.failed.push(key);
                }
            }
        }
        tracing::debug!(
            "drained {total} {label} units ({} failed)",
            batch_outcome.failed.len()
        );
        batch_outcome
    }

    /// Uploads one unit immediately, without dedup, returning its public URL.
    pub async fn upload(&self, unit: &PublishUnit) -> Result<Url> {
        let key = unit.storage_key();
        let stored = self.put(unit, &key).await?;
        Ok(resolve_public_url(&self.public_base_url, &stored)?)
    }

    async fn settle(&self, unit: &PublishUnit, force: bool) -> Result<ItemOutcome> {
        let key = unit.storage_key();
        if unit.dedupable() && !force {
            match self.backend.probe(&key).await {
                Ok(Some(stored)) => {
                    tracing::debug!("{key} already stored, skipping upload");
                    let url = resolve_public_url(&self.public_base_url, &stored)?;
                    return Ok(ItemOutcome::Deduped { url });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("probe for {key} failed, uploading anyway: {e}"),
            }
        }

        let stored = self.put(unit, &key).await?;
        let url = resolve_public_url(&self.public_base_url, &stored)?;
        tracing::info!(
            "uploaded {key} ({} bytes, {})",
            unit.payload().byte_length(),
            unit.payload().hash.short()
        );
        Ok(ItemOutcome::Uploaded { url })
    }

    async fn put(&self, unit: &PublishUnit, key: &str) -> Result<String> {
        let backend = self.backend.as_ref();
        let content = unit.payload().content.clone();
        let content_type = unit.content_type();
        let content_type = content_type.as_str();
        let metadata = unit.metadata();
        let metadata = &metadata;
        with_retry(self.retry, key, move || {
            backend.put(key, content.clone(), content_type, metadata)
        })
        .await
    }
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("backend", &self.backend)
            .field("public_base_url", &self.public_base_url.as_str())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
