use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use sharenote_core::{
    ObjectMetadata, Payload, PublishUnit, ShareId, ShareLink, UnitKind, attachments_prefix,
    document_key,
};
use sharenote_crypto::{DEFAULT_CHUNK_CHARS, DecryptionKey, SharePayload, seal};
use sharenote_template::{DocumentContent, TemplateDescriptor, build};
use url::Url;

use crate::{
    error::{PublishError, Result},
    host::{Host, ShareMetadata, ShareMetadataUpdate, SourceDocument},
    queue::{ItemOutcome, ProgressSink, TracingProgress, UploadBatch, UploadQueue},
    retry::{RetryPolicy, with_retry},
};

/// Object written by [`Publisher::check_connection`].
pub const CONNECTION_TEST_KEY: &str = "TEST";

/// Title shown by encrypted artifacts until the viewer decrypts them.
pub const ENCRYPTED_TITLE: &str = "Shared note";

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this shared note and the shared link? This will not delete your local note.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Share in plaintext unless a note asks for encryption.
    pub share_unencrypted: bool,
    pub chunk_chars: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            share_unencrypted: false,
            chunk_chars: DEFAULT_CHUNK_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Re-upload assets and attachments even when already stored.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub share_id: ShareId,
    /// The link to hand out, including the key fragment when encrypted.
    pub link: String,
    pub document_url: Url,
    pub encrypted: bool,
    /// False when some asset or attachment failed; the document was still
    /// published, with those references left unresolved.
    pub assets_complete: bool,
}

type Resolved = Arc<Mutex<HashMap<String, Url>>>;

/// Drives the publish and unpublish flows against a [`Host`].
pub struct Publisher {
    queue: UploadQueue,
    config: PublishConfig,
    progress: Arc<dyn ProgressSink>,
}

impl Publisher {
    pub fn new(queue: UploadQueue, config: PublishConfig) -> Self {
        Self {
            queue,
            config,
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    /// Plaintext only when configured or requested per note, and never
    /// when the note asks for encryption.
    pub fn should_encrypt(&self, metadata: &ShareMetadata) -> bool {
        let mut encrypt = !self.config.share_unencrypted;
        if metadata.unencrypted {
            encrypt = false;
        }
        if metadata.encrypted {
            encrypt = true;
        }
        encrypt
    }

    pub async fn publish(
        &self,
        host: &dyn Host,
        options: PublishOptions,
    ) -> Result<PublishOutcome> {
        let doc = host
            .active_document()
            .await?
            .ok_or(PublishError::NoActiveDocument)?;
        let metadata = host.read_share_metadata(&doc).await?;
        let encrypted = self.should_encrypt(&metadata);

        let existing = metadata.link.as_deref().and_then(ShareLink::parse);
        let share_id = metadata
            .share_id
            .clone()
            .or_else(|| existing.as_ref().map(|link| link.share_id.clone()))
            .unwrap_or_else(ShareId::generate);
        let key = encrypted.then(|| reuse_or_generate_key(existing.as_ref()));
        tracing::info!(
            "publishing {} as {share_id} ({})",
            doc.id,
            if encrypted { "encrypted" } else { "plaintext" }
        );

        // Validate every file before anything is uploaded.
        for file in &doc.files {
            if file.kind == UnitKind::NoteDocument {
                return Err(sharenote_core::MalformedUnit(format!(
                    "{} cannot be uploaded as {}",
                    file.reference, file.kind
                ))
                .into());
            }
        }

        let resolved: Resolved = Arc::default();
        let mut assets_complete = true;

        let (theme_batch, theme_url) = self.theme_batch(&doc, &resolved, options).await;
        if !theme_batch.is_empty() {
            let outcome = self
                .queue
                .drain(theme_batch, self.progress.as_ref(), "theme asset")
                .await;
            assets_complete &= outcome.success;
        }

        let attachment_batch = self
            .attachment_batch(&doc, &share_id, &resolved, options)
            .await;
        if !attachment_batch.is_empty() {
            let outcome = self
                .queue
                .drain(attachment_batch, self.progress.as_ref(), "attachment")
                .await;
            assets_complete &= outcome.success;
        }
        if !assets_complete {
            tracing::warn!("some assets of {} failed to upload; publishing anyway", doc.id);
        }

        let resolved = snapshot(&resolved);
        let theme_css = snapshot(&theme_url);
        let body = rewrite_references(&doc, &resolved);

        let (title, description, content) = match &key {
            Some(key) => {
                let payload = SharePayload {
                    content: body,
                    basename: doc.title.clone(),
                };
                let envelope = seal(&payload, key, None, self.config.chunk_chars)?;
                (
                    ENCRYPTED_TITLE.to_owned(),
                    String::new(),
                    DocumentContent::Encrypted(envelope),
                )
            }
            None => (
                doc.title.clone(),
                doc.description.clone(),
                DocumentContent::Plain(body),
            ),
        };
        let descriptor = TemplateDescriptor {
            id: share_id.to_string(),
            title,
            description,
            width: doc.width.clone(),
            elements: doc.elements.clone(),
            content,
            math: doc.math,
            theme_css: theme_css.map(String::from),
        };
        let html = build(&descriptor)?;

        let unit = PublishUnit::note_document(share_id.clone(), html, self.queue.addresser());
        let document_url = self.queue.upload(&unit).await?;

        let link = ShareLink::new(share_id.clone(), key.as_ref().map(DecryptionKey::to_fragment))
            .to_url(self.queue.public_base_url());
        host.write_share_metadata(
            &doc,
            ShareMetadataUpdate::Published {
                share_id: share_id.clone(),
                link: link.clone(),
                updated: chrono::Utc::now(),
            },
        )
        .await?;
        tracing::info!("published {} at {document_url}", doc.id);

        Ok(PublishOutcome {
            share_id,
            link,
            document_url,
            encrypted,
            assets_complete,
        })
    }

    /// Deletes the shared copy of the active document.
    ///
    /// Attachments go first, then the document. Returns `false` when the
    /// user declined.
    pub async fn unpublish(&self, host: &dyn Host) -> Result<bool> {
        let doc = host
            .active_document()
            .await?
            .ok_or(PublishError::NoActiveDocument)?;
        let metadata = host.read_share_metadata(&doc).await?;
        let share_id = metadata
            .share_id
            .clone()
            .or_else(|| {
                metadata
                    .link
                    .as_deref()
                    .and_then(ShareLink::parse)
                    .map(|link| link.share_id)
            })
            .ok_or(PublishError::NotShared)?;

        if !host.confirm(DELETE_PROMPT).await? {
            tracing::info!("deletion of {share_id} cancelled");
            return Ok(false);
        }

        let backend = self.queue.backend().as_ref();
        let policy = self.queue.retry_policy();
        let prefix = attachments_prefix(&share_id);
        let prefix = prefix.as_str();
        with_retry(policy, prefix, move || backend.delete_directory(prefix)).await?;
        let key = document_key(&share_id);
        let key = key.as_str();
        with_retry(policy, key, move || backend.delete(key)).await?;

        host.write_share_metadata(&doc, ShareMetadataUpdate::Cleared)
            .await?;
        tracing::info!("deleted shared note {share_id}");
        Ok(true)
    }

    /// Writes a small test object to verify credentials and reachability.
    pub async fn check_connection(&self) -> Result<()> {
        let backend = self.queue.backend().as_ref();
        let metadata = ObjectMetadata::from([("hash".to_owned(), "TEST".to_owned())]);
        let metadata = &metadata;
        with_retry(RetryPolicy::BEST_EFFORT, CONNECTION_TEST_KEY, move || {
            backend.put(
                CONNECTION_TEST_KEY,
                Bytes::from_static(b"TEST"),
                "text/plain",
                metadata,
            )
        })
        .await?;
        Ok(())
    }

    async fn theme_batch(
        &self,
        doc: &SourceDocument,
        resolved: &Resolved,
        options: PublishOptions,
    ) -> (UploadBatch, Arc<Mutex<Option<Url>>>) {
        let mut batch = new_batch(options);
        let theme_url: Arc<Mutex<Option<Url>>> = Arc::default();

        if let Some(theme) = &doc.theme {
            let unit = PublishUnit::ThemeAsset {
                theme_name: Some(theme.name.clone()),
                payload: Payload::new(theme.css.clone(), "css", self.queue.addresser()),
            };
            let slot = theme_url.clone();
            self.queue
                .enqueue(&mut batch, unit, move |outcome| {
                    if let (Some(url), Ok(mut slot)) = (outcome.url(), slot.lock()) {
                        *slot = Some(url.clone());
                    }
                })
                .await;
        }

        for file in doc.files.iter().filter(|f| f.kind == UnitKind::ThemeAsset) {
            let unit = PublishUnit::ThemeAsset {
                theme_name: None,
                payload: Payload::new(
                    file.content.clone(),
                    file.filetype.as_str(),
                    self.queue.addresser(),
                ),
            };
            self.queue
                .enqueue(&mut batch, unit, record_url(resolved, &file.reference))
                .await;
        }
        (batch, theme_url)
    }

    async fn attachment_batch(
        &self,
        doc: &SourceDocument,
        share_id: &ShareId,
        resolved: &Resolved,
        options: PublishOptions,
    ) -> UploadBatch {
        let mut batch = new_batch(options);
        for file in doc
            .files
            .iter()
            .filter(|f| f.kind == UnitKind::NoteAttachment)
        {
            let unit = PublishUnit::NoteAttachment {
                note_id: share_id.clone(),
                payload: Payload::new(
                    file.content.clone(),
                    file.filetype.as_str(),
                    self.queue.addresser(),
                ),
            };
            self.queue
                .enqueue(&mut batch, unit, record_url(resolved, &file.reference))
                .await;
        }
        batch
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn new_batch(options: PublishOptions) -> UploadBatch {
    if options.force {
        UploadBatch::new().force()
    } else {
        UploadBatch::new()
    }
}

fn snapshot<T: Clone>(shared: &Mutex<T>) -> T {
    match shared.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn record_url(resolved: &Resolved, reference: &str) -> impl FnOnce(&ItemOutcome) + Send + 'static {
    let resolved = resolved.clone();
    let reference = reference.to_owned();
    move |outcome| {
        if let (Some(url), Ok(mut map)) = (outcome.url(), resolved.lock()) {
            map.insert(reference, url.clone());
        }
    }
}

/// A previously shared key keeps old links working across re-shares.
fn reuse_or_generate_key(existing: Option<&ShareLink>) -> DecryptionKey {
    let Some(fragment) = existing.and_then(|link| link.decryption_key.as_deref()) else {
        return DecryptionKey::generate();
    };
    DecryptionKey::from_fragment(fragment).unwrap_or_else(|e| {
        tracing::warn!("existing share link has an unusable key ({e}); generating a new one");
        DecryptionKey::generate()
    })
}

/// Joins the sections and points every resolved reference at its URL.
///
/// Unresolved references are left as they are.
/// Replaces every resolved reference in one pass over the body. Longer
/// references win where several match at the same position, and inserted
/// URLs are never scanned again.
fn rewrite_references(doc: &SourceDocument, resolved: &HashMap<String, Url>) -> String {
    let body = doc.sections.concat();
    let mut replacements: Vec<(&str, &str)> = doc
        .files
        .iter()
        .filter(|file| !file.reference.is_empty())
        .filter_map(|file| {
            resolved
                .get(&file.reference)
                .map(|url| (file.reference.as_str(), url.as_str()))
        })
        .collect();
    if replacements.is_empty() {
        return body;
    }
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(body.len());
    let mut rest = body.as_str();
    while let Some(ch) = rest.chars().next() {
        match replacements
            .iter()
            .find(|(reference, _)| rest.starts_with(reference))
        {
            Some((reference, url)) => {
                out.push_str(url);
                rest = &rest[reference.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}
