use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sharenote_core::{ShareId, UnitKind};
use sharenote_template::ElementStyle;

/// A note ready to be shared, as rendered by the host.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    /// Host-side identity of the note, e.g. its path.
    pub id: String,
    pub title: String,
    pub description: String,
    pub width: String,
    /// Rendered HTML sections, in document order.
    pub sections: Vec<String>,
    pub elements: Vec<ElementStyle>,
    pub files: Vec<SourceFile>,
    pub theme: Option<ThemeSource>,
    pub math: bool,
}

/// A file the document body refers to.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub kind: UnitKind,
    /// The text the body uses to refer to the file; replaced by its URL.
    pub reference: String,
    pub filetype: String,
    pub content: Bytes,
}

/// The stylesheet of the host's active theme.
#[derive(Debug, Clone)]
pub struct ThemeSource {
    pub name: String,
    pub css: Bytes,
}

/// Share state the host keeps next to a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<ShareId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    /// Per-note request to share encrypted. Wins over `unencrypted`.
    #[serde(default)]
    pub encrypted: bool,
    /// Per-note request to share in plaintext.
    #[serde(default)]
    pub unencrypted: bool,
}

impl ShareMetadata {
    /// Applies `update`, leaving the per-note overrides untouched.
    pub fn apply(&mut self, update: &ShareMetadataUpdate) {
        match update {
            ShareMetadataUpdate::Published {
                share_id,
                link,
                updated,
            } => {
                self.share_id = Some(share_id.clone());
                self.link = Some(link.clone());
                self.updated = Some(*updated);
            }
            ShareMetadataUpdate::Cleared => {
                self.share_id = None;
                self.link = None;
                self.updated = None;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareMetadataUpdate {
    Published {
        share_id: ShareId,
        link: String,
        updated: DateTime<Utc>,
    },
    /// The share was deleted.
    Cleared,
}

/// The application embedding the publisher.
#[async_trait]
pub trait Host: Send + Sync {
    async fn active_document(&self) -> anyhow::Result<Option<SourceDocument>>;

    async fn read_share_metadata(&self, doc: &SourceDocument) -> anyhow::Result<ShareMetadata>;

    async fn write_share_metadata(
        &self,
        doc: &SourceDocument,
        update: ShareMetadataUpdate,
    ) -> anyhow::Result<()>;

    /// Asks the user to confirm a destructive action.
    async fn confirm(&self, prompt: &str) -> anyhow::Result<bool>;
}
