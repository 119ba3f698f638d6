//! Publish units: one object to upload, tagged by what it is.

use std::{fmt, str::FromStr};

use bytes::Bytes;

use crate::{
    ContentAddresser, ContentHash, ShareId,
    keys::document_key,
    store::ObjectMetadata,
};

/// The bytes of a unit plus what is needed to address them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content: Bytes,
    /// File extension without the dot, e.g. `png`, `css`, `html`.
    pub filetype: String,
    pub hash: ContentHash,
}

impl Payload {
    /// Builds a payload, hashing `content` with `addresser`.
    pub fn new(
        content: impl Into<Bytes>,
        filetype: impl Into<String>,
        addresser: &dyn ContentAddresser,
    ) -> Self {
        let content = content.into();
        let hash = addresser.digest(&content);
        Self {
            content,
            filetype: filetype.into().trim_start_matches('.').to_ascii_lowercase(),
            hash,
        }
    }

    pub fn byte_length(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishUnit {
    /// Stylesheet or other theme resource, shared across notes.
    ThemeAsset {
        theme_name: Option<String>,
        payload: Payload,
    },
    /// Image or file embedded in one note.
    NoteAttachment { note_id: ShareId, payload: Payload },
    /// The rendered HTML artifact of one note.
    NoteDocument { share_id: ShareId, payload: Payload },
}

impl PublishUnit {
    pub fn note_document(
        share_id: ShareId,
        html: impl Into<Bytes>,
        addresser: &dyn ContentAddresser,
    ) -> Self {
        Self::NoteDocument {
            share_id,
            payload: Payload::new(html, "html", addresser),
        }
    }

    pub fn kind(&self) -> UnitKind {
        match self {
            Self::ThemeAsset { .. } => UnitKind::ThemeAsset,
            Self::NoteAttachment { .. } => UnitKind::NoteAttachment,
            Self::NoteDocument { .. } => UnitKind::NoteDocument,
        }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            Self::ThemeAsset { payload, .. }
            | Self::NoteAttachment { payload, .. }
            | Self::NoteDocument { payload, .. } => payload,
        }
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        match self {
            Self::ThemeAsset { payload, .. }
            | Self::NoteAttachment { payload, .. }
            | Self::NoteDocument { payload, .. } => payload,
        }
    }

    /// The deterministic object key. Identical key means a previous upload
    /// can be reused.
    pub fn storage_key(&self) -> String {
        match self {
            Self::ThemeAsset {
                theme_name,
                payload,
            } => {
                let stem = match theme_name.as_deref() {
                    Some(name) if !name.is_empty() => name,
                    _ => payload.hash.as_str(),
                };
                format!("assets/{stem}.{}", payload.filetype)
            }
            Self::NoteAttachment { note_id, payload } => {
                format!("notes/{note_id}/attachs/{}.{}", payload.hash, payload.filetype)
            }
            Self::NoteDocument { share_id, .. } => document_key(share_id),
        }
    }

    /// Whether an existing object at the key may stand in for this upload.
    ///
    /// Only content-addressed keys qualify. Documents (keyed by share id) and
    /// named theme assets (keyed by theme name) always overwrite.
    pub fn dedupable(&self) -> bool {
        match self {
            Self::NoteAttachment { .. } => true,
            Self::ThemeAsset { theme_name, .. } => {
                theme_name.as_deref().is_none_or(str::is_empty)
            }
            Self::NoteDocument { .. } => false,
        }
    }

    pub fn content_type(&self) -> String {
        mime_guess::from_ext(&self.payload().filetype)
            .first_or_octet_stream()
            .essence_str()
            .to_owned()
    }

    pub fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata::from([("hash".to_owned(), self.payload().hash.to_string())])
    }
}

/// Discriminant of a [`PublishUnit`], as written in manifests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    ThemeAsset,
    NoteAttachment,
    NoteDocument,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThemeAsset => "theme_asset",
            Self::NoteAttachment => "note_attachment",
            Self::NoteDocument => "note_document",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit description without a valid kind. Programming error: never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed publish unit: {0}")]
pub struct MalformedUnit(pub String);

impl FromStr for UnitKind {
    type Err = MalformedUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "theme_asset" => Ok(Self::ThemeAsset),
            "note_attachment" => Ok(Self::NoteAttachment),
            "note_document" => Ok(Self::NoteDocument),
            other => Err(MalformedUnit(format!("unknown kind {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Blake3Addresser, ContentHash};

    fn payload(filetype: &str) -> Payload {
        Payload {
            content: Bytes::from_static(b"body"),
            filetype: filetype.to_owned(),
            hash: ContentHash::from_hex("abcdef"),
        }
    }

    fn share_id(s: &str) -> ShareId {
        s.parse().unwrap()
    }

    #[test]
    fn key_scheme() {
        let named = PublishUnit::ThemeAsset {
            theme_name: Some("minimal".into()),
            payload: payload("css"),
        };
        assert_eq!(named.storage_key(), "assets/minimal.css");

        let unnamed = PublishUnit::ThemeAsset {
            theme_name: None,
            payload: payload("woff2"),
        };
        assert_eq!(unnamed.storage_key(), "assets/abcdef.woff2");

        let empty_name = PublishUnit::ThemeAsset {
            theme_name: Some(String::new()),
            payload: payload("css"),
        };
        assert_eq!(empty_name.storage_key(), "assets/abcdef.css");

        let attachment = PublishUnit::NoteAttachment {
            note_id: share_id("n1"),
            payload: payload("png"),
        };
        assert_eq!(attachment.storage_key(), "notes/n1/attachs/abcdef.png");

        let document = PublishUnit::NoteDocument {
            share_id: share_id("n1"),
            payload: payload("html"),
        };
        assert_eq!(document.storage_key(), "notes/n1.html");
    }

    #[test]
    fn identical_bytes_identical_key() {
        let make = || PublishUnit::NoteAttachment {
            note_id: share_id("n1"),
            payload: Payload::new(&b"\x89PNG data"[..], "PNG", &Blake3Addresser),
        };
        assert_eq!(make().storage_key(), make().storage_key());
        assert!(make().storage_key().ends_with(".png"));
    }

    #[test]
    fn documents_are_never_deduped() {
        let document =
            PublishUnit::note_document(share_id("n1"), "<html></html>", &Blake3Addresser);
        assert!(!document.dedupable());
        assert_eq!(document.payload().filetype, "html");
        assert!(
            PublishUnit::NoteAttachment {
                note_id: share_id("n1"),
                payload: payload("png"),
            }
            .dedupable()
        );
    }

    #[test]
    fn named_theme_assets_always_overwrite() {
        let named = PublishUnit::ThemeAsset {
            theme_name: Some("Minimal".to_owned()),
            payload: payload("css"),
        };
        assert_eq!(named.storage_key(), "assets/Minimal.css");
        assert!(!named.dedupable());

        let hashed = PublishUnit::ThemeAsset {
            theme_name: None,
            payload: payload("css"),
        };
        assert_eq!(hashed.storage_key(), "assets/abcdef.css");
        assert!(hashed.dedupable());

        let unnamed = PublishUnit::ThemeAsset {
            theme_name: Some(String::new()),
            payload: payload("css"),
        };
        assert!(unnamed.dedupable());
    }

    #[test]
    fn content_type_and_metadata() {
        let document = PublishUnit::NoteDocument {
            share_id: share_id("n1"),
            payload: payload("html"),
        };
        assert_eq!(document.content_type(), "text/html");
        assert_eq!(document.metadata().get("hash").map(String::as_str), Some("abcdef"));

        let unknown = PublishUnit::ThemeAsset {
            theme_name: None,
            payload: payload("nope-ext"),
        };
        assert_eq!(unknown.content_type(), "application/octet-stream");
    }

    #[test]
    fn unknown_kind_is_malformed() {
        assert_eq!("theme_asset".parse::<UnitKind>(), Ok(UnitKind::ThemeAsset));
        assert_eq!("note_attachment".parse::<UnitKind>(), Ok(UnitKind::NoteAttachment));
        let err = "attachment".parse::<UnitKind>().unwrap_err();
        assert!(err.to_string().contains("unknown kind"));
    }
}
