//! Deterministic object keys, share ids and share links.
//!
//! | Kind | Key |
//! |---|---|
//! | Theme asset | `assets/{theme_name or content_hash}.{filetype}` |
//! | Note attachment | `notes/{note_id}/attachs/{content_hash}.{filetype}` |
//! | Note document | `notes/{share_id}.html` |
//!
//! The unit-specific keys are built by [`crate::PublishUnit::storage_key`];
//! this module holds the note-level pieces shared with deletion.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

/// Identifier of one shared note: the last path segment of its share link.
///
/// Restricted to `[A-Za-z0-9_]+` so it survives as a path segment and as the
/// `\w+` segment link parsing looks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid share id {0:?}: expected one or more of [A-Za-z0-9_]")]
pub struct InvalidShareId(pub String);

impl ShareId {
    /// Generate a fresh share id (v4 UUID, 32 hex characters).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl FromStr for ShareId {
    type Err = InvalidShareId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.chars().all(is_word_char) {
            return Err(InvalidShareId(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for ShareId {
    type Error = InvalidShareId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShareId> for String {
    fn from(value: ShareId) -> Self {
        value.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of the published HTML document.
pub fn document_key(share_id: &ShareId) -> String {
    format!("notes/{share_id}.html")
}

/// Prefix under which all attachments of a note live.
pub fn attachments_prefix(share_id: &ShareId) -> String {
    format!("notes/{share_id}/attachs")
}

/// Resolve a stored relative key against the public base URL.
///
/// Standard relative resolution: a base without a trailing slash has its
/// last segment replaced, exactly like `new URL(key, base)` in a browser.
pub fn resolve_public_url(base: &Url, key: &str) -> Result<Url, url::ParseError> {
    base.join(key)
}

/// A distributable link to a shared note.
///
/// Format: `{base}/{share_id}#{decryption_key}`. The key only ever lives in
/// the fragment, which browsers never send to the server. No key means the
/// document was published unencrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub share_id: ShareId,
    pub decryption_key: Option<String>,
}

impl ShareLink {
    pub fn new(share_id: ShareId, decryption_key: Option<String>) -> Self {
        Self {
            share_id,
            decryption_key: decryption_key.filter(|key| !key.is_empty()),
        }
    }

    pub fn to_url(&self, base: &Url) -> String {
        let base = base.as_str().trim_end_matches('/');
        match &self.decryption_key {
            Some(key) => format!("{base}/{}#{key}", self.share_id),
            None => format!("{base}/{}", self.share_id),
        }
    }

    /// Parse an existing link: the trailing word segment is the share id,
    /// anything after `#` is the key.
    pub fn parse(link: &str) -> Option<Self> {
        let (path, fragment) = match link.split_once('#') {
            Some((path, fragment)) => (path, fragment),
            None => (link, ""),
        };
        let id_start = path
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map(|(idx, _)| idx)?;
        let share_id = path[id_start..].parse().ok()?;
        Some(Self::new(share_id, Some(fragment.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ShareId {
        s.parse().unwrap()
    }

    #[test]
    fn generated_ids_are_word_chars() {
        let a = ShareId::generate();
        let b = ShareId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(is_word_char));
        assert_ne!(a, b);
    }

    #[test]
    fn share_id_rejects_path_chars() {
        assert!("".parse::<ShareId>().is_err());
        assert!("a/b".parse::<ShareId>().is_err());
        assert!("a.b".parse::<ShareId>().is_err());
        assert!("note_01".parse::<ShareId>().is_ok());
    }

    #[test]
    fn note_level_keys() {
        let share_id = id("abc123");
        assert_eq!(document_key(&share_id), "notes/abc123.html");
        assert_eq!(attachments_prefix(&share_id), "notes/abc123/attachs");
    }

    #[test]
    fn resolves_like_a_browser() {
        let base = Url::parse("https://cdn.example.com/share/").unwrap();
        let url = resolve_public_url(&base, "notes/abc.html").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/share/notes/abc.html");

        let no_slash = Url::parse("https://cdn.example.com/share").unwrap();
        let url = resolve_public_url(&no_slash, "notes/abc.html").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/notes/abc.html");
    }

    #[test]
    fn link_format_puts_key_in_fragment() {
        let base = Url::parse("https://notes.example.com/").unwrap();
        let encrypted = ShareLink::new(id("abc"), Some("a2V5+/==".into()));
        assert_eq!(encrypted.to_url(&base), "https://notes.example.com/abc#a2V5+/==");

        let plain = ShareLink::new(id("abc"), None);
        assert_eq!(plain.to_url(&base), "https://notes.example.com/abc");

        let empty_key = ShareLink::new(id("abc"), Some(String::new()));
        assert_eq!(empty_key.decryption_key, None);
    }

    #[test]
    fn parse_existing_links() {
        let link = ShareLink::parse("https://notes.example.com/abc123#c2VjcmV0").unwrap();
        assert_eq!(link.share_id.as_str(), "abc123");
        assert_eq!(link.decryption_key.as_deref(), Some("c2VjcmV0"));

        let plain = ShareLink::parse("https://notes.example.com/abc123").unwrap();
        assert_eq!(plain.share_id.as_str(), "abc123");
        assert_eq!(plain.decryption_key, None);

        assert!(ShareLink::parse("https://notes.example.com/").is_none());
    }

    #[test]
    fn parse_roundtrips_to_url() {
        let base = Url::parse("https://notes.example.com").unwrap();
        let link = ShareLink::new(ShareId::generate(), Some("K3y/+Q==".into()));
        assert_eq!(ShareLink::parse(&link.to_url(&base)), Some(link));
    }
}
