use async_trait::async_trait;
use bytes::Bytes;

/// Result of a [`ContentTransform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub content: Bytes,
    pub filetype: String,
    /// Set when `content` differs from the input; the unit is then rehashed.
    pub changed: bool,
}

impl Transformed {
    pub fn unchanged(content: Bytes, filetype: &str) -> Self {
        Self {
            content,
            filetype: filetype.to_owned(),
            changed: false,
        }
    }
}

/// Rewrites content before upload, e.g. recompressing images.
#[async_trait]
pub trait ContentTransform: Send + Sync + 'static {
    async fn transform(&self, content: Bytes, filetype: &str) -> anyhow::Result<Transformed>;
}

/// Uploads content as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

#[async_trait]
impl ContentTransform for Passthrough {
    async fn transform(&self, content: Bytes, filetype: &str) -> anyhow::Result<Transformed> {
        Ok(Transformed::unchanged(content, filetype))
    }
}
