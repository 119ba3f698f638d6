use std::path::Path;

use anyhow::{Context, Result, anyhow};
use sharenote_core::ShareLink;
use sharenote_crypto::{DecryptionKey, open};
use sharenote_template::extract_envelope;

pub async fn run_decrypt(artifact: &Path, key_or_link: &str) -> Result<()> {
    let html = tokio::fs::read_to_string(artifact)
        .await
        .with_context(|| format!("failed to read {}", artifact.display()))?;
    let envelope = extract_envelope(&html)
        .ok_or_else(|| anyhow!("{} is not an encrypted share", artifact.display()))?;

    let key = parse_key(key_or_link)?;
    let payload = open(&envelope, &key).context("Unable to decrypt using this key.")?;
    tracing::info!("decrypted {}", payload.basename);
    println!("{}", payload.content);
    Ok(())
}

/// Accepts a full share link or the bare key from its fragment.
fn parse_key(key_or_link: &str) -> Result<DecryptionKey> {
    let fragment = if key_or_link.contains('#') {
        ShareLink::parse(key_or_link)
            .and_then(|link| link.decryption_key)
            .ok_or_else(|| anyhow!("share link has no decryption key"))?
    } else {
        key_or_link.to_owned()
    };
    Ok(DecryptionKey::from_fragment(&fragment)?)
}
