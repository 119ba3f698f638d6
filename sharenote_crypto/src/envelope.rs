use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::crypto::{ChunkCipher, CryptoError, DecryptionKey, EXPLICIT_IV_LEN};

/// Chunk size, in characters, used when sealing a share payload.
pub const DEFAULT_CHUNK_CHARS: usize = 1000;

/// Serialized result of encrypting a chunk sequence.
///
/// `ciphertext[i]` is the standard base64 of chunk `i` sealed with its tag.
/// `iv` is present only when one explicit IV was shared by every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub ciphertext: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }

    fn explicit_iv(&self) -> Result<Option<[u8; EXPLICIT_IV_LEN]>, CryptoError> {
        let Some(iv) = &self.iv else {
            return Ok(None);
        };
        let bytes = STANDARD.decode(iv).map_err(|_| CryptoError::InvalidIv)?;
        let iv: [u8; EXPLICIT_IV_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidIv)?;
        Ok(Some(iv))
    }
}

/// The plaintext that an encrypted artifact carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub content: String,
    pub basename: String,
}

/// Splits `text` into pieces of at most `max_chars` characters.
///
/// Splits fall on character boundaries so every chunk decodes on its own.
/// Empty input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Encrypts every chunk under `key`.
///
/// With `iv` set, all chunks share it and it is recorded in the envelope.
/// Without it, chunk `i` uses [`derived_iv(i)`](crate::derived_iv).
pub fn encrypt_chunks<S: AsRef<str>>(
    chunks: &[S],
    key: &DecryptionKey,
    iv: Option<[u8; EXPLICIT_IV_LEN]>,
) -> Result<Envelope, CryptoError> {
    let cipher = ChunkCipher::new(key, iv);
    let ciphertext = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            cipher
                .seal(index, chunk.as_ref().as_bytes())
                .map(|sealed| STANDARD.encode(sealed))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Envelope {
        ciphertext,
        iv: iv.map(|iv| STANDARD.encode(iv)),
    })
}

/// Decrypts every chunk and concatenates the texts in index order.
///
/// Fails on the first chunk that does not authenticate.
pub fn decrypt_envelope(envelope: &Envelope, key: &DecryptionKey) -> Result<String, CryptoError> {
    let cipher = ChunkCipher::new(key, envelope.explicit_iv()?);
    let mut text = String::new();
    for (index, encoded) in envelope.ciphertext.iter().enumerate() {
        let sealed = STANDARD.decode(encoded).map_err(|e| {
            CryptoError::MalformedEnvelope(format!("chunk {index} is not base64: {e}"))
        })?;
        let plain = cipher.open(index, &sealed)?;
        let chunk = String::from_utf8(plain).map_err(|_| CryptoError::InvalidUtf8 { index })?;
        text.push_str(&chunk);
    }
    Ok(text)
}

/// Serializes `payload`, chunks it and returns the envelope JSON.
pub fn seal(
    payload: &SharePayload,
    key: &DecryptionKey,
    iv: Option<[u8; EXPLICIT_IV_LEN]>,
    chunk_chars: usize,
) -> Result<String, CryptoError> {
    let json = serde_json::to_string(payload)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
    let chunks = chunk_text(&json, chunk_chars);
    encrypt_chunks(&chunks, key, iv)?.to_json()
}

/// Inverse of [`seal`].
pub fn open(envelope_json: &str, key: &DecryptionKey) -> Result<SharePayload, CryptoError> {
    let envelope = Envelope::from_json(envelope_json)?;
    let json = decrypt_envelope(&envelope, key)?;
    serde_json::from_str(&json)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("decrypted payload: {e}")))
}
