//! AES-256-GCM primitives for shared note content.
//!
//! Chunks are sealed either under one caller-supplied 12-byte IV shared by
//! every chunk, or under an IV derived from the chunk index. The derived IV
//! is a single byte holding `index & 0xFF` (a one-byte, all-zero IV with its
//! lowest byte set), which is what the viewer's WebCrypto code reproduces.
//!
//! Known weakness: derived IVs repeat every 256 chunks and are small and
//! sequential, so two chunks 256 apart are sealed under the same key and
//! nonce. Previously published documents can only be opened if this exact
//! derivation is kept; protect long content with an explicit IV instead.

use aes_gcm::{
    Aes256Gcm, AesGcm, Key, Nonce,
    aead::{
        Aead, KeyInit,
        consts::{U1, U12},
    },
    aes::Aes256,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256-GCM with the one-byte nonce used by derived IVs.
type DerivedIvAes256Gcm = AesGcm<Aes256, U1>;

/// Length of an explicit, shared IV.
pub const EXPLICIT_IV_LEN: usize = 12;

/// Errors that can occur while sealing or opening shared content.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),
    #[error("invalid iv: expected {EXPLICIT_IV_LEN} base64-encoded bytes")]
    InvalidIv,
    #[error("encryption failed for chunk {index}")]
    Encryption { index: usize },
    #[error("unable to decrypt chunk {index}: wrong key or corrupted ciphertext")]
    Decryption { index: usize },
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("chunk {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },
}

/// 256-bit symmetric key. Lives only in the share link fragment.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionKey([u8; 32]);

impl DecryptionKey {
    /// Generate a random key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Standard padded base64, the form carried after `#` in share links.
    pub fn to_fragment(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Parses a fragment, with or without the leading `#`.
    pub fn from_fragment(fragment: &str) -> Result<Self, CryptoError> {
        let fragment = fragment.trim().trim_start_matches('#');
        let mut bytes = STANDARD.decode(fragment)?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DecryptionKey(..)")
    }
}

/// The IV used when none is supplied: one byte, `index mod 256`.
pub fn derived_iv(index: usize) -> [u8; 1] {
    [(index & 0xFF) as u8]
}

/// Chunk cipher for one envelope: the key plus the IV mode.
pub(crate) enum ChunkCipher {
    Derived(DerivedIvAes256Gcm),
    Explicit(Box<Aes256Gcm>, [u8; EXPLICIT_IV_LEN]),
}

impl ChunkCipher {
    pub(crate) fn new(key: &DecryptionKey, iv: Option<[u8; EXPLICIT_IV_LEN]>) -> Self {
        match iv {
            Some(iv) => Self::Explicit(
                Box::new(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))),
                iv,
            ),
            None => Self::Derived(DerivedIvAes256Gcm::new(
                Key::<DerivedIvAes256Gcm>::from_slice(key.as_bytes()),
            )),
        }
    }

    pub(crate) fn seal(&self, index: usize, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let sealed = match self {
            Self::Derived(cipher) => {
                cipher.encrypt(Nonce::<U1>::from_slice(&derived_iv(index)), plaintext)
            }
            Self::Explicit(cipher, iv) => cipher.encrypt(Nonce::<U12>::from_slice(iv), plaintext),
        };
        sealed.map_err(|_| CryptoError::Encryption { index })
    }

    pub(crate) fn open(&self, index: usize, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let opened = match self {
            Self::Derived(cipher) => {
                cipher.decrypt(Nonce::<U1>::from_slice(&derived_iv(index)), ciphertext)
            }
            Self::Explicit(cipher, iv) => cipher.decrypt(Nonce::<U12>::from_slice(iv), ciphertext),
        };
        opened.map_err(|_| CryptoError::Decryption { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_iv_wraps_at_256() {
        assert_eq!(derived_iv(0), derived_iv(256));
        assert_eq!(derived_iv(1), derived_iv(257));
        assert_eq!(derived_iv(255), [0xFF]);
    }

    #[test]
    fn derived_ivs_distinct_below_256() {
        let ivs: std::collections::HashSet<[u8; 1]> = (0..256).map(derived_iv).collect();
        assert_eq!(ivs.len(), 256);
    }

    #[test]
    fn fragment_roundtrip() {
        let key = DecryptionKey::generate();
        let fragment = key.to_fragment();
        assert_eq!(fragment.len(), 44);
        assert_eq!(DecryptionKey::from_fragment(&fragment).unwrap(), key);
        assert_eq!(DecryptionKey::from_fragment(&format!("#{fragment}")).unwrap(), key);
    }

    #[test]
    fn fragment_rejects_bad_input() {
        assert!(matches!(
            DecryptionKey::from_fragment("not base64!"),
            Err(CryptoError::InvalidKeyEncoding(_))
        ));
        assert!(matches!(
            DecryptionKey::from_fragment(&STANDARD.encode([1u8; 16])),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = DecryptionKey::from_bytes([7u8; 32]);
        assert_eq!(format!("{key:?}"), "DecryptionKey(..)");
    }

    #[test]
    fn chunk_index_matters_for_derived_iv() {
        let key = DecryptionKey::from_bytes([42u8; 32]);
        let cipher = ChunkCipher::new(&key, None);
        let sealed = cipher.seal(0, b"Hello").unwrap();

        assert_eq!(cipher.open(0, &sealed).unwrap(), b"Hello");
        assert!(matches!(
            cipher.open(1, &sealed),
            Err(CryptoError::Decryption { index: 1 })
        ));
        // Same nonce again 256 chunks later.
        assert_eq!(cipher.open(256, &sealed).unwrap(), b"Hello");
    }

    #[test]
    fn explicit_iv_ignores_index() {
        let key = DecryptionKey::from_bytes([42u8; 32]);
        let cipher = ChunkCipher::new(&key, Some([9u8; EXPLICIT_IV_LEN]));
        let sealed = cipher.seal(0, b"Hello").unwrap();
        assert_eq!(cipher.open(5, &sealed).unwrap(), b"Hello");
    }
}
