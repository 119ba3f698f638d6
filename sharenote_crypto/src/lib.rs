//! Encryption for shared notes.
//!
//! Document content is serialized, split into chunks and each chunk is
//! sealed with AES-256-GCM. The resulting [`Envelope`] is embedded in the
//! published page; the [`DecryptionKey`] travels only in the link fragment,
//! which browsers never send to the server.

mod crypto;
mod envelope;

pub use crypto::{CryptoError, DecryptionKey, EXPLICIT_IV_LEN, derived_iv};
pub use envelope::{
    DEFAULT_CHUNK_CHARS, Envelope, SharePayload, chunk_text, decrypt_envelope, encrypt_chunks,
    open, seal,
};
