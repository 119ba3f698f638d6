//! Core sharenote types and traits.
//!
//! This crate defines the pieces every other sharenote crate builds on.
//!
//! ## Storage layout (stable)
//!
//! The following modules define object keys and link formats that previously
//! published documents depend on; changing them breaks existing links:
//!
//! - Content hashes and the addresser that produces them (`hash`)
//! - Object keys for theme assets, note attachments and note documents
//!   (`keys`, `unit::PublishUnit::storage_key`)
//! - Share ids and share links, whose fragment carries the decryption key
//!   (`keys::ShareId`, `keys::ShareLink`)
//!
//! ## Backend contract
//!
//! - `StorageBackend`, the put/probe/delete surface of a single bucket-shaped
//!   object store, and its error type `StorageError`
//!
//! Implementations live in the `sharenote_store_*` crates.

pub mod hash;
pub mod keys;
pub mod store;
pub mod unit;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use hash::{Blake3Addresser, ContentAddresser, ContentHash};
pub use keys::{ShareId, ShareLink, attachments_prefix, document_key, resolve_public_url};
pub use store::{ObjectMetadata, StorageBackend, StorageError, StoreResult};
pub use unit::{MalformedUnit, Payload, PublishUnit, UnitKind};
