//! Perma Claim Schema
//!
//! Signed, content-addressed schema blobs that make up the mutation log.
//!
//! # Core Concepts
//!
//! - [`Permanode`]: signed anchor for a mutable entity; its signer is the owner
//! - [`Claim`]: signed set/add/del of one attribute on one permanode
//! - [`codec`]: canonical encoding, decoding and digest
//! - [`Signer`]: ed25519 key holder that issues permanodes and claims
//!
//! # Example
//!
//! ```rust,ignore
//! use perma_claim::{ClaimType, Signer};
//!
//! let signer = Signer::generate();
//! let permanode = signer.new_permanode()?;
//! let claim = signer.claim_now(permanode.blob_ref()?, ClaimType::SetAttribute, "title", "Hi")?;
//! assert!(claim.verify().is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod codec;
mod error;
mod schema;
mod signer;

pub use codec::{decode_claim, decode_permanode, decode_schema_blob, digest, SCHEMA_VERSION};
pub use error::ClaimError;
pub use schema::{Claim, ClaimDraft, ClaimType, Permanode, SchemaBlob, SignerId};
pub use signer::Signer;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
