//! Perma Blob Layer
//!
//! Content-addressed references and the blob store collaborator consumed by
//! the claim log.
//!
//! # Core Concepts
//!
//! - [`BlobRef`]: 32-byte BLAKE3 digest naming immutable content
//! - [`BlobStore`]: async put/get contract over immutable blobs
//! - [`MemoryBlobStore`]: shared in-process store for tests and demos
//!
//! # Example
//!
//! ```rust,ignore
//! use perma_blob::{BlobStore, MemoryBlobStore};
//!
//! let store = MemoryBlobStore::new();
//! let blob = store.put(b"hello").await?;
//! assert!(store.contains(&blob).await?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob_ref;
mod memory;
mod store;

pub use blob_ref::{BlobRef, BlobRefError, DIGEST_PREFIX};
pub use memory::{MemoryBlobStore, StoreStats};
pub use store::{BlobStore, BlobStoreError, SharedBlobStore, DEFAULT_FETCH_CONCURRENCY};

/// Re-exported so implementors of [`BlobStore`] share one `Bytes` type.
pub use bytes::Bytes;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
