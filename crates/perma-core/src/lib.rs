//! Perma Core - permanode service
//!
//! Ties the claim log together:
//! - Creates permanodes and submits signed claims
//! - Answers batched describe queries through a view cache
//! - Rebuilds the index from the blob store
//! - Loads configuration from TOML
//!
//! # Example
//!
//! ```rust,ignore
//! use perma_core::prelude::*;
//!
//! # async fn example() -> Result<(), PermanodeError> {
//! let store: SharedBlobStore = Arc::new(MemoryBlobStore::new());
//! let (service, _policy) = PermanodeService::with_owner_policy(store);
//! let alice = Signer::generate();
//!
//! let doc = service.new_permanode(&alice).await?;
//! service.set_attribute(&alice, doc, "title", "Notes").await?;
//! let response = service.describe(&[doc]).await?;
//! assert_eq!(response.view(&doc).unwrap().single("title"), Some("Notes"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod service;

pub use config::{CacheConfig, DescribeConfig, ResolveConfig, ServiceConfig};
pub use error::{ConfigError, PermanodeError};
pub use service::{PermanodeService, SubmitOutcome};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the permanode service
    pub use std::sync::Arc;

    pub use perma_blob::{BlobRef, BlobStore, MemoryBlobStore, SharedBlobStore};
    pub use perma_claim::{ClaimType, Signer, SignerId};
    pub use perma_describe::{DescribeOutcome, DescribeResponse};
    pub use perma_resolve::{
        AddSemantics, AllowAll, AuthorizationPolicy, OwnerPolicy, PermanodeView, ResolveOptions,
    };

    pub use crate::{PermanodeError, PermanodeService, ServiceConfig, SubmitOutcome};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
