//! Perma Describe Service
//!
//! Answers "what is the current state of these references?" in bulk.
//!
//! # Core Concepts
//!
//! - [`DescribeService`]: batched describe over a [`PermanodeResolver`](perma_resolve::PermanodeResolver)
//! - [`DescribeResponse`]: per-reference outcomes, serializable to JSON
//! - [`ViewCache`]: moka-backed cache of current views
//!
//! # Example
//!
//! ```rust,ignore
//! use perma_describe::{DescribeService, ViewCache};
//!
//! let service = DescribeService::new(resolver).with_cache(ViewCache::default());
//! let response = service.describe(&[permanode, missing]).await?;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod error;
mod response;
mod service;

pub use cache::{CacheStats, ViewCache, ViewVersion};
pub use error::DescribeError;
pub use response::{DescribeOutcome, DescribeResponse, DescribedBlob};
pub use service::DescribeService;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
