//! Perma Claim Log Index
//!
//! Maintains, per permanode, the set of claims that target it and hands them
//! out in a single canonical replay order.
//!
//! # Core Concepts
//!
//! - [`ClaimLogIndex`]: append, ordered and ranged queries, rebuild from store
//! - [`ClaimKey`]: `(timestamp, claim ref)` replay position
//! - [`ClaimLog`]: ordered snapshot of one permanode's claims
//!
//! # Example
//!
//! ```rust,ignore
//! use perma_index::ClaimLogIndex;
//!
//! let index = ClaimLogIndex::new(store);
//! index.append(&claim).await?;
//! for key in index.claims_for(claim.target()) {
//!     println!("{} @ {}", key.claim, key.timestamp);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod index;
mod log;

pub use error::IndexError;
pub use index::{Appended, ClaimLogIndex, RebuildReport};
pub use log::{ClaimKey, ClaimLog};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
