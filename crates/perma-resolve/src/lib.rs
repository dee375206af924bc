//! Perma Permanode Resolver
//!
//! Turns a permanode's claim log into its current attribute state.
//!
//! # Core Concepts
//!
//! - [`fold_claims`]: pure replay of ordered claims into a [`PermanodeView`]
//! - [`PermanodeResolver`]: fetches indexed claim bodies and folds them
//! - [`AuthorizationPolicy`]: decides whose claims take effect
//!
//! # Replay rules
//!
//! | Claim | Effect |
//! |-------|--------|
//! | `set-attribute(a, v)` | `a` becomes `[v]` |
//! | `add-attribute(a, v)` | `v` appended to `a` |
//! | `del-attribute(a, v)` | first `v` removed from `a` |
//! | `del-attribute(a, "")` | `a` removed |
//!
//! An attribute left with no values disappears from the view.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod fold;
mod policy;
mod resolver;
mod view;

pub use error::ResolveError;
pub use fold::{fold_claims, sort_for_replay, AddSemantics, ResolveOptions};
pub use policy::{AllowAll, AuthorizationPolicy, OwnerPolicy};
pub use resolver::PermanodeResolver;
pub use view::PermanodeView;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
