//! Stategraph Operations
//!
//! Structural equality, differences and deep copy driven by cached strategies.
//!
//! # Core Concepts
//!
//! - [`equals`]: Member-by-member equality that stops at the first difference
//! - [`diff`]: Tree of every difference, `None` when equal
//! - [`copy`]: Two-phase copy; the target is untouched when anything fails
//! - [`ReferencePairs`]: Cycle bookkeeping for reference-loop handling
//!
//! # Example
//!
//! ```rust,ignore
//! use stategraph_ops::{copy, diff, equals};
//! use stategraph_strategy::{Settings, StrategyCache};
//!
//! let settings = Settings::default();
//! let cache = StrategyCache::global();
//! if !equals(&x.clone().into(), &y.clone().into(), &settings, cache)? {
//!     println!("{}", diff(&x.clone().into(), &y.clone().into(), &settings, cache)?.unwrap());
//!     copy(&x, &y, &settings, cache)?;
//! }
//! ```

#![warn(unreachable_pub)]

mod copy;
mod diff;
mod diff_tree;
mod equals;
mod error;
mod pairs;
mod walk;

// Re-exports
pub use copy::{check_copy, copy};
pub use diff::{diff, diff_with};
pub use diff_tree::{SubDiff, ValueDiff};
pub use equals::{equals, equals_with};
pub use error::OpsError;
pub use pairs::ReferencePairs;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
