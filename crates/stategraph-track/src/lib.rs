//! Stategraph Tracking
//!
//! Live observers over graphs of notifying objects.
//!
//! # Core Concepts
//!
//! - [`ChangeTracker`]: Counts changes anywhere below a root
//! - [`DirtyTracker`]: Keeps the difference between two graphs current
//! - [`Synchronizer`]: Copies a source onto a target after every change
//! - [`GraphChange`]: One notification bubbling up the node graph
//!
//! Every tracker shares one node per observed object (or pair of objects), so
//! a value reachable along several paths is subscribed once and cycles end.
//!
//! # Example
//!
//! ```rust,ignore
//! use stategraph_track::ChangeTracker;
//! use stategraph_strategy::{ReferenceHandling, Settings};
//!
//! let tracker = ChangeTracker::new(&order, Settings::properties(ReferenceHandling::Structural))?;
//! let _log = tracker.on_changed(|change| println!("{:?}", change.event()));
//! order.set("total", 12)?;
//! assert_eq!(tracker.changes(), 1);
//! ```

#![warn(unreachable_pub)]

mod change;
mod dirty;
mod error;
mod graph;
mod node_cache;
mod sync;

// Re-exports
pub use change::{ChangeTracker, CHANGES_PROPERTY};
pub use dirty::{DirtyProperty, DirtyTracker};
pub use error::TrackError;
pub use graph::GraphChange;
pub use sync::Synchronizer;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
