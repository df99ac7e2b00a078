//! Stategraph Strategies
//!
//! Per-type traversal strategies built once and shared by every operation.
//!
//! # Core Concepts
//!
//! - [`Settings`]: Member selection, reference handling, ignore lists and instantiation policy
//! - [`SettingsConfig`]: TOML form of [`Settings`]
//! - [`classify`]: Decides what kind of type a [`TypeRef`](stategraph_model::TypeRef) is
//! - [`Strategy`]: How instances of one type are walked
//! - [`StrategyCache`]: Build-once cache keyed by type, settings and role
//! - [`verify`]: Surfaces deferred errors before an operation starts
//!
//! # Example
//!
//! ```rust,ignore
//! use stategraph_strategy::{verify, ReferenceHandling, Settings, StrategyCache};
//!
//! let settings = Settings::properties(ReferenceHandling::Structural);
//! let strategy = StrategyCache::global().root(&TypeRef::named("Level"), &settings);
//! verify(&strategy)?;
//! ```

#![warn(unreachable_pub)]

mod cache;
mod classify;
mod config;
mod error;
mod settings;
mod strategy;
mod verify;

// Re-exports
pub use cache::{Role, StrategyCache};
pub use classify::{classify, is_immutable, TypeClassification};
pub use config::{ConfigError, SettingsConfig};
pub use error::StrategyError;
pub use settings::{
    Constructor, MemberKinds, MemberSelection, ReferenceHandling, Settings, SettingsBuilder,
    SettingsId,
};
pub use strategy::{
    ComplexStrategy, EquatableStrategy, ErrorKind, ErrorStrategy, ItemsStrategy,
    MappingStrategy, MemberStrategy, Strategy, StrategyRef,
};
pub use verify::verify;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
