#![forbid(unsafe_code)]
#![deny(
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Dotted-path settings store with a write-through JSON cache in front of
//! relational rows.
//!
//! Layout: `path.rs` (dotted-key navigation), `cache.rs` (`FlatCache`),
//! `service.rs` (`SettingsStore`), `reconcile.rs` (`Reconciler`),
//! `defaults.rs` (defaults sources), `model.rs` (options and reports),
//! `loader.rs`/`validate.rs` (configuration documents and overrides).

pub mod cache;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod path;
pub mod reconcile;
pub mod service;
pub mod validate;

pub use cache::FlatCache;
pub use defaults::{DefaultsDocument, DefaultsSource};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, read_document};
pub use model::{
    CleanOptions, CleanReport, DEFAULT_CACHE_FILE, KeyMatch, SettingsConfig, SettingsOptions,
};
pub use path::KeyPath;
pub use reconcile::Reconciler;
pub use service::SettingsStore;
