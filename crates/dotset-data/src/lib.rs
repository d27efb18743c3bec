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

//! Row storage for dotset: the backend contract, an in-memory backend, and the
//! `PostgreSQL` settings table.

pub mod error;
pub mod rows;
pub mod settings;

pub use error::{DataError, Result as DataResult};
pub use rows::{MemoryRows, SettingRow, SettingsRows};
pub use settings::{DEFAULT_TABLE, PgSettingsRows, validate_table_name};
