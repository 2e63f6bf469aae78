//! Storage backends for the Pinhole URL shortener.
//!
//! Three backends implement [`Repository`]: an in-memory table, an
//! append-only JSON-lines log and a SQL database (SQLite or PostgreSQL).
//! [`Storage`] picks one of them from a [`StorageConfig`].

pub mod config;
pub mod database;
pub mod file;
pub mod index;
pub mod memory;
pub mod storage;

pub use config::{BackendKind, StorageConfig};
pub use database::{DatabaseOptions, DatabaseRepository, Dialect};
pub use file::FileRepository;
pub use index::{Insertion, KeyIndex};
pub use memory::InMemoryRepository;
pub use pinhole_core::error::Result;
pub use pinhole_core::{BatchKey, BatchRequest, KeyDeriver, Repository, ShortCode, StorageError};
pub use storage::Storage;
