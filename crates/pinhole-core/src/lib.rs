//! Core types and traits for the Pinhole URL shortener.
//!
//! This crate provides the short code type, key derivation and the
//! storage contract implemented by every backend in `pinhole_storage`.

pub mod error;
pub mod key;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{ShortenerError, StorageError};
pub use key::KeyDeriver;
pub use repository::{BatchKey, BatchRequest, Repository};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
