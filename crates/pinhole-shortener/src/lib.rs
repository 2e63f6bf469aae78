//! URL shortener service implementation.
//!
//! Core types are re-exported from `pinhole_core`.

pub mod service;

pub use pinhole_core::{Shortener, ShortenerError};
pub use service::ShortenerService;
