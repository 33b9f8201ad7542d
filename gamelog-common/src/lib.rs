//! # Gamelog Common Library
//!
//! Shared code for the gamelog service and its tooling:
//! - Error types
//! - Configuration loading and resolution
//! - Enrichment cache database initialization

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
