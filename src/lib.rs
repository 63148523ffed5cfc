//! Gettext translation-catalog toolchain: PO/POT parsing, merging,
//! serialization, MO compilation and coverage validation, plus the
//! import/export and machine-translation workflow around them.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod import;
pub mod storage;
pub mod translation;
pub mod workflow;

pub use error::{CatalogError, Result};
