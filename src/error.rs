//! Error taxonomy for catalog operations.
//!
//! Quality and coverage problems are not errors: they are reported as
//! [`ValidationFinding`](crate::catalog::ValidationFinding)s inside a
//! validation report. The variants here are reserved for conditions that
//! abort the current command.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Unrecoverable structural failure. The default parser is lenient and
    /// never produces this.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Reserved: merges are last-write-wins and never conflict today.
    #[error("merge conflict on msgid {msgid:?}")]
    MergeConflict { msgid: String },

    /// Network, auth or quota failure reported by the translation provider.
    #[error("translation provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Writing a PO, MO or backup file failed.
    #[error("failed to write {}: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An import source could not be decoded.
    #[error("cannot import {}: {message}", path.display())]
    Import { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// HTTP-like status of a provider failure, if this is one.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            CatalogError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}
