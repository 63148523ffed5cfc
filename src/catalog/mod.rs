//! Gettext translation catalogs.
//!
//! # Architecture
//!
//! - `entry`: `Catalog` and `CatalogEntry`, the in-memory model
//! - `escape`: PO string escaping
//! - `parser`: lenient PO/POT text → `Catalog`
//! - `merge`: applying translations, template synchronisation, persisted merges
//! - `serializer`: `Catalog` → PO text, header metadata
//! - `mo`: `Catalog` → GNU MO binary
//! - `validator`: coverage gate and quality checks
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_catalog::catalog::{self, CoverageGate};
//!
//! let catalog = catalog::parse(&po_text);
//! let report = catalog::validate(&catalog, &CoverageGate::default());
//! let mo_bytes = catalog::compile(&catalog);
//! ```

mod entry;
mod escape;
mod merge;
mod mo;
mod parser;
mod serializer;
mod validator;

pub use entry::{Catalog, CatalogEntry, FUZZY_FLAG};
pub use escape::{escape, unescape};
pub use merge::{merge, merge_with_template, sync_with_template, MergeOutcome, Merger, Translations};
pub use mo::{compile, read_u32_le, write_u32_le, MoCompiler, MoOptions, MoStats, MO_MAGIC};
pub use parser::parse;
pub use serializer::{serialize, HeaderMetadata, PoSerializer};
pub use validator::{
    check_mo_freshness, check_mo_size, validate, CatalogValidator, CoverageGate, Mismatch, Severity,
    ValidationFinding, ValidationReport, MO_SIZE_LIMIT, MO_SIZE_WARNING,
};
