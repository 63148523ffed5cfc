//! Untranslated-string extraction.
//!
//! Entries are grouped by where they are used (inferred from `#:`
//! references) and exported for human translators as CSV, JSON and a
//! plain-text template. All three formats are accepted back by
//! [`crate::import`].

use crate::catalog::{escape, CatalogEntry};
use crate::error::{CatalogError, Result};
use crate::import::TEMPLATE_PLACEHOLDER;
use crate::storage::Storage;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Frontend,
    Admin,
    Debug,
    Other,
}

impl Category {
    /// Export order (by priority)
    pub const ALL: [Category; 4] = [
        Category::Frontend,
        Category::Admin,
        Category::Debug,
        Category::Other,
    ];

    /// Order in which strings are sent for machine translation. Debug
    /// strings go last.
    pub const TRANSLATION_ORDER: [Category; 4] = [
        Category::Frontend,
        Category::Admin,
        Category::Other,
        Category::Debug,
    ];

    pub fn priority(self) -> u8 {
        match self {
            Category::Frontend => 1,
            Category::Admin => 2,
            Category::Debug => 3,
            Category::Other => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Frontend => "frontend",
            Category::Admin => "admin",
            Category::Debug => "debug",
            Category::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Frontend => "Frontend",
            Category::Admin => "Admin",
            Category::Debug => "Debug",
            Category::Other => "Other",
        }
    }

    /// Infer the category from source references. The first matching rule
    /// wins.
    pub fn classify(references: &[String]) -> Self {
        let joined = references.join(" ");
        let any = |needles: &[&str]| needles.iter().any(|n| joined.contains(n));

        if any(&["templates/frontend", "public/", "shortcodes", "widgets"]) {
            Category::Frontend
        } else if any(&["admin/", "templates/admin", "includes/admin"]) {
            Category::Admin
        } else if any(&["debug/", "diagnostics", "test"]) {
            Category::Debug
        } else {
            Category::Other
        }
    }
}

/// Entries grouped by category. Every category is present, in
/// [`Category::ALL`] order.
pub type Prioritized = IndexMap<Category, Vec<CatalogEntry>>;

pub fn prioritize<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Prioritized {
    let mut groups: Prioritized = Category::ALL.iter().map(|c| (*c, Vec::new())).collect();
    for entry in entries {
        groups
            .entry(Category::classify(&entry.references))
            .or_default()
            .push(entry.clone());
    }
    groups
}

pub fn total(groups: &Prioritized) -> usize {
    groups.values().map(Vec::len).sum()
}

/// Spreadsheet export with a UTF-8 BOM so spreadsheet tools detect the
/// encoding.
pub fn export_csv(groups: &Prioritized) -> io::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(b"\xEF\xBB\xBF".to_vec());
    writer
        .write_record([
            "Priority",
            "Category",
            "Original",
            "Translation",
            "Context",
            "References",
        ])
        .map_err(io::Error::other)?;

    for (category, entries) in groups {
        let priority = category.priority().to_string();
        for entry in entries {
            writer
                .write_record([
                    priority.as_str(),
                    category.label(),
                    entry.msgid.as_str(),
                    "",
                    entry.comments.join("; ").as_str(),
                    entry.references.join("; ").as_str(),
                ])
                .map_err(io::Error::other)?;
        }
    }

    writer.into_inner().map_err(|e| e.into_error())
}

#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    metadata: JsonMetadata<'a>,
    strings: IndexMap<&'static str, IndexMap<&'a str, JsonString<'a>>>,
}

#[derive(Debug, Serialize)]
struct JsonMetadata<'a> {
    total_strings: usize,
    export_date: String,
    source_file: &'a str,
    categories: IndexMap<&'static str, usize>,
}

#[derive(Debug, Serialize)]
struct JsonString<'a> {
    comments: &'a [String],
    references: &'a [String],
    translation: &'static str,
}

pub fn export_json(
    groups: &Prioritized,
    source_file: &str,
    at: DateTime<Local>,
) -> serde_json::Result<String> {
    let export = JsonExport {
        metadata: JsonMetadata {
            total_strings: total(groups),
            export_date: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            source_file,
            categories: groups.iter().map(|(c, e)| (c.as_str(), e.len())).collect(),
        },
        strings: groups
            .iter()
            .map(|(category, entries)| {
                let strings = entries
                    .iter()
                    .map(|entry| {
                        (
                            entry.msgid.as_str(),
                            JsonString {
                                comments: &entry.comments,
                                references: &entry.references,
                                translation: "",
                            },
                        )
                    })
                    .collect();
                (category.as_str(), strings)
            })
            .collect(),
    };
    serde_json::to_string_pretty(&export)
}

/// Human-editable template. Values are PO-escaped, one per line.
pub fn export_template(groups: &Prioritized, at: DateTime<Local>) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    out.push_str("TRANSLATION TEMPLATE\n");
    out.push_str(&format!("{}\n", rule));
    out.push_str(&format!("Generated: {}\n", at.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("Total strings to translate: {}\n\n", total(groups)));

    for (category, entries) in groups {
        if entries.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}\n", rule));
        out.push_str(&format!(
            "{} STRINGS ({} total)\n",
            category.as_str().to_uppercase(),
            entries.len()
        ));
        out.push_str(&format!("{}\n\n", rule));

        for (index, entry) in entries.iter().enumerate() {
            out.push_str(&format!("[{}-{}]\n", category.as_str(), index + 1));
            out.push_str(&format!("Source: {}\n", escape(&entry.msgid)));
            out.push_str(&format!("Translation: {}\n", TEMPLATE_PLACEHOLDER));
            if !entry.comments.is_empty() {
                out.push_str(&format!("Context: {}\n", entry.comments.join("; ")));
            }
            if !entry.references.is_empty() {
                let shown: Vec<&str> = entry.references.iter().take(3).map(String::as_str).collect();
                out.push_str(&format!("Used in: {}", shown.join(", ")));
                if entry.references.len() > 3 {
                    out.push_str(&format!(" (+{} more)", entry.references.len() - 3));
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub template: PathBuf,
}

/// Write all three exports into `export_dir`, named with the timestamp.
pub fn export_all<S: Storage + ?Sized>(
    storage: &S,
    export_dir: &Path,
    groups: &Prioritized,
    source_file: &str,
    at: DateTime<Local>,
) -> Result<ExportPaths> {
    let stamp = at.format("%Y-%m-%d_%H%M%S");
    let paths = ExportPaths {
        csv: export_dir.join(format!("untranslated_strings_{}.csv", stamp)),
        json: export_dir.join(format!("untranslated_strings_{}.json", stamp)),
        template: export_dir.join(format!("translation_template_{}.txt", stamp)),
    };

    let csv = export_csv(groups).map_err(|source| CatalogError::Compile {
        path: paths.csv.clone(),
        source,
    })?;
    storage.write(&paths.csv, &csv)?;
    info!("CSV exported to: {}", paths.csv.display());

    let json = export_json(groups, source_file, at).map_err(|e| CatalogError::Compile {
        path: paths.json.clone(),
        source: io::Error::other(e),
    })?;
    storage.write(&paths.json, json.as_bytes())?;
    info!("JSON exported to: {}", paths.json.display());

    storage.write(&paths.template, export_template(groups, at).as_bytes())?;
    info!("Template exported to: {}", paths.template.display());

    Ok(paths)
}
