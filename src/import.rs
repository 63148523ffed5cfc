//! Translation import sources.
//!
//! Every reader reduces its input to [`Translations`] (msgid → msgstr) that
//! the merger applies. Entries with an empty source or translation are
//! dropped.

use crate::catalog::{unescape, Translations};
use crate::error::{CatalogError, Result};
use crate::storage::Storage;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Placeholder written into exported templates for the translator to replace.
pub const TEMPLATE_PLACEHOLDER: &str = "[TRANSLATE HERE]";

const SOURCE_COLUMN: usize = 2;
const TRANSLATION_COLUMN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
    Template,
}

impl ImportFormat {
    /// Pick a reader from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Template),
            other => Err(CatalogError::Import {
                path: path.to_path_buf(),
                message: format!("unsupported file format: {:?}", other),
            }),
        }
    }
}

/// Read translations from `path`, dispatching on its extension.
pub fn import_file<S: Storage + ?Sized>(storage: &S, path: &Path) -> Result<Translations> {
    let format = ImportFormat::from_path(path)?;
    let bytes = storage.read(path)?;

    let translations = match format {
        ImportFormat::Csv => from_csv(&bytes),
        ImportFormat::Json => from_json(&bytes),
        ImportFormat::Template => Ok(from_template(&String::from_utf8_lossy(&bytes))),
    }
    .map_err(|message| CatalogError::Import {
        path: path.to_path_buf(),
        message,
    })?;

    info!(
        "Read {} translations from {} ({:?})",
        translations.len(),
        path.display(),
        format
    );
    Ok(translations)
}

/// Spreadsheet export: priority, category, source, translation, context,
/// references. A leading BOM and a header row are skipped.
pub fn from_csv(bytes: &[u8]) -> std::result::Result<Translations, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut translations = Translations::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("invalid CSV: {}", e))?;
        if index == 0 && is_header_row(&record) {
            debug!("Skipping CSV header row");
            continue;
        }
        let (Some(source), Some(translation)) =
            (record.get(SOURCE_COLUMN), record.get(TRANSLATION_COLUMN))
        else {
            continue;
        };
        if !source.is_empty() && !translation.is_empty() {
            translations.insert(source.to_string(), translation.to_string());
        }
    }
    Ok(translations)
}

fn is_header_row(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .map(|first| first.trim().eq_ignore_ascii_case("priority"))
        .unwrap_or(false)
}

/// Accepts `{"msgid": "tr"}`, `{"translations": {...}}` or the extract
/// layout `{"strings": {category: {msgid: {"translation": "tr"}}}}`.
pub fn from_json(bytes: &[u8]) -> std::result::Result<Translations, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {}", e))?;
    let Value::Object(root) = value else {
        return Err("expected a JSON object at the top level".to_string());
    };

    let mut translations = Translations::new();

    if let Some(Value::Object(strings)) = root.get("strings") {
        for category in strings.values() {
            let Value::Object(entries) = category else {
                continue;
            };
            for (msgid, entry) in entries {
                if let Some(Value::String(translation)) = entry.get("translation") {
                    push(&mut translations, msgid, translation);
                }
            }
        }
        return Ok(translations);
    }

    let flat = match root.get("translations") {
        Some(Value::Object(map)) => map,
        Some(_) => return Err("\"translations\" must be an object".to_string()),
        None => &root,
    };
    for (msgid, translation) in flat {
        if let Value::String(translation) = translation {
            push(&mut translations, msgid, translation);
        }
    }
    Ok(translations)
}

/// Plain-text template with `Source:` / `Translation:` line pairs.
/// Values are PO-escaped so multi-line strings fit on one line.
/// Untouched placeholders are ignored. Only the single space after the
/// label is a separator; any other whitespace belongs to the value.
pub fn from_template(text: &str) -> Translations {
    let mut translations = Translations::new();
    let mut pending: Option<&str> = None;

    for line in text.lines() {
        if let Some(source) = line.strip_prefix("Source:") {
            pending = Some(field_value(source));
        } else if let Some(translation) = line.strip_prefix("Translation:") {
            let translation = field_value(translation);
            if let Some(source) = pending.take() {
                if translation != TEMPLATE_PLACEHOLDER {
                    push(&mut translations, &unescape(source), &unescape(translation));
                }
            }
        }
    }
    translations
}

fn field_value(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

fn push(translations: &mut Translations, msgid: &str, translation: &str) {
    if !msgid.is_empty() && !translation.is_empty() {
        translations.insert(msgid.to_string(), translation.to_string());
    }
}
