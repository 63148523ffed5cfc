//! PO text serializer.

use super::entry::{Catalog, CatalogEntry};
use super::escape::escape;
use chrono::{DateTime, TimeZone};
use std::fmt::Write;

/// Escaped values at or above this byte length use multi-line framing.
const SINGLE_LINE_LIMIT: usize = 70;

/// File-level metadata rendered into the header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMetadata {
    /// `# ` comment lines written above the header entry
    pub title_comments: Vec<String>,
    pub project_id_version: String,
    pub report_msgid_bugs_to: String,
    pub pot_creation_date: String,
    pub po_revision_date: String,
    pub last_translator: String,
    pub language_team: String,
    pub language: String,
    pub plural_forms: String,
    pub generator: String,
}

impl Default for HeaderMetadata {
    fn default() -> Self {
        Self {
            title_comments: vec!["Translations for this project.".to_string()],
            project_id_version: "PACKAGE VERSION".to_string(),
            report_msgid_bugs_to: String::new(),
            pot_creation_date: "YEAR-MO-DA HO:MI+ZONE".to_string(),
            po_revision_date: "YEAR-MO-DA HO:MI+ZONE".to_string(),
            last_translator: "FULL NAME <EMAIL@ADDRESS>".to_string(),
            language_team: "LANGUAGE <LL@li.org>".to_string(),
            language: String::new(),
            plural_forms: "nplurals=2; plural=(n != 1);".to_string(),
            generator: concat!("translation-catalog ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HeaderMetadata {
    /// Stamp `PO-Revision-Date` in gettext's `YYYY-MM-DD HH:MM+ZZZZ` form.
    pub fn with_revision_date<Tz: TimeZone>(mut self, at: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        self.po_revision_date = at.format("%Y-%m-%d %H:%M%z").to_string();
        self
    }

    /// Rewrite the `PO-Revision-Date` line of an existing header entry,
    /// appending it if absent. Catalogs without a header are untouched.
    pub fn stamp_revision_date(&self, catalog: &mut Catalog) {
        let Some(header) = catalog.header() else {
            return;
        };
        let stamp = format!("PO-Revision-Date: {}", self.po_revision_date);
        let mut found = false;
        let mut text = String::new();
        for line in header.msgstr.lines() {
            if line.starts_with("PO-Revision-Date:") {
                found = true;
                let _ = writeln!(text, "{}", stamp);
            } else {
                let _ = writeln!(text, "{}", line);
            }
        }
        if !found {
            let _ = writeln!(text, "{}", stamp);
        }
        catalog.set_header(text);
    }

    /// Render the header msgstr with fields in a fixed order.
    pub fn render(&self) -> String {
        let fields = [
            ("Project-Id-Version", self.project_id_version.as_str()),
            ("Report-Msgid-Bugs-To", self.report_msgid_bugs_to.as_str()),
            ("POT-Creation-Date", self.pot_creation_date.as_str()),
            ("PO-Revision-Date", self.po_revision_date.as_str()),
            ("Last-Translator", self.last_translator.as_str()),
            ("Language-Team", self.language_team.as_str()),
            ("Language", self.language.as_str()),
            ("MIME-Version", "1.0"),
            ("Content-Type", "text/plain; charset=UTF-8"),
            ("Content-Transfer-Encoding", "8bit"),
            ("Plural-Forms", self.plural_forms.as_str()),
            ("X-Generator", self.generator.as_str()),
        ];
        let mut out = String::new();
        for (key, value) in fields {
            let _ = writeln!(out, "{}: {}", key, value);
        }
        out
    }
}

/// Writes catalogs as PO text.
#[derive(Debug, Clone, Default)]
pub struct PoSerializer {
    metadata: HeaderMetadata,
}

impl PoSerializer {
    pub fn new(metadata: HeaderMetadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &HeaderMetadata {
        &self.metadata
    }

    /// Serialize the catalog. The header entry always comes first; if the
    /// catalog has none, one is rendered from the configured metadata.
    pub fn serialize(&self, catalog: &Catalog) -> String {
        let mut out = String::new();

        for line in &self.metadata.title_comments {
            let _ = writeln!(out, "# {}", line);
        }
        match catalog.header() {
            Some(header) => write_entry(&mut out, header),
            None => write_entry(&mut out, &CatalogEntry::translated("", self.metadata.render())),
        }

        for entry in catalog.messages() {
            write_entry(&mut out, entry);
        }
        out
    }
}

/// Serialize with default header metadata.
pub fn serialize(catalog: &Catalog) -> String {
    PoSerializer::default().serialize(catalog)
}

fn write_entry(out: &mut String, entry: &CatalogEntry) {
    for comment in &entry.comments {
        let _ = writeln!(out, "#. {}", comment);
    }
    for reference in &entry.references {
        let _ = writeln!(out, "#: {}", reference);
    }
    if !entry.flags.is_empty() {
        let flags: Vec<&str> = entry.flags.iter().map(String::as_str).collect();
        let _ = writeln!(out, "#, {}", flags.join(", "));
    }

    write_field(out, "msgid", &entry.msgid);
    if let Some(plural) = &entry.msgid_plural {
        write_field(out, "msgid_plural", plural);
        for (index, form) in &entry.msgstr_plural {
            write_field(out, &format!("msgstr[{}]", index), form);
        }
    } else {
        write_field(out, "msgstr", &entry.msgstr);
    }
    out.push('\n');
}

/// Emit `key "value"`, or `key ""` plus one segment per embedded line.
///
/// Long values without newlines stay on one physical line.
fn write_field(out: &mut String, key: &str, value: &str) {
    let escaped = escape(value);
    if !value.contains('\n') && escaped.len() < SINGLE_LINE_LIMIT {
        let _ = writeln!(out, "{} \"{}\"", key, escaped);
        return;
    }

    let _ = writeln!(out, "{} \"\"", key);
    let segments: Vec<&str> = value.split('\n').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if i < last {
            let _ = writeln!(out, "\"{}\\n\"", escape(segment));
        } else {
            let _ = writeln!(out, "\"{}\"", escape(segment));
        }
    }
}
