//! Translation coverage and quality validation.
//!
//! Checks that translations keep the printf-style placeholders and HTML
//! markup of their source strings, and measures coverage against a gate.

use super::entry::{Catalog, CatalogEntry};
use crate::storage::Storage;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal coverage or quality issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    pub message: String,
}

impl ValidationFinding {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Source and translation disagree on placeholders or markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub msgid: String,
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

/// Coverage thresholds in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageGate {
    /// Below this the catalog is not deployable
    pub minimum: f64,
    /// Below this a warning is raised
    pub warning: f64,
}

impl Default for CoverageGate {
    fn default() -> Self {
        Self {
            minimum: 95.0,
            warning: 98.0,
        }
    }
}

/// Result of validating a catalog. The header entry is excluded from all counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub total_entries: usize,
    pub translated_count: usize,
    pub empty_count: usize,
    pub fuzzy_count: usize,
    /// Rounded to two decimals
    pub coverage_percent: f64,
    pub empty: Vec<String>,
    pub fuzzy: Vec<String>,
    /// Translations identical to their source string
    pub identical: Vec<String>,
    pub placeholder_mismatches: Vec<Mismatch>,
    pub html_tag_mismatches: Vec<Mismatch>,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Warning)
    }

    /// No findings of any severity.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// The coverage gate holds. Warnings do not block.
    pub fn passes_gate(&self) -> bool {
        !self.has_errors()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }
}

/// Round to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validator for catalog coverage and translation quality.
pub struct CatalogValidator;

// Regex patterns for extraction (cached for performance)
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Shorter sources may legitimately stay untranslated ("OK", "Dashboard").
const IDENTICAL_MIN_LEN: usize = 10;

/// MO files above this size get a performance warning.
pub const MO_SIZE_WARNING: u64 = 1024 * 1024;
/// MO files above this size are not deployable.
pub const MO_SIZE_LIMIT: u64 = 2 * 1024 * 1024;

impl CatalogValidator {
    /// Validate a catalog against a coverage gate.
    ///
    /// `translated` counts non-empty, non-fuzzy translations; coverage is
    /// `translated / total`. An empty catalog has 0% coverage.
    pub fn validate(catalog: &Catalog, gate: &CoverageGate) -> ValidationReport {
        let mut report = ValidationReport {
            total_entries: 0,
            translated_count: 0,
            empty_count: 0,
            fuzzy_count: 0,
            coverage_percent: 0.0,
            empty: Vec::new(),
            fuzzy: Vec::new(),
            identical: Vec::new(),
            placeholder_mismatches: Vec::new(),
            html_tag_mismatches: Vec::new(),
            findings: Vec::new(),
        };

        for entry in catalog.messages() {
            report.total_entries += 1;
            let translated = entry.has_translation();

            if !translated {
                report.empty_count += 1;
                report.empty.push(entry.msgid.clone());
            }
            if entry.is_fuzzy() {
                report.fuzzy_count += 1;
                report.fuzzy.push(entry.msgid.clone());
            }
            if translated && !entry.is_fuzzy() {
                report.translated_count += 1;
            }
            if translated {
                Self::check_entry(entry, &mut report);
            }
        }

        if report.total_entries > 0 {
            report.coverage_percent = round2(
                report.translated_count as f64 / report.total_entries as f64 * 100.0,
            );
        }

        Self::add_findings(&mut report, gate);
        report
    }

    fn check_entry(entry: &CatalogEntry, report: &mut ValidationReport) {
        let translation = entry.singular_translation();

        if entry.msgid.len() > IDENTICAL_MIN_LEN && translation == entry.msgid {
            report.identical.push(entry.msgid.clone());
        }

        let expected = Self::extract_placeholders(&entry.msgid);
        let found = Self::extract_placeholders(translation);
        if expected != found {
            report.placeholder_mismatches.push(Mismatch {
                msgid: entry.msgid.clone(),
                expected,
                found,
            });
        }

        let expected = Self::extract_html_tags(&entry.msgid);
        let found = Self::extract_html_tags(translation);
        if expected.len() != found.len() {
            report.html_tag_mismatches.push(Mismatch {
                msgid: entry.msgid.clone(),
                expected,
                found,
            });
        }
    }

    fn add_findings(report: &mut ValidationReport, gate: &CoverageGate) {
        let coverage = report.coverage_percent;
        if coverage < gate.minimum {
            report.findings.push(ValidationFinding::error(format!(
                "Translation coverage ({:.2}%) below minimum ({:.2}%)",
                coverage, gate.minimum
            )));
        } else if coverage < gate.warning {
            report.findings.push(ValidationFinding::warning(format!(
                "Translation coverage ({:.2}%) below {:.2}%",
                coverage, gate.warning
            )));
        }

        let counts = [
            (report.empty_count, "empty translations"),
            (report.fuzzy_count, "fuzzy translations"),
            (report.placeholder_mismatches.len(), "placeholder mismatches"),
            (report.html_tag_mismatches.len(), "HTML tag mismatches"),
            (report.identical.len(), "translations identical to source"),
        ];
        for (count, label) in counts {
            if count > 0 {
                report
                    .findings
                    .push(ValidationFinding::warning(format!("{} {}", count, label)));
            }
        }
    }

    /// Extract printf placeholders (`%s`, `%d`, `%1$s`, ...), sorted
    fn extract_placeholders(text: &str) -> Vec<String> {
        let regex = PLACEHOLDER_REGEX.get_or_init(|| {
            Regex::new(r"%\d+\$[sdxfFgGoeEbcuX]|%[sdxfFgGoeEbcuX]").unwrap()
        });

        let mut found: Vec<String> = regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        found.sort();
        found
    }

    /// Extract HTML tags with whitespace collapsed, sorted
    fn extract_html_tags(text: &str) -> Vec<String> {
        let regex = HTML_TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
        let whitespace = WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").unwrap());

        let mut tags: Vec<String> = regex
            .find_iter(text)
            .map(|m| whitespace.replace_all(m.as_str(), " ").into_owned())
            .collect();
        tags.sort();
        tags
    }
}

/// Validate with the given gate.
pub fn validate(catalog: &Catalog, gate: &CoverageGate) -> ValidationReport {
    CatalogValidator::validate(catalog, gate)
}

/// Warn when the compiled MO is missing or older than its PO source.
pub fn check_mo_freshness<S: Storage + ?Sized>(
    storage: &S,
    po_path: &Path,
    mo_path: &Path,
) -> Option<ValidationFinding> {
    if !storage.exists(mo_path) {
        return Some(ValidationFinding::warning(format!(
            "MO file is missing: {}",
            mo_path.display()
        )));
    }
    match (storage.modified(po_path), storage.modified(mo_path)) {
        (Some(po), Some(mo)) if po > mo => Some(ValidationFinding::warning(format!(
            "MO file is outdated: {}",
            mo_path.display()
        ))),
        _ => None,
    }
}

/// Flag compiled MO files that are too large to deploy.
pub fn check_mo_size<S: Storage + ?Sized>(storage: &S, mo_path: &Path) -> Option<ValidationFinding> {
    let size = storage.size(mo_path)?;
    if size > MO_SIZE_LIMIT {
        Some(ValidationFinding::error(format!(
            "MO file exceeds 2MB limit ({} bytes)",
            size
        )))
    } else if size > MO_SIZE_WARNING {
        Some(ValidationFinding::warning(format!(
            "MO file is large ({} bytes), may affect performance",
            size
        )))
    } else {
        None
    }
}

fn write_sample(f: &mut fmt::Formatter<'_>, title: &str, items: &[String], limit: usize) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}: {}", title, items.len())?;
    for item in items.iter().take(limit) {
        let short: String = item.chars().take(60).collect();
        writeln!(f, "  - {}", short)?;
    }
    if items.len() > limit {
        writeln!(f, "  ... and {} more", items.len() - limit)?;
    }
    writeln!(f)
}

fn write_mismatches(f: &mut fmt::Formatter<'_>, title: &str, items: &[Mismatch]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}: {}", title, items.len())?;
    for item in items.iter().take(3) {
        let short: String = item.msgid.chars().take(40).collect();
        writeln!(f, "  - {}", short)?;
        writeln!(f, "    Expected: {}", item.expected.join(", "))?;
        writeln!(f, "    Found: {}", item.found.join(", "))?;
    }
    writeln!(f)
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "TRANSLATION VALIDATION REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "Total strings:       {}", self.total_entries)?;
        writeln!(
            f,
            "Translated:          {} ({:.2}%)",
            self.translated_count, self.coverage_percent
        )?;
        writeln!(f, "Untranslated:        {}", self.empty_count)?;
        writeln!(f, "Fuzzy:               {}", self.fuzzy_count)?;
        writeln!(f)?;

        write_sample(f, "Empty translations", &self.empty, 5)?;
        write_sample(f, "Fuzzy translations", &self.fuzzy, 5)?;
        write_mismatches(f, "Placeholder mismatches", &self.placeholder_mismatches)?;
        write_mismatches(f, "HTML tag mismatches", &self.html_tag_mismatches)?;

        if self.is_clean() {
            writeln!(f, "All validations passed.")?;
        }
        for finding in &self.findings {
            let marker = match finding.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARN ",
            };
            writeln!(f, "[{}] {}", marker, finding.message)?;
        }
        write!(f, "{}", rule)
    }
}
