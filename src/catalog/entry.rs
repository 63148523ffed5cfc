//! In-memory catalog model.

use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;

/// Flag marking a translation that still needs human review.
pub const FUZZY_FLAG: &str = "fuzzy";

/// One translation unit of a PO/POT file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    pub msgid: String,
    pub msgid_plural: Option<String>,
    pub msgstr: String,
    pub msgstr_plural: BTreeMap<u32, String>,
    /// Extracted comments (`#.`)
    pub comments: Vec<String>,
    /// Source references (`#:`), one per line as written
    pub references: Vec<String>,
    pub flags: IndexSet<String>,
}

impl CatalogEntry {
    pub fn new(msgid: impl Into<String>) -> Self {
        Self {
            msgid: msgid.into(),
            ..Self::default()
        }
    }

    /// Convenience constructor for a singular, translated entry.
    pub fn translated(msgid: impl Into<String>, msgstr: impl Into<String>) -> Self {
        Self {
            msgid: msgid.into(),
            msgstr: msgstr.into(),
            ..Self::default()
        }
    }

    pub fn is_header(&self) -> bool {
        self.msgid.is_empty()
    }

    pub fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.contains(FUZZY_FLAG)
    }

    /// The translation used for coverage and lookups: `msgstr` for singular
    /// entries, `msgstr[0]` for plural ones.
    pub fn singular_translation(&self) -> &str {
        if self.is_plural() {
            self.msgstr_plural.get(&0).map(String::as_str).unwrap_or("")
        } else {
            &self.msgstr
        }
    }

    /// Replace the singular translation. Returns true if the value changed.
    pub fn set_singular_translation(&mut self, value: &str) -> bool {
        let slot = if self.is_plural() {
            self.msgstr_plural.entry(0).or_default()
        } else {
            &mut self.msgstr
        };
        if slot == value {
            return false;
        }
        *slot = value.to_string();
        true
    }

    /// An entry counts as translated when every form it needs is non-empty.
    pub fn has_translation(&self) -> bool {
        if self.is_plural() {
            !self.msgstr_plural.is_empty() && self.msgstr_plural.values().all(|s| !s.is_empty())
        } else {
            !self.msgstr.is_empty()
        }
    }

    pub fn clear_fuzzy(&mut self) -> bool {
        self.flags.shift_remove(FUZZY_FLAG)
    }
}

/// Ordered collection of entries keyed by msgid.
///
/// Equality compares contents and ignores ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: IndexMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry with the same msgid.
    ///
    /// A replaced entry keeps its original position and is returned.
    pub fn insert(&mut self, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.insert(entry.msgid.clone(), entry)
    }

    pub fn get(&self, msgid: &str) -> Option<&CatalogEntry> {
        self.entries.get(msgid)
    }

    pub fn get_mut(&mut self, msgid: &str) -> Option<&mut CatalogEntry> {
        self.entries.get_mut(msgid)
    }

    pub fn contains(&self, msgid: &str) -> bool {
        self.entries.contains_key(msgid)
    }

    pub fn header(&self) -> Option<&CatalogEntry> {
        self.entries.get("")
    }

    /// Install or replace the header msgstr. A new header is moved to the front.
    pub fn set_header(&mut self, msgstr: impl Into<String>) {
        let msgstr = msgstr.into();
        match self.entries.get_mut("") {
            Some(header) => header.msgstr = msgstr,
            None => {
                self.entries
                    .shift_insert(0, String::new(), CatalogEntry::translated("", msgstr));
            }
        }
    }

    /// All entries including the header, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// All entries except the header.
    pub fn messages(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values().filter(|e| !e.is_header())
    }

    pub fn untranslated(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.messages().filter(|e| !e.has_translation())
    }

    /// Number of entries including the header.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries excluding the header.
    pub fn message_count(&self) -> usize {
        self.messages().count()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plural_entry() -> CatalogEntry {
        let mut entry = CatalogEntry::new("%d file");
        entry.msgid_plural = Some("%d files".to_string());
        entry.msgstr_plural.insert(0, "%d Datei".to_string());
        entry.msgstr_plural.insert(1, "%d Dateien".to_string());
        entry
    }

    #[test]
    fn test_insert_duplicate_keeps_position_and_replaces_content() {
        let mut catalog = Catalog::new();
        catalog.insert(CatalogEntry::translated("A", "1"));
        catalog.insert(CatalogEntry::translated("B", "2"));
        let previous = catalog.insert(CatalogEntry::translated("A", "3"));

        assert_eq!(previous.map(|e| e.msgstr), Some("1".to_string()));
        let order: Vec<_> = catalog.iter().map(|e| e.msgid.as_str()).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(catalog.get("A").map(|e| e.msgstr.as_str()), Some("3"));
    }

    #[test]
    fn test_set_header_moves_new_header_to_front() {
        let mut catalog = Catalog::new();
        catalog.insert(CatalogEntry::translated("Save", "Speichern"));
        catalog.set_header("Language: de_DE\n");

        assert!(catalog.iter().next().is_some_and(CatalogEntry::is_header));
        assert_eq!(catalog.message_count(), 1);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Catalog = vec![
            CatalogEntry::translated("A", "1"),
            CatalogEntry::translated("B", "2"),
        ]
        .into_iter()
        .collect();
        let b: Catalog = vec![
            CatalogEntry::translated("B", "2"),
            CatalogEntry::translated("A", "1"),
        ]
        .into_iter()
        .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plural_singular_translation() {
        let mut entry = plural_entry();
        assert_eq!(entry.singular_translation(), "%d Datei");
        assert!(entry.has_translation());

        assert!(entry.set_singular_translation("%d Akte"));
        assert!(!entry.set_singular_translation("%d Akte"));
        assert_eq!(entry.msgstr_plural.get(&0).map(String::as_str), Some("%d Akte"));
        assert!(entry.msgstr.is_empty());
    }

    #[test]
    fn test_plural_with_empty_slot_is_untranslated() {
        let mut entry = plural_entry();
        entry.msgstr_plural.insert(1, String::new());
        assert!(!entry.has_translation());
    }

    #[test]
    fn test_clear_fuzzy() {
        let mut entry = CatalogEntry::translated("Save", "Speichern");
        entry.flags.insert("php-format".to_string());
        entry.flags.insert(FUZZY_FLAG.to_string());
        assert!(entry.is_fuzzy());
        assert!(entry.clear_fuzzy());
        assert!(!entry.is_fuzzy());
        assert!(entry.flags.contains("php-format"));
    }
}
