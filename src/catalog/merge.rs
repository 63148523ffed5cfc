//! Applying translations to catalogs.
//!
//! [`merge`], [`merge_with_template`] and [`sync_with_template`] are pure.
//! [`Merger`] adds the file side: backup, then overwrite.

use super::entry::{Catalog, CatalogEntry};
use super::parser::parse;
use super::serializer::PoSerializer;
use crate::error::Result;
use crate::storage::{create_backup, Storage};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Source string → translation, in import order.
pub type Translations = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub catalog: Catalog,
    /// Entries whose translation actually changed value
    pub updated: usize,
}

/// Apply translations to `base`.
///
/// Existing entries get the new translation and lose their fuzzy flag;
/// unknown msgids are appended as bare entries. Empty translations and the
/// header key are ignored.
pub fn merge(base: &Catalog, translations: &Translations) -> MergeOutcome {
    let mut catalog = base.clone();
    let mut updated = 0;

    for (msgid, msgstr) in translations {
        if msgstr.is_empty() || msgid.is_empty() {
            continue;
        }
        if apply(&mut catalog, msgid, msgstr, || {
            Some(CatalogEntry::new(msgid.as_str()))
        }) {
            updated += 1;
        }
    }

    MergeOutcome { catalog, updated }
}

/// Like [`merge`], but msgids missing from `base` are seeded from the
/// template entry (comments, references, plural source). Translations for
/// msgids unknown to the template are skipped.
pub fn merge_with_template(
    base: &Catalog,
    template: &Catalog,
    translations: &Translations,
) -> MergeOutcome {
    let mut catalog = base.clone();
    let mut updated = 0;
    let mut skipped = 0;

    for (msgid, msgstr) in translations {
        if msgstr.is_empty() || msgid.is_empty() {
            continue;
        }
        let seed = || template.get(msgid).map(untranslated_copy);
        if !catalog.contains(msgid) && !template.contains(msgid) {
            skipped += 1;
            debug!("Skipping translation for msgid not in template: {:?}", msgid);
            continue;
        }
        if apply(&mut catalog, msgid, msgstr, seed) {
            updated += 1;
        }
    }

    if skipped > 0 {
        warn!("{} translations skipped: msgid not present in template", skipped);
    }
    MergeOutcome { catalog, updated }
}

/// Set the translation for `msgid`, creating the entry with `seed` if needed.
fn apply(
    catalog: &mut Catalog,
    msgid: &str,
    msgstr: &str,
    seed: impl FnOnce() -> Option<CatalogEntry>,
) -> bool {
    if !catalog.contains(msgid) {
        match seed() {
            Some(entry) => {
                catalog.insert(entry);
            }
            None => return false,
        }
    }
    let Some(entry) = catalog.get_mut(msgid) else {
        return false;
    };
    let changed = entry.set_singular_translation(msgstr);
    entry.clear_fuzzy();
    changed
}

fn untranslated_copy(entry: &CatalogEntry) -> CatalogEntry {
    CatalogEntry {
        msgstr: String::new(),
        msgstr_plural: Default::default(),
        ..entry.clone()
    }
}

/// Rebuild `translated` against a fresh template, msgmerge-style.
///
/// The result follows template order and carries template comments and
/// references. Translations and flags come from `translated`; the header
/// comes from `translated` when it has one.
pub fn sync_with_template(template: &Catalog, translated: &Catalog) -> Catalog {
    let mut catalog = Catalog::new();

    if let Some(header) = translated.header().or_else(|| template.header()) {
        catalog.insert(header.clone());
    }
    for source in template.messages() {
        let mut entry = source.clone();
        if let Some(existing) = translated.get(&source.msgid) {
            entry.msgstr = existing.msgstr.clone();
            entry.msgstr_plural = existing.msgstr_plural.clone();
            entry.flags.extend(existing.flags.iter().cloned());
        }
        catalog.insert(entry);
    }
    catalog
}

/// Applies translations to a PO file through a [`Storage`].
pub struct Merger<'a, S: Storage + ?Sized> {
    storage: &'a S,
    serializer: PoSerializer,
    backup_dir: PathBuf,
    dry_run: bool,
    stamp_revision: bool,
}

impl<'a, S: Storage + ?Sized> Merger<'a, S> {
    pub fn new(storage: &'a S, serializer: PoSerializer, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            serializer,
            backup_dir: backup_dir.into(),
            dry_run: false,
            stamp_revision: false,
        }
    }

    /// In dry-run mode nothing is written; counts still reflect what would change.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Rewrite the header's `PO-Revision-Date` from the serializer metadata
    /// on every persisted merge.
    pub fn stamp_revision(mut self, stamp: bool) -> Self {
        self.stamp_revision = stamp;
        self
    }

    /// Merge `translations` into the PO file at `po_path`.
    ///
    /// The merged catalog is fully computed before any write. The previous
    /// bytes are backed up before the PO file is overwritten.
    pub fn apply(
        &self,
        po_path: &Path,
        template: Option<&Catalog>,
        translations: &Translations,
    ) -> Result<MergeOutcome> {
        let base = if self.storage.exists(po_path) {
            parse(&self.storage.read_to_string(po_path)?)
        } else {
            Catalog::new()
        };

        let mut outcome = match template {
            Some(template) => merge_with_template(&base, template, translations),
            None => merge(&base, translations),
        };

        if self.dry_run {
            info!(
                "Dry run mode - would update {} translations in {}",
                outcome.updated,
                po_path.display()
            );
            return Ok(outcome);
        }

        if self.stamp_revision {
            self.serializer.metadata().stamp_revision_date(&mut outcome.catalog);
        }
        self.persist(po_path, &outcome.catalog)?;
        info!(
            "Updated {} translations in {}",
            outcome.updated,
            po_path.display()
        );
        Ok(outcome)
    }

    /// Back up the current file, then write `catalog` in its place.
    pub fn persist(&self, po_path: &Path, catalog: &Catalog) -> Result<()> {
        let text = self.serializer.serialize(catalog);
        create_backup(self.storage, po_path, &self.backup_dir)?;
        self.storage.write(po_path, text.as_bytes())
    }
}
