//! Catalog maintenance commands.
//!
//! Each command reads its inputs through the [`Storage`] port and is driven
//! by an explicit [`Config`]. Dry-run mode computes everything but writes
//! no catalog, backup or MO file.

use crate::catalog::{
    check_mo_freshness, check_mo_size, parse, sync_with_template, validate, Catalog, MergeOutcome, Merger,
    MoCompiler, MoOptions, MoStats, PoSerializer, Translations, ValidationReport,
};
use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::extract::{export_all, prioritize, total, Category, ExportPaths, Prioritized};
use crate::import::import_file;
use crate::storage::Storage;
use crate::translation::{translate_in_batches, TranslationProvider};
use chrono::Local;
use std::path::Path;
use tracing::{info, warn};

/// Coverage of the PO file against its template.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: ValidationReport,
    pub untranslated: Prioritized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateSummary {
    /// Strings sent to the provider
    pub requested: usize,
    /// Translations received
    pub translated: usize,
    pub failed_batches: usize,
    /// Catalog entries whose translation changed
    pub updated: usize,
    pub mo: Option<MoStats>,
}

pub struct Workflow<S: Storage> {
    storage: S,
    config: Config,
}

impl<S: Storage> Workflow<S> {
    pub fn new(storage: S, config: Config) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn read_catalog(&self, path: &Path) -> Result<Catalog> {
        Ok(parse(&self.storage.read_to_string(path)?))
    }

    fn read_catalog_or_empty(&self, path: &Path) -> Result<Catalog> {
        if self.storage.exists(path) {
            self.read_catalog(path)
        } else {
            warn!("File not found: {}", path.display());
            Ok(Catalog::new())
        }
    }

    fn template(&self) -> Result<Option<Catalog>> {
        if self.storage.exists(&self.config.pot_file) {
            self.read_catalog(&self.config.pot_file).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Measure `translated` against the template's strings, when one exists.
    fn against_template(&self, translated: Catalog) -> Result<Catalog> {
        Ok(match self.template()? {
            Some(template) => sync_with_template(&template, &translated),
            None => translated,
        })
    }

    fn merger(&self) -> Merger<'_, S> {
        let metadata = self.config.header.clone().with_revision_date(Local::now());
        Merger::new(
            &self.storage,
            PoSerializer::new(metadata),
            &self.config.backup_dir,
        )
        .dry_run(self.config.dry_run)
        .stamp_revision(true)
    }

    fn apply(&self, translations: &Translations) -> Result<MergeOutcome> {
        let template = self.template()?;
        self.merger()
            .apply(&self.config.po_file, template.as_ref(), translations)
    }

    /// Report PO coverage against the template (or against itself when no
    /// template exists) and group what is still untranslated.
    pub fn analyze(&self) -> Result<Analysis> {
        info!("Analyzing translation status...");
        let catalog = self.against_template(self.read_catalog_or_empty(&self.config.po_file)?)?;

        let report = validate(&catalog, &self.config.coverage_gate());
        let untranslated = prioritize(catalog.untranslated());

        info!(
            "Total: {}, translated: {} ({:.2}%), untranslated: {}, fuzzy: {}",
            report.total_entries,
            report.translated_count,
            report.coverage_percent,
            report.empty_count,
            report.fuzzy_count
        );
        for (category, entries) in &untranslated {
            if !entries.is_empty() {
                info!("{:<15}: {} strings", category.label(), entries.len());
            }
        }

        Ok(Analysis {
            report,
            untranslated,
        })
    }

    /// Export untranslated strings for human translators. Returns `None`
    /// when there is nothing to export.
    pub fn extract(&self) -> Result<Option<ExportPaths>> {
        let analysis = self.analyze()?;
        let count = total(&analysis.untranslated);
        if count == 0 {
            info!("No untranslated strings found!");
            return Ok(None);
        }

        let source_file = self
            .config
            .pot_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let paths = export_all(
            &self.storage,
            &self.config.export_dir,
            &analysis.untranslated,
            &source_file,
            Local::now(),
        )?;
        info!(
            "Extracted {} untranslated strings to {}",
            count,
            self.config.export_dir.display()
        );
        Ok(Some(paths))
    }

    /// Machine-translate untranslated strings, merge them and recompile.
    ///
    /// Frontend strings go first and debug strings last. Failed batches
    /// are logged and skipped; whatever was translated is still merged.
    /// Plural entries are left to human translators: a merge only fills
    /// their first form.
    pub async fn translate<P: TranslationProvider>(&self, provider: &P) -> Result<TranslateSummary> {
        info!("Starting automatic translation...");
        let analysis = self.analyze()?;

        let (plural, singular): (Vec<_>, Vec<_>) = Category::TRANSLATION_ORDER
            .iter()
            .filter_map(|category| analysis.untranslated.get(category))
            .flatten()
            .partition(|entry| entry.is_plural());
        if !plural.is_empty() {
            info!(
                "Skipping {} plural entries; export them with extract for manual translation",
                plural.len()
            );
        }
        let texts: Vec<String> = singular.iter().map(|entry| entry.msgid.clone()).collect();

        let mut summary = TranslateSummary {
            requested: texts.len(),
            ..TranslateSummary::default()
        };
        if texts.is_empty() {
            info!("No untranslated strings found!");
            return Ok(summary);
        }

        let outcome = translate_in_batches(
            provider,
            &texts,
            self.config.batch_size,
            self.config.batch_delay,
        )
        .await;
        summary.translated = outcome.translations.len();
        summary.failed_batches = outcome.failures.len();

        if !outcome.failures.is_empty() {
            warn!(
                "{} of {} batches failed; re-run translate to retry the remaining strings",
                outcome.failures.len(),
                outcome.batches
            );
        }
        if outcome.translations.is_empty() {
            warn!("No translations received");
            return Ok(summary);
        }
        info!("Successfully translated {} strings", summary.translated);

        summary.updated = self.apply(&outcome.translations)?.updated;
        if summary.updated > 0 {
            summary.mo = self.compile()?;
        }
        Ok(summary)
    }

    /// Merge a CSV, JSON or text-template file into the PO file, then
    /// recompile the MO file when anything changed.
    pub fn import(&self, path: &Path) -> Result<MergeOutcome> {
        let translations = import_file(&self.storage, path)?;
        if translations.is_empty() {
            return Err(CatalogError::Import {
                path: path.to_path_buf(),
                message: "no translations found in file".to_string(),
            });
        }
        info!("Importing {} translations...", translations.len());
        let outcome = self.apply(&translations)?;
        if !self.config.dry_run && outcome.updated > 0 {
            self.compile()?;
        }
        Ok(outcome)
    }

    /// Same as [`Workflow::import`].
    pub fn merge(&self, path: &Path) -> Result<MergeOutcome> {
        self.import(path)
    }

    /// Compile the PO file to MO. Returns `None` in dry-run mode.
    pub fn compile(&self) -> Result<Option<MoStats>> {
        let catalog = self.read_catalog(&self.config.po_file)?;
        if self.config.dry_run {
            info!(
                "Dry run mode - would compile {} to {}",
                self.config.po_file.display(),
                self.config.mo_file.display()
            );
            return Ok(None);
        }
        MoCompiler::new(self.config.header.clone(), MoOptions::default())
            .write(&self.storage, &self.config.mo_file, &catalog)
            .map(Some)
    }

    /// Validate the PO file against the template, then check that its
    /// compiled MO is fresh and small enough to deploy.
    pub fn validate(&self) -> Result<ValidationReport> {
        let catalog = self.against_template(self.read_catalog(&self.config.po_file)?)?;
        let mut report = validate(&catalog, &self.config.coverage_gate());
        report.findings.extend(check_mo_freshness(
            &self.storage,
            &self.config.po_file,
            &self.config.mo_file,
        ));
        report
            .findings
            .extend(check_mo_size(&self.storage, &self.config.mo_file));

        if report.passes_gate() {
            info!("Coverage gate passed ({:.2}%)", report.coverage_percent);
        } else {
            for finding in report.errors() {
                warn!("Validation failed: {}", finding.message);
            }
        }
        Ok(report)
    }

    /// Analyze, export, translate when a provider is available, compile,
    /// then validate.
    pub async fn full<P: TranslationProvider>(&self, provider: Option<&P>) -> Result<ValidationReport> {
        info!("Running full translation workflow...");
        self.extract()?;

        let compiled = match provider {
            Some(provider) => self.translate(provider).await?.mo.is_some(),
            None => {
                info!("No translation provider configured, skipping automatic translation");
                false
            }
        };

        if !compiled && self.storage.exists(&self.config.po_file) {
            self.compile()?;
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{read_u32_le, CoverageGate, HeaderMetadata, MO_MAGIC, MO_SIZE_LIMIT};
    use crate::storage::MemoryStorage;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    const POT: &str = r#"msgid ""
msgstr "Content-Type: text/plain; charset=UTF-8\n"

#: templates/frontend/vote.php:12
msgid "Vote now"
msgstr ""

#: includes/admin/settings.php:40
msgid "Settings"
msgstr ""

#: debug/dump.php:3
msgid "Dump"
msgstr ""

#: includes/core.php:1
msgid "Save"
msgstr ""
"#;

    const PO: &str = r#"msgid ""
msgstr "Language: de_DE\n"

msgid "Save"
msgstr "Speichern"
"#;

    fn create_test_config() -> Config {
        Config {
            pot_file: PathBuf::from("lang/messages.pot"),
            po_file: PathBuf::from("lang/messages-de_DE.po"),
            mo_file: PathBuf::from("lang/messages-de_DE.mo"),
            backup_dir: PathBuf::from("lang/backups"),
            export_dir: PathBuf::from("exports"),
            deepl_api_key: None,
            deepl_api_url: "http://localhost/v2/translate".to_string(),
            source_lang: "EN".to_string(),
            target_lang: "DE".to_string(),
            batch_size: 2,
            batch_delay: Duration::ZERO,
            min_coverage: 95.0,
            warn_coverage: 98.0,
            header: HeaderMetadata::default(),
            dry_run: false,
        }
    }

    fn workflow(config: Config) -> Workflow<MemoryStorage> {
        let storage = MemoryStorage::new()
            .with_file("lang/messages.pot", POT)
            .with_file("lang/messages-de_DE.po", PO);
        Workflow::new(storage, config)
    }

    /// Prefixes each string with "DE:" and records the order it saw them in.
    struct RecordingProvider {
        seen: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                seen: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TranslationProvider for RecordingProvider {
        async fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen.lock() {
                seen.extend(texts.iter().cloned());
            }
            Ok(texts.iter().map(|t| format!("DE:{}", t)).collect())
        }
    }

    fn po_text(workflow: &Workflow<MemoryStorage>) -> String {
        workflow
            .storage()
            .read_to_string(&workflow.config().po_file)
            .expect("po")
    }

    #[test]
    fn test_analyze_against_template() {
        let analysis = workflow(create_test_config()).analyze().expect("analyze");

        assert_eq!(analysis.report.total_entries, 4);
        assert_eq!(analysis.report.translated_count, 1);
        assert_eq!(analysis.report.coverage_percent, 25.0);
        assert!(!analysis.report.passes_gate());
        assert_eq!(total(&analysis.untranslated), 3);
        assert_eq!(analysis.untranslated[&Category::Frontend].len(), 1);
    }

    #[test]
    fn test_analyze_without_any_files() {
        let wf = Workflow::new(MemoryStorage::new(), create_test_config());
        let analysis = wf.analyze().expect("analyze");
        assert_eq!(analysis.report.total_entries, 0);
        assert_eq!(analysis.report.coverage_percent, 0.0);
    }

    #[test]
    fn test_extract_writes_three_exports() {
        let wf = workflow(create_test_config());
        let paths = wf.extract().expect("extract").expect("paths");

        assert!(paths.csv.starts_with("exports"));
        assert!(wf.storage().exists(&paths.csv));
        assert!(wf.storage().exists(&paths.json));
        assert!(wf.storage().exists(&paths.template));
        let json = wf.storage().read_to_string(&paths.json).expect("json");
        assert!(json.contains("\"source_file\": \"messages.pot\""));
    }

    #[test]
    fn test_import_json_merges_backs_up_and_stamps() {
        let wf = workflow(create_test_config());
        wf.storage().insert(
            "in/de.json",
            r#"{"translations": {"Settings": "Einstellungen", "Unknown": "Unbekannt"}}"#,
            SystemTime::now(),
        );

        let outcome = wf.import(Path::new("in/de.json")).expect("import");

        assert_eq!(outcome.updated, 1);
        assert!(wf.storage().exists(&wf.config().mo_file));
        let po = parse(&po_text(&wf));
        let settings = po.get("Settings").expect("seeded from template");
        assert_eq!(settings.msgstr, "Einstellungen");
        assert_eq!(settings.references, vec!["includes/admin/settings.php:40"]);
        assert!(!po.contains("Unknown"));
        assert!(po
            .header()
            .is_some_and(|h| h.msgstr.contains("PO-Revision-Date: ")));

        let backups: Vec<PathBuf> = wf
            .storage()
            .paths()
            .into_iter()
            .filter(|p| p.starts_with("lang/backups"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            wf.storage().read(&backups[0]).expect("backup"),
            PO.as_bytes()
        );
    }

    #[test]
    fn test_import_recompiles_stale_mo() {
        let wf = workflow(create_test_config());
        let old = SystemTime::now() - Duration::from_secs(3600);
        wf.storage().insert("lang/messages-de_DE.mo", vec![0u8; 4], old);
        wf.storage()
            .insert("in/de.json", r#"{"Dump": "Ausgabe"}"#, SystemTime::now());

        wf.import(Path::new("in/de.json")).expect("import");

        let mo = wf.storage().read(&wf.config().mo_file).expect("mo");
        assert_eq!(read_u32_le(&mo, 0), Some(MO_MAGIC));
        assert_eq!(read_u32_le(&mo, 8), Some(3));
        let report = wf.validate().expect("validate");
        assert!(!report.warnings().any(|f| f.message.contains("MO file")));
    }

    #[test]
    fn test_import_empty_file_is_an_error() {
        let wf = workflow(create_test_config());
        wf.storage()
            .insert("in/empty.json", "{}", SystemTime::now());
        let err = wf.merge(Path::new("in/empty.json")).expect_err("empty");
        assert!(matches!(err, CatalogError::Import { .. }));
    }

    #[test]
    fn test_dry_run_import_writes_nothing() {
        let wf = workflow(Config {
            dry_run: true,
            ..create_test_config()
        });
        wf.storage().insert(
            "in/de.csv",
            "1,Frontend,Vote now,Jetzt abstimmen\n",
            SystemTime::now(),
        );
        let before = wf.storage().paths();

        let outcome = wf.import(Path::new("in/de.csv")).expect("import");

        assert_eq!(outcome.updated, 1);
        assert_eq!(wf.storage().paths(), before);
        assert_eq!(po_text(&wf), PO);
    }

    #[tokio::test]
    async fn test_translate_in_priority_order_then_compiles() {
        let wf = workflow(create_test_config());
        let provider = RecordingProvider::new();

        let summary = wf.translate(&provider).await.expect("translate");

        assert_eq!(summary.requested, 3);
        assert_eq!(summary.translated, 3);
        assert_eq!(summary.updated, 3);
        assert_eq!(summary.failed_batches, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let seen = provider.seen.lock().expect("lock").clone();
        assert_eq!(seen, vec!["Vote now", "Settings", "Dump"]);

        let po = parse(&po_text(&wf));
        assert_eq!(po.get("Dump").map(|e| e.msgstr.as_str()), Some("DE:Dump"));

        let stats = summary.mo.expect("compiled");
        assert_eq!(stats.strings, 5);
        let mo = wf.storage().read(&wf.config().mo_file).expect("mo");
        assert_eq!(read_u32_le(&mo, 0), Some(MO_MAGIC));
    }

    #[tokio::test]
    async fn test_translate_skips_plural_entries() {
        let pot = format!(
            "{}\n#: templates/frontend/list.php:7\nmsgid \"%d vote\"\nmsgid_plural \"%d votes\"\nmsgstr[0] \"\"\nmsgstr[1] \"\"\n",
            POT
        );
        let wf = Workflow::new(
            MemoryStorage::new()
                .with_file("lang/messages.pot", pot)
                .with_file("lang/messages-de_DE.po", PO),
            create_test_config(),
        );
        let provider = RecordingProvider::new();

        let summary = wf.translate(&provider).await.expect("translate");

        assert_eq!(summary.requested, 3);
        let seen = provider.seen.lock().expect("lock").clone();
        assert!(!seen.iter().any(|s| s == "%d vote"));
        let analysis = wf.analyze().expect("analyze");
        assert_eq!(analysis.report.empty, vec!["%d vote"]);
    }

    #[tokio::test]
    async fn test_translate_nothing_to_do() {
        let wf = Workflow::new(
            MemoryStorage::new().with_file("lang/messages-de_DE.po", PO),
            create_test_config(),
        );
        let provider = RecordingProvider::new();
        let summary = wf.translate(&provider).await.expect("translate");
        assert_eq!(summary, TranslateSummary::default());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_compile_requires_po_file() {
        let wf = Workflow::new(MemoryStorage::new(), create_test_config());
        assert!(matches!(wf.compile(), Err(CatalogError::Read { .. })));
    }

    #[test]
    fn test_validate_flags_stale_mo() {
        let wf = workflow(create_test_config());
        let old = SystemTime::now() - Duration::from_secs(3600);
        wf.storage().insert("lang/messages-de_DE.mo", vec![0u8; 4], old);

        let report = wf.validate().expect("validate");
        assert!(report.warnings().any(|f| f.message.contains("outdated")));
    }

    #[test]
    fn test_validate_counts_template_only_strings() {
        let wf = workflow(create_test_config());
        wf.compile().expect("compile");

        let report = wf.validate().expect("validate");

        assert_eq!(report.total_entries, 4);
        assert_eq!(report.translated_count, 1);
        assert_eq!(report.coverage_percent, 25.0);
        assert_eq!(report.empty, vec!["Vote now", "Settings", "Dump"]);
        assert!(!report.passes_gate());
    }

    #[test]
    fn test_validate_gate_uses_configured_minimum() {
        let wf = workflow(Config {
            min_coverage: 25.0,
            warn_coverage: 30.0,
            ..create_test_config()
        });
        wf.compile().expect("compile");
        let report = wf.validate().expect("validate");
        assert_eq!(report.coverage_percent, 25.0);
        assert!(report.passes_gate());
        assert!(report.warnings().any(|f| f.message.contains("below 30.00%")));
        assert_eq!(wf.config().coverage_gate(), CoverageGate { minimum: 25.0, warning: 30.0 });
    }

    #[test]
    fn test_validate_rejects_oversized_mo() {
        let wf = workflow(create_test_config());
        let future = SystemTime::now() + Duration::from_secs(60);
        wf.storage().insert(
            "lang/messages-de_DE.mo",
            vec![0u8; MO_SIZE_LIMIT as usize + 1],
            future,
        );
        let report = wf.validate().expect("validate");
        assert!(report.errors().any(|f| f.message.contains("exceeds 2MB limit")));
    }

    #[tokio::test]
    async fn test_full_without_provider_compiles_and_validates() {
        let wf = workflow(create_test_config());
        let report = wf
            .full(None::<&RecordingProvider>)
            .await
            .expect("full");

        assert!(wf.storage().exists(&wf.config().mo_file));
        assert!(!report.warnings().any(|f| f.message.contains("MO file")));
        assert!(wf
            .storage()
            .paths()
            .iter()
            .any(|p| p.starts_with("exports")));
    }

    #[tokio::test]
    async fn test_full_with_provider_reaches_gate() {
        let wf = workflow(create_test_config());
        let provider = RecordingProvider::new();
        let report = wf.full(Some(&provider)).await.expect("full");

        assert_eq!(report.total_entries, 4);
        assert_eq!(report.coverage_percent, 100.0);
        assert!(report.passes_gate());
    }
}
