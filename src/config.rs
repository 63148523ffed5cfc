use crate::catalog::{CoverageGate, HeaderMetadata};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Catalog files
    pub pot_file: PathBuf,
    pub po_file: PathBuf,
    pub mo_file: PathBuf,
    pub backup_dir: PathBuf,
    pub export_dir: PathBuf,

    // Translation provider (DeepL)
    pub deepl_api_key: Option<String>,
    pub deepl_api_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub batch_size: usize,
    pub batch_delay: Duration,

    // Coverage gate
    pub min_coverage: f64,
    pub warn_coverage: f64,

    // Header metadata
    pub header: HeaderMetadata,

    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let lang_dir = PathBuf::from(
            std::env::var("CATALOG_LANG_DIR").unwrap_or_else(|_| "languages".to_string()),
        );
        let domain = std::env::var("CATALOG_DOMAIN").unwrap_or_else(|_| "messages".to_string());
        let locale = std::env::var("CATALOG_LOCALE").unwrap_or_else(|_| "de_DE".to_string());

        let config = Self {
            // Catalog files - derived from <lang_dir>/<domain>[-<locale>]
            pot_file: std::env::var("CATALOG_POT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| lang_dir.join(format!("{}.pot", domain))),
            po_file: std::env::var("CATALOG_PO_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| lang_dir.join(format!("{}-{}.po", domain, locale))),
            mo_file: std::env::var("CATALOG_MO_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| lang_dir.join(format!("{}-{}.mo", domain, locale))),
            backup_dir: std::env::var("CATALOG_BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| lang_dir.join("backups")),
            export_dir: std::env::var("CATALOG_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("exports")),

            // DeepL
            deepl_api_key: std::env::var("DEEPL_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            deepl_api_url: std::env::var("DEEPL_API_URL")
                .unwrap_or_else(|_| "https://api-free.deepl.com/v2/translate".to_string()),
            source_lang: std::env::var("TRANSLATE_SOURCE_LANG")
                .unwrap_or_else(|_| "EN".to_string()),
            target_lang: std::env::var("TRANSLATE_TARGET_LANG")
                .unwrap_or_else(|_| "DE".to_string()),
            batch_size: std::env::var("TRANSLATE_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            batch_delay: Duration::from_millis(
                std::env::var("TRANSLATE_BATCH_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),

            // Coverage gate
            min_coverage: std::env::var("MIN_COVERAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(95.0),
            warn_coverage: std::env::var("WARN_COVERAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(98.0),

            header: header_from_env(&locale),

            dry_run: false,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make later commands misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("TRANSLATE_BATCH_SIZE must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.min_coverage) {
            bail!("MIN_COVERAGE must be between 0 and 100, got {}", self.min_coverage);
        }
        if self.warn_coverage < self.min_coverage {
            bail!(
                "WARN_COVERAGE ({}) must not be below MIN_COVERAGE ({})",
                self.warn_coverage,
                self.min_coverage
            );
        }
        Ok(())
    }

    pub fn coverage_gate(&self) -> CoverageGate {
        CoverageGate {
            minimum: self.min_coverage,
            warning: self.warn_coverage,
        }
    }
}

fn header_from_env(locale: &str) -> HeaderMetadata {
    let defaults = HeaderMetadata::default();
    let var = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);

    HeaderMetadata {
        project_id_version: var("CATALOG_PROJECT", defaults.project_id_version.clone()),
        report_msgid_bugs_to: var("CATALOG_BUGS_TO", defaults.report_msgid_bugs_to.clone()),
        last_translator: var("CATALOG_LAST_TRANSLATOR", defaults.last_translator.clone()),
        language_team: var("CATALOG_LANGUAGE_TEAM", defaults.language_team.clone()),
        language: locale.to_string(),
        plural_forms: var("CATALOG_PLURAL_FORMS", defaults.plural_forms.clone()),
        ..defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "CATALOG_LANG_DIR",
        "CATALOG_DOMAIN",
        "CATALOG_LOCALE",
        "CATALOG_PO_FILE",
        "DEEPL_API_KEY",
        "TRANSLATE_BATCH_SIZE",
        "MIN_COVERAGE",
        "WARN_COVERAGE",
        "CATALOG_PROJECT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().expect("config");

        assert_eq!(config.po_file, PathBuf::from("languages/messages-de_DE.po"));
        assert_eq!(config.pot_file, PathBuf::from("languages/messages.pot"));
        assert_eq!(config.mo_file, PathBuf::from("languages/messages-de_DE.mo"));
        assert_eq!(config.backup_dir, PathBuf::from("languages/backups"));
        assert_eq!(config.deepl_api_key, None);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.batch_delay, Duration::from_secs(1));
        assert_eq!(config.coverage_gate(), CoverageGate::default());
        assert_eq!(config.header.language, "de_DE");
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("CATALOG_LANG_DIR", "i18n");
        std::env::set_var("CATALOG_DOMAIN", "shop");
        std::env::set_var("CATALOG_LOCALE", "fr_FR");
        std::env::set_var("DEEPL_API_KEY", "key-123");
        std::env::set_var("TRANSLATE_BATCH_SIZE", "10");
        std::env::set_var("CATALOG_PROJECT", "Shop 2.0");

        let config = Config::from_env().expect("config");
        clear_env();

        assert_eq!(config.po_file, PathBuf::from("i18n/shop-fr_FR.po"));
        assert_eq!(config.deepl_api_key.as_deref(), Some("key-123"));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.header.project_id_version, "Shop 2.0");
        assert_eq!(config.header.language, "fr_FR");
    }

    #[test]
    #[serial]
    fn test_empty_api_key_is_none() {
        clear_env();
        std::env::set_var("DEEPL_API_KEY", "");
        let config = Config::from_env().expect("config");
        clear_env();
        assert_eq!(config.deepl_api_key, None);
    }

    #[test]
    #[serial]
    fn test_rejects_inverted_thresholds() {
        clear_env();
        std::env::set_var("MIN_COVERAGE", "99");
        std::env::set_var("WARN_COVERAGE", "90");
        let result = Config::from_env();
        clear_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("WARN_COVERAGE"));
    }
}
