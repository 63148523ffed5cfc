use crate::catalog::Translations;
use crate::config::Config;
use crate::error::{CatalogError, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Machine translation backend.
///
/// The response must be aligned by index with the request.
#[allow(async_fn_in_trait)]
pub trait TranslationProvider {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>>;
}

/// DeepL translate endpoint response
#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

/// DeepL REST client (form-encoded `/v2/translate`).
#[derive(Debug, Clone)]
pub struct DeepLProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    source_lang: String,
    target_lang: String,
}

impl DeepLProvider {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    /// Build a client from configuration. Fails without an API key.
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self> {
        let api_key = config.deepl_api_key.clone().ok_or_else(|| {
            CatalogError::Config(
                "DeepL API key not configured. Set DEEPL_API_KEY environment variable.".to_string(),
            )
        })?;
        Ok(Self::new(
            client,
            &config.deepl_api_url,
            api_key,
            &config.source_lang,
            &config.target_lang,
        ))
    }

    fn form<'a>(&'a self, texts: &'a [String]) -> Vec<(&'static str, &'a str)> {
        let mut form: Vec<(&'static str, &'a str)> =
            texts.iter().map(|t| ("text", t.as_str())).collect();
        form.push(("source_lang", self.source_lang.as_str()));
        form.push(("target_lang", self.target_lang.as_str()));
        form.push(("tag_handling", "xml"));
        form.push(("preserve_formatting", "1"));
        form
    }
}

impl TranslationProvider for DeepLProvider {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&self.form(texts))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| CatalogError::Provider {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: format!("Failed to send translation request to DeepL: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(CatalogError::Provider {
                status: status.as_u16(),
                message: format!("DeepL API error: {}", body),
            });
        }

        let parsed: DeepLResponse = response.json().await.map_err(|e| CatalogError::Provider {
            status: status.as_u16(),
            message: format!("Invalid DeepL response: {}", e),
        })?;

        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }
}

/// A batch that failed; its strings stay untranslated.
#[derive(Debug)]
pub struct BatchFailure {
    /// 1-based batch number
    pub batch: usize,
    pub size: usize,
    pub error: CatalogError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub translations: Translations,
    pub batches: usize,
    pub failures: Vec<BatchFailure>,
}

/// Translate `texts` in sequential batches of `batch_size`, sleeping
/// `delay` between batches.
///
/// A failed batch is recorded and skipped; translations from earlier
/// batches are kept. Empty results are dropped.
pub async fn translate_in_batches<P: TranslationProvider>(
    provider: &P,
    texts: &[String],
    batch_size: usize,
    delay: Duration,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let batches: Vec<&[String]> = texts.chunks(batch_size.max(1)).collect();
    let total = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        outcome.batches += 1;
        debug!("Dispatching batch {}/{} ({} strings)", index + 1, total, batch.len());

        match provider.translate(batch).await {
            Ok(results) => {
                if results.len() != batch.len() {
                    warn!(
                        "Batch {}: provider returned {} translations for {} strings",
                        index + 1,
                        results.len(),
                        batch.len()
                    );
                }
                let mut accepted = 0;
                for (source, translated) in batch.iter().zip(results) {
                    if !translated.is_empty() {
                        outcome.translations.insert(source.clone(), translated);
                        accepted += 1;
                    }
                }
                info!("Batch {} completed: {} strings", index + 1, accepted);
            }
            Err(error) => {
                warn!("Batch {} failed: {}", index + 1, error);
                outcome.failures.push(BatchFailure {
                    batch: index + 1,
                    size: batch.len(),
                    error,
                });
            }
        }

        // Rate limiting
        if index + 1 < total && !delay.is_zero() {
            sleep(delay).await;
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    /// Upper-cases input; fails the batch whose 1-based number is `fail_batch`.
    struct FakeProvider {
        calls: AtomicUsize,
        fail_batch: Option<usize>,
    }

    impl FakeProvider {
        fn new(fail_batch: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_batch,
            }
        }
    }

    impl TranslationProvider for FakeProvider {
        async fn translate(&self, texts: &[String]) -> Result<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_batch == Some(call) {
                return Err(CatalogError::Provider {
                    status: 429,
                    message: "Too many requests".to_string(),
                });
            }
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn deepl(server: &MockServer) -> DeepLProvider {
        DeepLProvider::new(
            reqwest::Client::new(),
            format!("{}/v2/translate", server.uri()),
            "test-deepl-key",
            "EN",
            "DE",
        )
    }

    // ==================== Batch Runner Tests ====================

    #[tokio::test]
    async fn test_batches_are_sequential_and_sized() {
        let provider = FakeProvider::new(None);
        let texts = strings(&["a", "b", "c", "d", "e"]);

        let outcome = translate_in_batches(&provider, &texts, 2, Duration::ZERO).await;

        assert_eq!(outcome.batches, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.translations.len(), 5);
        let keys: Vec<&str> = outcome.translations.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(outcome.translations.get("e").map(String::as_str), Some("E"));
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_results() {
        let provider = FakeProvider::new(Some(2));
        let texts = strings(&["a", "b", "c", "d", "e"]);

        let outcome = translate_in_batches(&provider, &texts, 2, Duration::ZERO).await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].batch, 2);
        assert_eq!(outcome.failures[0].size, 2);
        assert_eq!(outcome.failures[0].error.provider_status(), Some(429));
        let keys: Vec<&str> = outcome.translations.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "e"]);
    }

    #[tokio::test]
    async fn test_delay_between_batches_only() {
        let provider = FakeProvider::new(None);
        let texts = strings(&["a", "b", "c"]);
        let delay = Duration::from_millis(30);

        let started = Instant::now();
        translate_in_batches(&provider, &texts, 1, delay).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= delay * 2, "expected two delays, took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let provider = FakeProvider::new(None);
        let outcome = translate_in_batches(&provider, &[], 50, Duration::from_secs(1)).await;
        assert_eq!(outcome.batches, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    // ==================== DeepL Client Tests ====================

    #[tokio::test]
    async fn test_deepl_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
            .and(body_string_contains("target_lang=DE"))
            .and(body_string_contains("text=Save"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translations": [
                    {"detected_source_language": "EN", "text": "Speichern"},
                    {"detected_source_language": "EN", "text": "Abbrechen"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = deepl(&server)
            .translate(&strings(&["Save", "Cancel"]))
            .await
            .expect("Should succeed");
        assert_eq!(result, vec!["Speichern", "Abbrechen"]);
    }

    #[tokio::test]
    async fn test_deepl_quota_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = deepl(&server)
            .translate(&strings(&["Save"]))
            .await
            .expect_err("Should fail");
        assert_eq!(err.provider_status(), Some(456));
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn test_deepl_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = deepl(&server)
            .translate(&strings(&["Save"]))
            .await
            .expect_err("Should fail");
        assert!(err.to_string().contains("Invalid DeepL response"));
    }

    #[tokio::test]
    async fn test_deepl_no_retry_within_command() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome =
            translate_in_batches(&deepl(&server), &strings(&["Save"]), 50, Duration::ZERO).await;
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.translations.is_empty());
    }

    #[test]
    fn test_form_fields() {
        let provider = DeepLProvider::new(reqwest::Client::new(), "http://x", "k", "EN", "DE");
        let texts = strings(&["One", "Two"]);
        let form = provider.form(&texts);
        assert_eq!(form[0], ("text", "One"));
        assert_eq!(form[1], ("text", "Two"));
        assert!(form.contains(&("tag_handling", "xml")));
        assert!(form.contains(&("preserve_formatting", "1")));
    }
}
