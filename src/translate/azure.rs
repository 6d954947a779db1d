use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{TextTranslator, TranslateFuture, TranslationPair, TranslationRequest};
use crate::error::PipelineError;
use crate::retry::{
    RetryPolicy, is_rate_limited, retry_after, wait_with_backoff,
};
use crate::settings::{Settings, TranslatorSettings};

const TRANSLATE_PATH: &str = "/translate";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const SUBSCRIPTION_REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";

/// Client for the Translator text API.
#[derive(Debug, Clone)]
pub struct AzureTranslator {
    client: reqwest::Client,
    settings: TranslatorSettings,
    retry: RetryPolicy,
}

impl AzureTranslator {
    pub fn new(settings: TranslatorSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.translator.clone()).with_timeout(settings.http_timeout)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        }
        self
    }

    async fn translate_batch(
        &self,
        request: &TranslationRequest,
    ) -> Result<Vec<TranslationPair>, PipelineError> {
        let key = self.settings.key.as_deref().ok_or_else(|| {
            PipelineError::Configuration(
                "translator key is not configured (set AZURE_TRANSLATOR_KEY)".to_string(),
            )
        })?;
        let to_language = request.to_language.trim();
        if to_language.is_empty() {
            return Err(PipelineError::Input("target language is empty".to_string()));
        }
        if request.lines.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}{}",
            self.settings.endpoint.trim_end_matches('/'),
            TRANSLATE_PATH
        );
        let mut params = vec![
            ("api-version", self.settings.api_version.as_str()),
            ("to", to_language),
        ];
        if let Some(from) = request.from_language.as_deref() {
            params.push(("from", from));
        }
        let body = request
            .lines
            .iter()
            .map(|line| TranslateInput { text: &line.text })
            .collect::<Vec<_>>();

        info!(
            "translating {} lines to {}",
            request.lines.len(),
            to_language
        );
        let mut attempt = 0usize;
        let mut delay = self.retry.base_delay;
        loop {
            attempt += 1;
            let mut builder = self
                .client
                .post(&url)
                .query(&params)
                .header(SUBSCRIPTION_KEY_HEADER, key)
                .json(&body);
            if let Some(region) = self.settings.region.as_deref() {
                builder = builder.header(SUBSCRIPTION_REGION_HEADER, region);
            }
            let response = builder.send().await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await?;
            if status.is_success() {
                debug!("translator response: {} bytes", text.len());
                return pair_translations(request, &text);
            }
            if is_rate_limited(status, &text) && self.retry.allows_retry(attempt) {
                delay =
                    wait_with_backoff("Translator", &self.retry, attempt, delay, retry_after).await;
                continue;
            }
            return Err(PipelineError::Backend(format!(
                "translate request failed ({}): {}",
                status,
                extract_translator_error(&text).unwrap_or(text)
            )));
        }
    }
}

impl TextTranslator for AzureTranslator {
    fn translate<'a>(&'a self, request: &'a TranslationRequest) -> TranslateFuture<'a> {
        Box::pin(self.translate_batch(request))
    }
}

/// Pairs response entry `i` with request line `i` after checking that the
/// backend returned one entry per line.
fn pair_translations(
    request: &TranslationRequest,
    text: &str,
) -> Result<Vec<TranslationPair>, PipelineError> {
    let items: Vec<TranslateItem> = serde_json::from_str(text).map_err(|err| {
        PipelineError::Backend(format!("invalid translator response: {}", err))
    })?;
    if items.len() != request.lines.len() {
        return Err(PipelineError::Backend(format!(
            "translator returned {} results for {} lines",
            items.len(),
            request.lines.len()
        )));
    }
    request
        .lines
        .iter()
        .zip(items)
        .map(|(line, item)| {
            let translated = item
                .translations
                .into_iter()
                .next()
                .map(|translation| translation.text)
                .ok_or_else(|| {
                    PipelineError::Backend(format!(
                        "translator returned no translation for line {}",
                        line.id
                    ))
                })?;
            Ok(TranslationPair {
                id: line.id,
                original: line.text.clone(),
                translated,
            })
        })
        .collect()
}

fn extract_translator_error(text: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(text).ok()?;
    let error = envelope.error?;
    Some(match error.code {
        Some(serde_json::Value::String(code)) => format!("{}: {}", code, error.message),
        Some(code) => format!("{}: {}", code, error.message),
        None => error.message,
    })
}

#[derive(Debug, Serialize)]
struct TranslateInput<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateItem {
    #[serde(default)]
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: String,
}
