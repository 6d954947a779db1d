use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{RecognizeFuture, TextRecognizer};
use crate::error::PipelineError;
use crate::geometry::{Polygon, TextRegion};
use crate::retry::{
    PollPolicy, RetryPolicy, is_rate_limited, retry_after, wait_with_backoff,
};
use crate::settings::{OcrSettings, Settings};

const READ_ANALYZE_PATH: &str = "/vision/v3.2/read/analyze";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";
const IN_PROGRESS_STATES: &[&str] = &["notStarted", "running"];

/// Client for the asynchronous Read API: submit the image, then poll the
/// returned operation until it finishes.
#[derive(Debug, Clone)]
pub struct AzureOcr {
    client: reqwest::Client,
    settings: OcrSettings,
    poll: PollPolicy,
    retry: RetryPolicy,
}

struct Credentials<'a> {
    endpoint: &'a str,
    key: &'a str,
}

impl AzureOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ocr.clone())
            .with_poll_policy(settings.poll)
            .with_timeout(settings.http_timeout)
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
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

    fn credentials(&self) -> Result<Credentials<'_>, PipelineError> {
        let endpoint = self.settings.endpoint.as_deref().ok_or_else(|| {
            PipelineError::Configuration(
                "OCR endpoint is not configured (set AZURE_VISION_ENDPOINT)".to_string(),
            )
        })?;
        let key = self.settings.key.as_deref().ok_or_else(|| {
            PipelineError::Configuration(
                "OCR subscription key is not configured (set AZURE_VISION_KEY)".to_string(),
            )
        })?;
        Ok(Credentials {
            endpoint: endpoint.trim_end_matches('/'),
            key,
        })
    }

    async fn recognize_path(&self, image_path: &Path) -> Result<Vec<TextRegion>, PipelineError> {
        let credentials = self.credentials()?;
        let image_data = tokio::fs::read(image_path).await.map_err(|err| {
            PipelineError::Input(format!(
                "failed to read image {}: {}",
                image_path.display(),
                err
            ))
        })?;
        info!(
            "submitting {} ({} bytes) for text recognition",
            image_path.display(),
            image_data.len()
        );
        let operation_url = self.submit(&credentials, image_data).await?;
        debug!("read operation: {}", operation_url);
        let regions = self.poll_operation(&credentials, &operation_url).await?;
        info!("recognized {} lines", regions.len());
        Ok(regions)
    }

    async fn submit(
        &self,
        credentials: &Credentials<'_>,
        image_data: Vec<u8>,
    ) -> Result<String, PipelineError> {
        let url = format!("{}{}", credentials.endpoint, READ_ANALYZE_PATH);
        let mut attempt = 0usize;
        let mut delay = self.retry.base_delay;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(SUBSCRIPTION_KEY_HEADER, credentials.key)
                .body(image_data.clone())
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            if status.is_success() {
                return response
                    .headers()
                    .get(OPERATION_LOCATION_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.to_string())
                    .ok_or_else(|| {
                        PipelineError::Backend(
                            "analyze response has no Operation-Location header".to_string(),
                        )
                    });
            }
            let text = response.text().await?;
            if is_rate_limited(status, &text) && self.retry.allows_retry(attempt) {
                delay = wait_with_backoff("OCR", &self.retry, attempt, delay, retry_after).await;
                continue;
            }
            return Err(PipelineError::Backend(format!(
                "analyze request failed ({}): {}",
                status,
                extract_azure_error(&text).unwrap_or(text)
            )));
        }
    }

    async fn poll_operation(
        &self,
        credentials: &Credentials<'_>,
        operation_url: &str,
    ) -> Result<Vec<TextRegion>, PipelineError> {
        let mut poll = self.poll.start();
        loop {
            if !poll.begin_attempt() {
                return Err(PipelineError::Timeout {
                    attempts: poll.attempts(),
                    elapsed: poll.elapsed(),
                });
            }
            let response = self
                .client
                .get(operation_url)
                .header(SUBSCRIPTION_KEY_HEADER, credentials.key)
                .send()
                .await?;
            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await?;

            if !status.is_success() {
                if is_rate_limited(status, &text) {
                    poll.wait(retry_after).await;
                    continue;
                }
                return Err(PipelineError::Backend(format!(
                    "read result request failed ({}): {}",
                    status,
                    extract_azure_error(&text).unwrap_or(text)
                )));
            }

            let operation: ReadOperation = serde_json::from_str(&text).map_err(|err| {
                PipelineError::Backend(format!("invalid read result payload: {}", err))
            })?;
            if IN_PROGRESS_STATES.contains(&operation.status.as_str()) {
                poll.wait(retry_after).await;
                continue;
            }
            return parse_read_operation(operation);
        }
    }
}

impl TextRecognizer for AzureOcr {
    fn recognize<'a>(&'a self, image_path: &'a Path) -> RecognizeFuture<'a> {
        Box::pin(self.recognize_path(image_path))
    }
}

/// Flattens a terminal read operation into regions, pages first, then lines.
pub fn parse_read_operation(operation: ReadOperation) -> Result<Vec<TextRegion>, PipelineError> {
    if operation.status != "succeeded" {
        let detail = operation
            .error
            .map(|error| error.message)
            .unwrap_or_else(|| "no details".to_string());
        return Err(PipelineError::Backend(format!(
            "read operation {}: {}",
            operation.status, detail
        )));
    }
    let Some(result) = operation.analyze_result else {
        return Err(PipelineError::Backend(
            "read operation succeeded without analyzeResult".to_string(),
        ));
    };
    let mut regions = Vec::new();
    for page in result.read_results {
        for line in page.lines {
            let polygon = Polygon::from_flat(&line.bounding_box).map_err(|err| {
                PipelineError::Backend(format!("line '{}': {}", line.text, err))
            })?;
            regions.push(TextRegion::new(regions.len(), line.text, polygon));
        }
    }
    Ok(regions)
}

fn extract_azure_error(text: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(text).ok()?;
    let error = envelope.error?;
    Some(match error.code {
        Some(code) => format!("{}: {}", code, error.message),
        None => error.message,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadLine {
    text: String,
    bounding_box: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: String,
}
