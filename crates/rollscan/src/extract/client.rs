//! Vision service client.
//!
//! Wraps a single page-level `generateContent` call: one page image plus a
//! fixed prompt in, structured payload out. Owns the retry/backoff policy
//! for transient failures; a successfully returned but unparseable payload
//! is retried exactly once before surfacing `ExtractError::Malformed`.
//!
//! The client holds no mutable state and is safe to call concurrently.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::processor::PageImage;

use super::error::ExtractError;
use super::parse::ResponseParser;
use super::{prompts, PageKind, PagePayload};

/// The seam between the fan-out engine and the remote service.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Extracts one page. Terminal failures are returned, not raised — the
    /// caller decides whether to continue with other pages.
    async fn extract_page(
        &self,
        image: &PageImage,
        kind: PageKind,
    ) -> Result<PagePayload, ExtractError>;
}

/// Client for a Gemini-style `generateContent` vision endpoint.
pub struct VisionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    retry_backoff_ms: u64,
    backoff_cap_ms: u64,
    parser: ResponseParser,
}

impl VisionClient {
    /// Builds a client from config, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| ExtractError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            backoff_cap_ms: config.backoff_cap_ms,
            parser: ResponseParser::new(),
        })
    }

    /// Sends one request, mapping HTTP-level failures to the error taxonomy.
    async fn generate_once(
        &self,
        prompt: &str,
        image: &PageImage,
    ) -> Result<String, ExtractError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.png);
        let body = json!({
            "contents": [{
                "parts": [
                    {"text": prompt},
                    {"inline_data": {"mime_type": "image/png", "data": encoded}}
                ]
            }]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ExtractError::RateLimited);
        }
        if status.as_u16() == 503 {
            return Err(ExtractError::ServiceUnavailable);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                detail: truncate(&detail, 200),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(map_transport_error)?;
        parsed.first_text().ok_or(ExtractError::EmptyResponse)
    }

    /// Retry loop around `generate_once`. Transient errors back off
    /// exponentially (capped); permanent errors surface immediately.
    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String, ExtractError> {
        let mut last_err: Option<ExtractError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_backoff_ms, self.backoff_cap_ms, attempt);
                warn!(
                    "page {}: retry {}/{} after {:?}",
                    image.index + 1,
                    attempt,
                    self.max_retries,
                    delay
                );
                sleep(delay).await;
            }

            match self.generate_once(prompt, image).await {
                Ok(text) => {
                    debug!("page {}: got {} bytes of text", image.index + 1, text.len());
                    return Ok(text);
                }
                Err(e) if e.is_transient() => {
                    warn!("page {}: attempt {} failed — {}", image.index + 1, attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(ExtractError::ServiceUnavailable))
    }
}

#[async_trait]
impl PageExtractor for VisionClient {
    async fn extract_page(
        &self,
        image: &PageImage,
        kind: PageKind,
    ) -> Result<PagePayload, ExtractError> {
        let prompt = prompts::prompt_for(kind);
        let text = self.generate(prompt, image).await?;

        match self.parser.parse(kind, &text) {
            Ok(payload) => Ok(payload),
            Err(parse_err) => {
                // The call itself succeeded; the payload didn't parse.
                // One extra round trip, then give up.
                warn!(
                    "page {}: response did not parse ({}), retrying once",
                    image.index + 1,
                    parse_err
                );
                let text = self.generate(prompt, image).await?;
                self.parser.parse(kind, &text)
            }
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> ExtractError {
    if e.is_timeout() {
        ExtractError::Timeout
    } else {
        ExtractError::Transport(e)
    }
}

fn backoff_delay(base_ms: u64, cap_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

// ─── Response body ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Joins the text parts of the first candidate; `None` if there is no
    /// usable text.
    fn first_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let parts = candidate.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(500, 60_000, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 60_000, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 60_000, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(500, 3000, 5), Duration::from_millis(3000));
    }

    #[test]
    fn test_response_first_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "foo"}, {"text": "bar"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_text().as_deref(), Some("foobar"));
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.first_text().is_none());
    }

    #[test]
    fn test_response_with_blank_text_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "  \n"}]}}]}"#,
        )
        .unwrap();
        assert!(response.first_text().is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 200), "short");
        let long = "é".repeat(300);
        let cut = truncate(&long, 199);
        assert!(cut.len() <= 203);
        assert!(cut.ends_with('…'));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_requires_api_key() {
        let mut config = crate::config::ExtractionConfig::default();
        config.api_key_env = "ROLLSCAN_TEST_MISSING_KEY".to_string();
        std::env::remove_var("ROLLSCAN_TEST_MISSING_KEY");

        let result = VisionClient::from_config(&config);
        assert!(matches!(result, Err(ExtractError::MissingApiKey { .. })));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_with_key() {
        let mut config = crate::config::ExtractionConfig::default();
        config.api_key_env = "ROLLSCAN_TEST_PRESENT_KEY".to_string();
        std::env::set_var("ROLLSCAN_TEST_PRESENT_KEY", "test-key");

        let client = VisionClient::from_config(&config).unwrap();
        assert_eq!(client.model, "gemini-1.5-flash");
        assert!(client.endpoint.ends_with("googleapis.com"));

        std::env::remove_var("ROLLSCAN_TEST_PRESENT_KEY");
    }
}
