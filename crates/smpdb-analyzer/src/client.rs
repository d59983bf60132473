//! HTTP client for the analysis service.
//!
//! Wraps `reqwest` with a bounded per-request timeout, bearer-token auth,
//! envelope error handling, and typed response deserialization. Every
//! public call retries transient failures per [`crate::retry`].

use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::Value;

use smpdb_core::AppConfig;

use crate::error::AnalyzerError;
use crate::retry::retry_with_backoff;
use crate::types::{
    AnalyzeRequest, EntityAnalysis, KeywordAnalysis, LocationAnalysis, SentimentAnalysis,
};

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the analysis service.
///
/// Use [`AnalyzerClient::from_app_config`] in binaries or
/// [`AnalyzerClient::with_base_url`] to point at a mock server in tests.
pub struct AnalyzerClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout_secs: u64,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl AnalyzerClient {
    /// Creates a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AnalyzerError::Api`] if the configured
    /// URL is not valid.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, AnalyzerError> {
        let mut client = Self::with_base_url(
            &config.analyzer_url,
            config.analyzer_api_key.as_deref(),
            config.analyzer_timeout_secs,
        )?;
        client.max_retries = config.analyzer_max_retries;
        client.backoff_base_ms = config.analyzer_backoff_base_ms;
        Ok(client)
    }

    /// Creates a client with an explicit base URL and the default retry
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AnalyzerError::Api`] if `base_url` is
    /// not a valid URL.
    pub fn with_base_url(
        base_url: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("smpdb/0.1 (social-media-pipeline)")
            .build()?;

        // Normalise: the base URL must end with exactly one slash so
        // endpoint paths append instead of replacing the last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| AnalyzerError::Api {
            status: 0,
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(str::to_owned),
            timeout_secs,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry policy. Tests use `(n, 0)` to keep back-off out
    /// of the clock.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Classifies the text's sentiment.
    ///
    /// # Errors
    ///
    /// - [`AnalyzerError::Timeout`] after the client-level deadline.
    /// - [`AnalyzerError::Api`] on an error status from the service.
    /// - [`AnalyzerError::Http`] on network failure.
    /// - [`AnalyzerError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentAnalysis, AnalyzerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_json("v1/sentiment", text)
        })
        .await
    }

    /// Extracts location mentions from the text. An empty list is a normal
    /// answer, not an error.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AnalyzerClient::analyze_sentiment`].
    pub async fn extract_locations(&self, text: &str) -> Result<LocationAnalysis, AnalyzerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_json("v1/locations", text)
        })
        .await
    }

    /// Extracts named entities from the text.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AnalyzerClient::analyze_sentiment`].
    pub async fn extract_entities(&self, text: &str) -> Result<EntityAnalysis, AnalyzerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_json("v1/entities", text)
        })
        .await
    }

    /// Extracts ranked keywords from the text.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AnalyzerClient::analyze_sentiment`].
    pub async fn extract_keywords(&self, text: &str) -> Result<KeywordAnalysis, AnalyzerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_json("v1/keywords", text)
        })
        .await
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("{}{path}", self.base_url.path()));
        url
    }

    /// POSTs the text to one endpoint, asserts success at both the HTTP and
    /// envelope level, and deserializes the body.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        text: &str,
    ) -> Result<T, AnalyzerError> {
        let url = self.endpoint(path);
        let mut request = self.client.post(url.clone()).json(&AnalyzeRequest { text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| AnalyzerError::Deserialize {
            context: url.to_string(),
            source: e,
        })?;
        Self::check_api_error(status.as_u16(), &value)?;

        serde_json::from_value(value).map_err(|e| AnalyzerError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> AnalyzerError {
        if err.is_timeout() {
            AnalyzerError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            AnalyzerError::Http(err)
        }
    }

    /// Checks the envelope `"status"` field: the service reports some
    /// application errors inside an HTTP 200.
    fn check_api_error(status: u16, body: &Value) -> Result<(), AnalyzerError> {
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(AnalyzerError::Api { status, message });
        }
        Ok(())
    }
}

/// Best-effort error message from a non-2xx body: the envelope's `message`
/// field when the body is JSON, the raw text otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map_or_else(
            || {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "unknown error".to_string()
                } else {
                    trimmed.to_string()
                }
            },
            str::to_string,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> AnalyzerClient {
        AnalyzerClient::with_base_url(base_url, None, 30)
            .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_appends_to_normalised_base() {
        let client = test_client("http://analyzer.internal:8100");
        assert_eq!(
            client.endpoint("v1/sentiment").as_str(),
            "http://analyzer.internal:8100/v1/sentiment"
        );
    }

    #[test]
    fn endpoint_preserves_base_path() {
        let client = test_client("http://analyzer.internal:8100/analysis/");
        assert_eq!(
            client.endpoint("v1/keywords").as_str(),
            "http://analyzer.internal:8100/analysis/v1/keywords"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = AnalyzerClient::with_base_url("not a url", None, 30);
        assert!(matches!(result, Err(AnalyzerError::Api { .. })));
    }

    #[test]
    fn error_message_prefers_envelope_field() {
        assert_eq!(
            error_message(r#"{"status":"error","message":"text too long"}"#),
            "text too long"
        );
        assert_eq!(error_message("plain body"), "plain body");
        assert_eq!(error_message("  "), "unknown error");
    }

    #[test]
    fn envelope_error_inside_200_is_surfaced() {
        let body = serde_json::json!({"status": "error", "message": "model unavailable"});
        let err = AnalyzerClient::check_api_error(200, &body).unwrap_err();
        assert!(matches!(err, AnalyzerError::Api { status: 200, .. }));
        assert!(err.to_string().contains("model unavailable"));
    }
}
