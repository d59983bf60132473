use thiserror::Error;

/// Errors returned by the analysis service client.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The request exceeded the client-level deadline. Every call is
    /// bounded; a hung analyzer can only cost one post one timeout.
    #[error("analyzer request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The analyzer returned an error status, either as a non-2xx response
    /// or as `"status": "error"` inside a 200 envelope.
    #[error("analyzer API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
