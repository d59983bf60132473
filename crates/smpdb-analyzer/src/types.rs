//! Analysis service request/response types.
//!
//! Every endpoint POSTs `{"text": ...}` and answers inside an envelope
//! carrying `"status": "ok"` (or `"error"` plus a message, handled before
//! deserialization reaches these types).

use serde::{Deserialize, Serialize};

/// Body sent to every analysis endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub text: &'a str,
}

/// Response of `POST /v1/sentiment`.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentAnalysis {
    /// `positive`, `negative`, or `neutral`.
    pub label: String,
    /// Signed score in [-1.0, 1.0].
    pub score: f64,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f64,
    pub model: String,
}

/// Response of `POST /v1/locations`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationAnalysis {
    pub model: String,
    #[serde(default)]
    pub locations: Vec<LocationMention>,
}

/// One location mention found in the text. An empty `locations` list is a
/// normal answer for posts that simply name no place.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationMention {
    pub text: String,
    /// `city`, `state`, `country`, `poi`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Response of `POST /v1/entities`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityAnalysis {
    pub model: String,
    #[serde(default)]
    pub entities: Vec<EntityMention>,
}

/// One named entity found in the text.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityMention {
    pub text: String,
    /// `person`, `organization`, `product`, `event`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Response of `POST /v1/keywords`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordAnalysis {
    pub model: String,
    #[serde(default)]
    pub keywords: Vec<KeywordHit>,
}

/// One extracted keyword with its relevance score in [0.0, 1.0].
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordHit {
    pub keyword: String,
    #[serde(default)]
    pub score: f64,
}
