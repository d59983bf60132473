//! HTTP client for the external analysis service.
//!
//! One endpoint per capability (sentiment, locations, entities, keywords),
//! all POSTing `{"text": ...}` and returning a JSON envelope with a
//! `status` field. Transient transport failures are retried with
//! exponential back-off and jitter; application-level errors are surfaced
//! immediately.

mod client;
mod error;
mod retry;
mod types;

pub use client::AnalyzerClient;
pub use error::AnalyzerError;
pub use types::{
    EntityAnalysis, EntityMention, KeywordAnalysis, KeywordHit, LocationAnalysis,
    LocationMention, SentimentAnalysis,
};
