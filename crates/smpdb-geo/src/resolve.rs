//! Layered resolution of location texts against the gazetteer.

use crate::gazetteer::{Gazetteer, GazetteerEntry};

/// How a text was resolved. Recorded on the stored result row so rollups
/// can weigh exact hits differently from guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Exact,
    Fuzzy,
    Unresolved,
}

impl ResolutionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::Fuzzy => "fuzzy",
            ResolutionMethod::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a set of candidate texts.
///
/// Unresolved keeps the raw query text, leaves coordinates `None`, and
/// classifies into the gazetteer's default region.
#[derive(Debug, Clone)]
pub struct GeoResolution {
    /// The candidate text the resolution is based on, verbatim.
    pub query: String,
    /// Canonical gazetteer name on a hit.
    pub matched_name: Option<String>,
    pub region: String,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub method: ResolutionMethod,
}

impl Gazetteer {
    /// Resolve candidate texts in priority order, most specific first.
    /// Each candidate gets the exact layer, then the fuzzy layer; the
    /// first hit wins. No hit anywhere yields an unresolved value, never
    /// an error.
    #[must_use]
    pub fn resolve(&self, texts: &[&str]) -> GeoResolution {
        let candidates: Vec<&str> = texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        for text in &candidates {
            if let Some(entry) = self.exact(text) {
                return hit(text, entry, ResolutionMethod::Exact);
            }
            if let Some(entry) = self.fuzzy(text) {
                return hit(text, entry, ResolutionMethod::Fuzzy);
            }
        }

        GeoResolution {
            query: candidates.first().map_or_else(String::new, |t| (*t).to_string()),
            matched_name: None,
            region: self.default_region().to_string(),
            country: None,
            latitude: None,
            longitude: None,
            method: ResolutionMethod::Unresolved,
        }
    }

    /// Fuzzy layer: scrubbed lookup, abbreviation expansion, then the same
    /// two over comma-separated segments ("Portland, OR" style hints).
    fn fuzzy(&self, text: &str) -> Option<&GazetteerEntry> {
        if let Some(entry) = self.scrubbed(text) {
            return Some(entry);
        }
        if let Some(entry) = self.abbreviation(text) {
            return Some(entry);
        }
        if text.contains(',') {
            for segment in text.split(',') {
                let segment = segment.trim();
                if segment.is_empty() {
                    continue;
                }
                if let Some(entry) = self
                    .exact(segment)
                    .or_else(|| self.scrubbed(segment))
                    .or_else(|| self.abbreviation(segment))
                {
                    return Some(entry);
                }
            }
        }
        None
    }
}

fn hit(query: &str, entry: &GazetteerEntry, method: ResolutionMethod) -> GeoResolution {
    GeoResolution {
        query: query.to_string(),
        matched_name: Some(entry.name.clone()),
        region: entry.region.clone(),
        country: Some(entry.country.clone()),
        latitude: entry.latitude,
        longitude: entry.longitude,
        method,
    }
}
