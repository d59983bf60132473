//! Hashtag and mention harvesting from post text.
//!
//! Used when a provider payload carries no native tag arrays (Facebook,
//! trend items) or when the arrays come back empty on a post whose text
//! plainly contains tags.

use regex::Regex;

/// Extract `#hashtags` from text: lower-cased, de-duplicated, in order of
/// first appearance, without the `#`.
#[must_use]
pub fn harvest_hashtags(content: &str) -> Vec<String> {
    let re = Regex::new(r"#(\w+)").expect("valid hashtag regex");
    collect_unique(re.captures_iter(content).filter_map(|c| c.get(1)))
}

/// Extract `@mentions` from text: lower-cased, de-duplicated, in order of
/// first appearance, without the `@`.
#[must_use]
pub fn harvest_mentions(content: &str) -> Vec<String> {
    let re = Regex::new(r"@(\w+)").expect("valid mention regex");
    collect_unique(re.captures_iter(content).filter_map(|c| c.get(1)))
}

/// Normalise provider-supplied tags the same way harvested ones are:
/// strip any leading `#`/`@`, lower-case, drop empties, de-duplicate
/// preserving first-appearance order.
#[must_use]
pub(crate) fn normalize_tags(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let cleaned = tag.trim().trim_start_matches(['#', '@']).to_lowercase();
        if !cleaned.is_empty() && !out.contains(&cleaned) {
            out.push(cleaned);
        }
    }
    out
}

fn collect_unique<'a>(matches: impl Iterator<Item = regex::Match<'a>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in matches {
        let tag = m.as_str().to_lowercase();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
