//! Fallback-chain field extraction over `serde_json::Value`.
//!
//! Paths are dot-separated object traversals (`"author.userName"`). Each
//! helper walks a chain of candidate paths and takes the first hit, so one
//! adapter copes with several provider payload versions at once.
//!
//! Numeric metrics are the one place extraction is lenient: a missing or
//! uncoercible count becomes 0 and logs a warning naming the field, because
//! providers routinely omit counters on fresh posts. Identity fields get no
//! such leniency; the platform adapters reject the record instead.

use chrono::{DateTime, Utc};
use serde_json::Value;

use smpdb_core::Platform;

/// Twitter's legacy timestamp shape, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const TWITTER_LEGACY_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Walk a dot-separated path through nested objects.
pub(crate) fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = raw;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// First non-null value across the candidate paths.
pub(crate) fn first_value<'a>(raw: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(raw, path))
        .find(|v| !v.is_null())
}

/// First non-empty string across the candidate paths.
pub(crate) fn first_str<'a>(raw: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(raw, path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Content text across the candidate paths: the first non-empty string
/// wins, an explicitly empty string is accepted (media-only posts), and an
/// entirely absent field yields `None`.
pub(crate) fn content_str(raw: &Value, paths: &[&str]) -> Option<String> {
    if let Some(s) = first_str(raw, paths) {
        return Some(s.to_string());
    }
    paths
        .iter()
        .filter_map(|path| lookup(raw, path))
        .find_map(|v| v.as_str().map(str::to_string))
}

/// First usable identity across the candidate paths.
///
/// Providers flip-flop between string and integer ids across payload
/// versions; both are accepted and integers are stringified.
pub(crate) fn first_id(raw: &Value, paths: &[&str]) -> Option<String> {
    for path in paths {
        match lookup(raw, path) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First engagement count across the candidate paths, coerced to `i64`.
///
/// Accepts integers, floats (truncated), and numeric strings. A total miss
/// logs a warning naming the canonical field and returns 0.
pub(crate) fn metric(raw: &Value, platform: Platform, paths: &[&str]) -> i64 {
    for path in paths {
        let Some(value) = lookup(raw, path) else {
            continue;
        };
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    return v;
                }
                if let Some(v) = n.as_u64() {
                    return i64::try_from(v).unwrap_or(i64::MAX);
                }
                if let Some(v) = n.as_f64() {
                    #[allow(clippy::cast_possible_truncation)]
                    return v.trunc() as i64;
                }
            }
            Value::String(s) => {
                if let Ok(v) = s.trim().parse::<i64>() {
                    return v;
                }
            }
            _ => {}
        }
    }
    tracing::warn!(
        platform = %platform,
        field = paths[0],
        "missing engagement metric, defaulting to 0"
    );
    0
}

/// A structural flag: any explicit `true` among `bool_paths`, or any
/// non-null value present at one of `presence_paths`.
pub(crate) fn flag(raw: &Value, bool_paths: &[&str], presence_paths: &[&str]) -> bool {
    let explicit = bool_paths
        .iter()
        .filter_map(|p| lookup(raw, p))
        .any(|v| v.as_bool() == Some(true));
    if explicit {
        return true;
    }
    presence_paths
        .iter()
        .filter_map(|p| lookup(raw, p))
        .any(|v| !v.is_null())
}

/// Collect `array_path[].item_key` string values.
pub(crate) fn str_array(raw: &Value, array_path: &str, item_key: &str) -> Vec<String> {
    lookup(raw, array_path)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(item_key))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// First parseable timestamp across the candidate paths.
///
/// Strings are tried as RFC 3339 then as Twitter's legacy format; integers
/// are epoch seconds (or milliseconds when implausibly large for seconds).
pub(crate) fn first_datetime(raw: &Value, paths: &[&str]) -> Option<DateTime<Utc>> {
    for path in paths {
        let Some(value) = lookup(raw, path) else {
            continue;
        };
        match value {
            Value::String(s) => {
                if let Some(dt) = parse_datetime(s) {
                    return Some(dt);
                }
            }
            Value::Number(n) => {
                if let Some(dt) = n.as_i64().and_then(epoch_to_datetime) {
                    return Some(dt);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a provider timestamp string: RFC 3339 first, Twitter legacy second.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, TWITTER_LEGACY_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// Epoch seconds (or milliseconds past ~2286) to a UTC timestamp.
fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch > 10_000_000_000 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

/// Parse an approximate-count string like `200K+` or `1.5M` into a count.
///
/// Trend payloads report traffic this way. Plain integers pass through.
pub(crate) fn parse_approx_count(s: &str) -> Option<i64> {
    let cleaned = s.trim().trim_end_matches('+').trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let (number_part, multiplier) = match cleaned.chars().last() {
        Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000_f64),
        Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000_f64),
        _ => (cleaned, 1_f64),
    };
    let base = number_part.trim().parse::<f64>().ok()?;
    #[allow(clippy::cast_possible_truncation)]
    Some((base * multiplier).round() as i64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_walks_nested_objects() {
        let raw = json!({ "author": { "userName": "alice" } });
        assert_eq!(
            lookup(&raw, "author.userName").and_then(Value::as_str),
            Some("alice")
        );
        assert!(lookup(&raw, "author.missing").is_none());
        assert!(lookup(&raw, "missing.userName").is_none());
    }

    #[test]
    fn first_str_skips_empty_and_null() {
        let raw = json!({ "text": "", "full_text": null, "fullText": "  hello  " });
        assert_eq!(first_str(&raw, &["text", "full_text", "fullText"]), Some("hello"));
    }

    #[test]
    fn first_id_accepts_numeric_ids() {
        let raw = json!({ "id": 1_789_000_000_000_000_000_i64 });
        assert_eq!(
            first_id(&raw, &["id", "id_str"]),
            Some("1789000000000000000".to_string())
        );
    }

    #[test]
    fn metric_coerces_strings_and_floats() {
        let raw = json!({ "likeCount": "42" });
        assert_eq!(metric(&raw, Platform::Twitter, &["likeCount"]), 42);

        let raw = json!({ "playCount": 1234.0 });
        assert_eq!(metric(&raw, Platform::Tiktok, &["playCount"]), 1234);
    }

    #[test]
    fn metric_defaults_to_zero_when_absent() {
        let raw = json!({});
        assert_eq!(metric(&raw, Platform::Twitter, &["likeCount"]), 0);
    }

    #[test]
    fn flag_honors_bools_and_presence() {
        let raw = json!({ "isRetweet": true });
        assert!(flag(&raw, &["isRetweet"], &["retweeted_status"]));

        let raw = json!({ "retweeted_status": { "id": "1" } });
        assert!(flag(&raw, &["isRetweet"], &["retweeted_status"]));

        let raw = json!({ "isRetweet": false, "retweeted_status": null });
        assert!(!flag(&raw, &["isRetweet"], &["retweeted_status"]));
    }

    #[test]
    fn str_array_collects_item_keys() {
        let raw = json!({ "entities": { "hashtags": [ { "text": "Traffic" }, { "text": "pdx" } ] } });
        assert_eq!(
            str_array(&raw, "entities.hashtags", "text"),
            vec!["Traffic".to_string(), "pdx".to_string()]
        );
    }

    #[test]
    fn parse_datetime_handles_both_twitter_shapes() {
        let legacy = parse_datetime("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(legacy.timestamp(), 1_539_202_764);

        let rfc = parse_datetime("2024-05-01T12:00:00Z").unwrap();
        assert_eq!(rfc.timestamp(), 1_714_564_800);
    }

    #[test]
    fn first_datetime_handles_epoch_seconds_and_millis() {
        let raw = json!({ "time": 1_714_564_800 });
        assert_eq!(
            first_datetime(&raw, &["time"]).unwrap().timestamp(),
            1_714_564_800
        );

        let raw = json!({ "time": 1_714_564_800_000_i64 });
        assert_eq!(
            first_datetime(&raw, &["time"]).unwrap().timestamp(),
            1_714_564_800
        );
    }

    #[test]
    fn parse_approx_count_handles_suffixes() {
        assert_eq!(parse_approx_count("200K+"), Some(200_000));
        assert_eq!(parse_approx_count("1.5M"), Some(1_500_000));
        assert_eq!(parse_approx_count("834"), Some(834));
        assert_eq!(parse_approx_count("n/a"), None);
    }
}
