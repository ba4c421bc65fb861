use regex::Regex;
use std::borrow::Cow;

lazy_static::lazy_static! {
    static ref INVALID_METRIC_CHAR_REGEX: Regex = Regex::new(r"[^A-Za-z0-9_\-]").unwrap();
}

/// Replaces every character outside of `[A-Za-z0-9_-]` with `_`.
///
/// Each invalid character is replaced on its own, so runs are not collapsed:
/// `"LRU eviction (0.0)"` becomes `"LRU_eviction__0_0_"`.
pub fn sanitize(key: &str) -> Cow<'_, str> {
    INVALID_METRIC_CHAR_REGEX.replace_all(key, "_")
}

/// Turns a `host:port` string into a single metric path segment.
pub fn sanitize_host(host: &str) -> String {
    host.replace(':', "-").replace('.', "_")
}
