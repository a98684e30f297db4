//! Image URL normalization for the outbound model payload.

use serde_json::Value;

/// Turns loosely formatted image references into absolute URLs.
///
/// Candidates that are null, not strings, or blank are dropped. Protocol-relative
/// values (`//host/a.jpg`) get an `https:` prefix and values that do not start with
/// `http` get `https://`. Values already starting with `http://` are kept as they
/// are: plain-HTTP links are not upgraded. Surviving values keep their input order.
pub fn normalize_image_urls<'a, I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    candidates
        .into_iter()
        .filter_map(Value::as_str)
        .filter_map(normalize_image_url)
        .collect()
}

/// Normalizes a single candidate. `None` for blank input.
pub fn normalize_image_url(candidate: &str) -> Option<String> {
    if candidate.trim().is_empty() {
        return None;
    }

    let url = if let Some(rest) = candidate.strip_prefix("//") {
        format!("https://{rest}")
    } else if !candidate.starts_with("http") {
        format!("https://{candidate}")
    } else {
        candidate.to_string()
    };

    Some(url)
}
