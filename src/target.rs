//! Redirect-wrapper unwrapping.
//!
//! Tracking redirects carry the real destination in a `target` query parameter,
//! frequently percent-encoded more than once. The value is form-decoded like any
//! query parameter, then percent-decoded again until it stops changing, at most
//! [`MAX_UNQUOTE_PASSES`] times.

use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use tracing::debug;
use url::form_urlencoded;

/// Upper bound on extra percent-decoding passes over a `target` value.
pub const MAX_UNQUOTE_PASSES: usize = 4;

const TARGET_PARAM: &str = "target";

/// Returns the URL to request for `href`.
///
/// Yields the decoded `target` parameter when there is one, otherwise `href` itself.
/// Decode failures fall back to `href`.
///
/// ```
/// use auto_confirm::target::resolve_target;
///
/// let href = "https://x.test/email/click/?target=https%3A%2F%2Fconfirm.test%2Fc%2F1";
/// assert_eq!(resolve_target(href), "https://confirm.test/c/1");
/// assert_eq!(resolve_target("https://a.test/verify?id=1"), "https://a.test/verify?id=1");
/// ```
#[must_use]
pub fn resolve_target(href: &str) -> String {
    match decode_target(href) {
        Ok(Some(target)) => target,
        Ok(None) => href.to_string(),
        Err(e) => {
            debug!(error = %e, "Using link as-is");
            href.to_string()
        }
    }
}

/// Extracts and decodes the `target` parameter of `href`.
///
/// Returns `Ok(None)` when there is no non-empty `target` parameter. Relative links
/// are accepted; only the part between `?` and `#` is inspected.
///
/// # Errors
///
/// Returns [`Error::TargetDecode`] if a decoding pass produces invalid UTF-8.
pub fn decode_target(href: &str) -> Result<Option<String>> {
    let without_fragment = href.split_once('#').map_or(href, |(before, _)| before);
    let Some((_, query)) = without_fragment.split_once('?') else {
        return Ok(None);
    };

    let Some(value) = form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == TARGET_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
    else {
        return Ok(None);
    };

    unquote_repeatedly(&value)
        .map(Some)
        .map_err(|source| Error::TargetDecode {
            href: href.to_string(),
            source,
        })
}

/// Percent-decodes `value` until a pass is a no-op or the pass budget is spent.
///
/// # Errors
///
/// Returns the UTF-8 error of the first pass that does not decode to valid UTF-8.
pub fn unquote_repeatedly(value: &str) -> std::result::Result<String, std::str::Utf8Error> {
    let mut current = value.to_string();

    for _ in 0..MAX_UNQUOTE_PASSES {
        let next = percent_decode_str(&current).decode_utf8()?.into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    Ok(current)
}
