//! Body extraction from raw RFC 822 messages.
//!
//! Multipart messages yield their first inline `text/html` part, falling back to the
//! first `text/plain` part. Single-part messages yield their payload whatever its type.
//! Bodies are decoded with the declared charset, UTF-8 when none is declared;
//! undecodable bytes become U+FFFD.

use mailparse::{parse_mail, DispositionType, MailHeaderMap, MailParseError, ParsedMail};
use tracing::{debug, warn};

/// Returns the most useful textual body of `raw`, or `None` if nothing could be decoded.
///
/// ```
/// let raw = b"Content-Type: text/html; charset=utf-8\r\n\r\n<a href=\"https://a.test/confirm\">go</a>";
/// let body = auto_confirm::content::extract_body(raw).unwrap();
/// assert!(body.contains("a.test/confirm"));
/// ```
#[must_use]
pub fn extract_body(raw: &[u8]) -> Option<String> {
    let parsed = match parse_mail(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Failed to parse message");
            return None;
        }
    };

    let part = if parsed.subparts.is_empty() {
        &parsed
    } else {
        find_part(&parsed, is_inline_html).or_else(|| find_part(&parsed, is_plain_text))?
    };

    match decode_text(part) {
        Ok(body) if !body.is_empty() => Some(body),
        Ok(_) => {
            debug!(mimetype = %part.ctype.mimetype, "Message body is empty");
            None
        }
        Err(e) => {
            warn!(error = %e, mimetype = %part.ctype.mimetype, "Failed to decode body");
            None
        }
    }
}

/// mailparse assumes us-ascii for parts without a charset; mail in the wild means UTF-8.
fn decode_text(part: &ParsedMail<'_>) -> Result<String, MailParseError> {
    let declares_charset = part
        .headers
        .get_first_value("Content-Type")
        .is_some_and(|value| value.to_ascii_lowercase().contains("charset"));

    if declares_charset {
        part.get_body()
    } else {
        part.get_body_raw()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Depth-first, document-order search through the MIME tree.
fn find_part<'p, 'a>(
    part: &'p ParsedMail<'a>,
    accept: fn(&ParsedMail<'_>) -> bool,
) -> Option<&'p ParsedMail<'a>> {
    if accept(part) {
        return Some(part);
    }
    part.subparts.iter().find_map(|sub| find_part(sub, accept))
}

fn is_inline_html(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/html")
        && part.get_content_disposition().disposition != DispositionType::Attachment
}

fn is_plain_text(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
}
