//! Confirmation link discovery.
//!
//! A link qualifies when it contains, case-insensitively, the redirect-path marker or
//! one of the confirmation keywords. Anchors are scanned first; when no anchor
//! qualifies, bare `http(s)://` URLs in the raw text are scanned with the same test,
//! which covers plain-text bodies and links outside anchor tags.
//!
//! # Example
//!
//! ```
//! use auto_confirm::LinkFinder;
//!
//! let finder = LinkFinder::default();
//! let html = r#"<a href="https://a.test/help">Help</a>
//!               <a href="https://a.test/Confirm?t=1">Confirm</a>"#;
//! assert_eq!(finder.find_links(html), vec!["https://a.test/Confirm?t=1"]);
//! ```

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Path fragment of the tracking redirect that wraps confirmation targets.
pub const DEFAULT_REDIRECT_MARKER: &str = "/email/click/";

/// Substrings that identify confirmation links.
pub const CONFIRMATION_KEYWORDS: [&str; 4] = ["confirm", "verify", "autologin", "activate"];

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static BARE_URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'>]+"#).expect("valid regex"));

/// Finds and ranks confirmation links in message bodies.
#[derive(Debug, Clone)]
pub struct LinkFinder {
    marker: String,
}

impl Default for LinkFinder {
    fn default() -> Self {
        Self::with_marker(DEFAULT_REDIRECT_MARKER)
    }
}

impl LinkFinder {
    /// Creates a finder recognizing `marker` as the redirect-path marker.
    #[must_use]
    pub fn with_marker(marker: &str) -> Self {
        Self {
            marker: marker.to_lowercase(),
        }
    }

    /// Returns the (lowercased) redirect marker.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Returns `true` if `url` looks like a confirmation link.
    #[must_use]
    pub fn is_candidate(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        url.contains(&self.marker) || CONFIRMATION_KEYWORDS.iter().any(|k| url.contains(k))
    }

    /// Returns every qualifying link in document order. Duplicates are kept.
    #[must_use]
    pub fn find_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        let anchors: Vec<String> = document
            .select(&ANCHORS)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| self.is_candidate(href))
            .map(str::to_string)
            .collect();

        if !anchors.is_empty() {
            return anchors;
        }

        BARE_URLS
            .find_iter(html)
            .map(|m| m.as_str())
            .filter(|url| self.is_candidate(url))
            .map(str::to_string)
            .collect()
    }

    /// Picks the link to follow: the first carrying the redirect marker, else the first.
    #[must_use]
    pub fn choose<'a>(&self, links: &'a [String]) -> Option<&'a str> {
        links
            .iter()
            .find(|link| link.to_lowercase().contains(&self.marker))
            .or_else(|| links.first())
            .map(String::as_str)
    }
}
