//! Error types for the auto-confirm crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Each error maps onto one [`ErrorCategory`], which decides how the poll loop reacts:
//! connect failures stop the loop, listing failures trigger a reconnect, everything
//! else is logged against the message it happened on.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling the mailbox or serving status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    HttpClient {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Connect failures (RETRYABLE)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect via SOCKS5 proxy.
    #[error("failed to connect via SOCKS5 proxy {proxy_host} to {target}")]
    Socks5Connect {
        /// The SOCKS5 proxy hostname.
        proxy_host: String,
        /// The target address.
        target: String,
        /// The underlying SOCKS5 error.
        #[source]
        source: tokio_socks::Error,
    },

    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {username} after {timeout:?}")]
    AuthTimeout {
        /// The login name used for authentication.
        username: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// IMAP login failed.
    #[error("IMAP login failed for {username}")]
    ImapLogin {
        /// The login name used.
        username: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // List failures (RETRYABLE - the loop reconnects)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// IMAP search failed.
    #[error("IMAP search for unseen messages failed")]
    ImapSearch {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Search timeout.
    #[error("IMAP search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Per-message failures (RETRYABLE, but the loop moves on)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP fetch failed.
    #[error("IMAP fetch failed for UID {uid}")]
    ImapFetch {
        /// The UID that failed.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for UID {uid} after {timeout:?}")]
    FetchTimeout {
        /// The UID being fetched.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Setting flags on a message failed.
    #[error("IMAP flag update failed for UID {uid}")]
    ImapStore {
        /// The UID whose flags could not be set.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Flag update timeout.
    #[error("flag update timeout for UID {uid} after {timeout:?}")]
    StoreTimeout {
        /// The UID being updated.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Decode / filing failures (NOT retryable, handled locally)
    // ─────────────────────────────────────────────────────────────────────────
    /// The `target` query parameter did not decode to UTF-8.
    #[error("could not decode target parameter of {href}")]
    TargetDecode {
        /// The link the parameter came from.
        href: String,
        /// The underlying UTF-8 error.
        #[source]
        source: std::str::Utf8Error,
    },

    /// Filing a message into the processed folder failed.
    #[error("failed to file message into '{folder}'")]
    Filing {
        /// The processed-folder name.
        folder: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Session teardown (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Logout timeout (not critical).
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Status surface
    // ─────────────────────────────────────────────────────────────────────────
    /// Could not bind the status listener.
    #[error("failed to bind status server on {addr}")]
    Bind {
        /// The listen address.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The status server stopped with an I/O error.
    #[error("status server failed")]
    Serve {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connect | ErrorCategory::List | ErrorCategory::Fetch
        )
    }

    /// Returns the error category for logging and loop decisions.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::HttpClient { .. } => ErrorCategory::Configuration,

            Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::Socks5Connect { .. }
            | Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::ImapLogin { .. } => ErrorCategory::Connect,

            Error::SelectMailbox { .. }
            | Error::SelectTimeout { .. }
            | Error::ImapSearch { .. }
            | Error::SearchTimeout { .. } => ErrorCategory::List,

            Error::ImapFetch { .. }
            | Error::FetchTimeout { .. }
            | Error::ImapStore { .. }
            | Error::StoreTimeout { .. } => ErrorCategory::Fetch,

            Error::TargetDecode { .. } => ErrorCategory::Decode,

            Error::Filing { .. } => ErrorCategory::Filing,

            Error::ImapLogout { .. } | Error::LogoutTimeout { .. } => ErrorCategory::Session,

            Error::Bind { .. } | Error::Serve { .. } => ErrorCategory::Server,
        }
    }
}

/// Error categories, one per failure class of the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Could not open an authenticated session.
    Connect,
    /// Could not list unseen messages.
    List,
    /// Could not fetch or flag a single message.
    Fetch,
    /// A redirect target could not be decoded.
    Decode,
    /// Filing into the processed folder failed.
    Filing,
    /// Session teardown failed.
    Session,
    /// The status surface could not run.
    Server,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Connect => write!(f, "connect"),
            ErrorCategory::List => write!(f, "list"),
            ErrorCategory::Fetch => write!(f, "fetch"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::Filing => write!(f, "filing"),
            ErrorCategory::Session => write!(f, "session"),
            ErrorCategory::Server => write!(f, "server"),
        }
    }
}
