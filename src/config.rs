//! Configuration for the mailbox poller, the confirmation fetcher and the status server.
//!
//! Mail settings are assembled with [`MailConfigBuilder`]:
//!
//! ```
//! use auto_confirm::MailConfig;
//!
//! let config = MailConfig::builder()
//!     .host("imap.example.com")
//!     .username("pin1@example.com")
//!     .password("app-password")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.server_address(), "imap.example.com:993");
//! ```
//!
//! The binary reads everything from the environment through [`AppConfig::from_env`].

use crate::error::{Error, Result};
use crate::links::DEFAULT_REDIRECT_MARKER;
use crate::proxy::Socks5Proxy;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// User agent sent with confirmation requests unless overridden.
pub const DEFAULT_USER_AGENT: &str = "AutoConfirm/1.0 (+contact@example.com)";

/// Listen address of the status server unless overridden.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Settings for the IMAP session.
///
/// The password is stored as a [`SecretString`] and redacted from `Debug` output.
#[derive(Clone)]
pub struct MailConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (implicit TLS).
    pub port: u16,
    username: String,
    password: SecretString,
    /// Mailbox polled for unseen messages.
    pub mailbox: String,
    /// Folder handled messages are filed into; `None` disables filing.
    pub processed_folder: Option<String>,
    /// Optional SOCKS5 proxy for the connection.
    pub proxy: Option<Socks5Proxy>,
    /// Per-operation timeouts.
    pub timeouts: TimeoutConfig,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("mailbox", &self.mailbox)
            .field("processed_folder", &self.processed_folder)
            .field("proxy", &self.proxy)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl MailConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> MailConfigBuilder {
        MailConfigBuilder::default()
    }

    /// Returns the login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password for authentication.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timeout configuration for each IMAP step.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting the mailbox.
    pub select: Duration,
    /// Timeout for the UNSEEN search.
    pub search: Duration,
    /// Timeout for fetching one message.
    pub fetch: Duration,
    /// Timeout for flag updates and filing.
    pub store: Duration,
    /// Timeout for logout.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            store: Duration::from_secs(10),
            logout: Duration::from_secs(5),
        }
    }
}

/// Pacing of the poll loop.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Pause after each full pass over the mailbox.
    pub interval: Duration,
    /// Pause between a listing failure and the reconnect attempt.
    pub reconnect_delay: Duration,
    /// Pause between two messages of the same pass.
    pub message_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(5),
            message_delay: Duration::from_millis(500),
        }
    }
}

/// Settings for the confirmation GET.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent header value.
    pub user_agent: String,
    /// Whole-request timeout, redirects included.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Builder for [`MailConfig`].
#[derive(Debug, Default)]
pub struct MailConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    mailbox: Option<String>,
    processed_folder: Option<String>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
}

impl MailConfigBuilder {
    /// Sets the IMAP server hostname (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the login name (required).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the mailbox to poll. Default is `INBOX`.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Sets the processed folder. An empty name disables filing.
    #[must_use]
    pub fn processed_folder(mut self, folder: impl Into<String>) -> Self {
        self.processed_folder = Some(folder.into());
        self
    }

    /// Routes the connection through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if host, username or password is missing or blank.
    pub fn build(self) -> Result<MailConfig> {
        let host = required(self.host, "host")?;
        let username = required(self.username, "username")?;
        let password = self.password.ok_or_else(|| Error::InvalidConfig {
            message: "password is required".into(),
        })?;

        let processed_folder = self
            .processed_folder
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(MailConfig {
            host,
            port: self.port.unwrap_or(993),
            username,
            password: SecretString::from(password),
            mailbox: self.mailbox.unwrap_or_else(|| "INBOX".to_string()),
            processed_folder,
            proxy: self.proxy,
            timeouts: self.timeouts.unwrap_or_default(),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidConfig {
            message: format!("{field} is required"),
        })
}

/// Everything the binary needs, sourced from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IMAP session settings.
    pub mail: MailConfig,
    /// Poll loop pacing.
    pub polling: PollingConfig,
    /// Confirmation GET settings.
    pub http: HttpConfig,
    /// Redirect-path marker used by the link finder.
    pub link_marker: String,
    /// Listen address of the status server.
    pub bind_addr: String,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = MailConfig::builder()
            .mailbox(lookup("MAILBOX").unwrap_or_else(|| "INBOX".to_string()))
            .processed_folder(lookup("PROCESSED_FOLDER").unwrap_or_else(|| "Processed".to_string()));

        if let Some(host) = lookup("IMAP_HOST") {
            builder = builder.host(host);
        }
        if let Some(user) = lookup("IMAP_USER") {
            builder = builder.username(user);
        }
        if let Some(pass) = lookup("IMAP_PASS") {
            builder = builder.password(pass);
        }
        if let Some(port) = lookup("IMAP_PORT") {
            let port = port.trim().parse::<u16>().map_err(|e| Error::InvalidConfig {
                message: format!("IMAP_PORT '{port}': {e}"),
            })?;
            builder = builder.port(port);
        }
        if let Some(proxy) = lookup("IMAP_PROXY").filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(Socks5Proxy::from_url(proxy.trim())?);
        }

        let polling = PollingConfig {
            interval: seconds_var(&lookup, "POLL_INTERVAL")?
                .unwrap_or(PollingConfig::default().interval),
            ..PollingConfig::default()
        };

        let http = HttpConfig {
            user_agent: lookup("HTTP_USER_AGENT")
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: seconds_var(&lookup, "HTTP_TIMEOUT")?.unwrap_or(HttpConfig::default().timeout),
        };

        Ok(Self {
            mail: builder.build()?,
            polling,
            http,
            link_marker: lookup("LINK_MARKER")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REDIRECT_MARKER.to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

/// Parses a fractional number of seconds, e.g. `POLL_INTERVAL=0.25`.
fn seconds_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .map(Some)
        .ok_or_else(|| Error::InvalidConfig {
            message: format!("{key} must be a non-negative number of seconds, got '{raw}'"),
        })
}
