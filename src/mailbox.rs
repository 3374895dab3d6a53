//! Mail client adapter.
//!
//! [`MailConnector`] opens sessions and [`Mailbox`] is one open session. The poll loop
//! and the manual trigger only see these traits, so each path owns its own session.
//! [`ImapConnector`] is the production implementation over implicit-TLS IMAP.
//!
//! # Example
//!
//! ```no_run
//! use auto_confirm::{ImapConnector, MailConfig, MailConnector};
//!
//! # async fn example() -> auto_confirm::Result<()> {
//! let config = MailConfig::builder()
//!     .host("imap.example.com")
//!     .username("user@example.com")
//!     .password("app-password")
//!     .processed_folder("Processed")
//!     .build()?;
//!
//! let connector = ImapConnector::new(config);
//! let mut mailbox = connector.connect().await?;
//! for uid in mailbox.list_unseen().await? {
//!     if let Some(raw) = mailbox.fetch_raw(uid).await? {
//!         println!("{uid}: {} bytes", raw.len());
//!     }
//!     mailbox.mark_processed(uid).await?;
//! }
//! mailbox.logout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{MailConfig, TimeoutConfig};
use crate::connection;
use crate::error::{Error, Result};
use crate::session::{self, ImapSession};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

/// Identifier of a message within the current mailbox session (an IMAP UID).
///
/// Only meaningful for the session that listed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageRef(u32);

impl MessageRef {
    /// Wraps a raw UID.
    #[must_use]
    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    /// Returns the raw UID.
    #[must_use]
    pub const fn uid(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated session on the configured mailbox.
#[async_trait]
pub trait Mailbox: Send {
    /// Lists unseen messages. An empty list means there is no work.
    async fn list_unseen(&mut self) -> Result<Vec<MessageRef>>;

    /// Returns the raw message bytes, or `None` when the server has no body for it.
    async fn fetch_raw(&mut self, message: MessageRef) -> Result<Option<Vec<u8>>>;

    /// Flags the message `\Seen \Answered` and, when configured, files it.
    ///
    /// Filing is best-effort: only the flag update can fail this call.
    async fn mark_processed(&mut self, message: MessageRef) -> Result<()>;

    /// Closes the session.
    async fn logout(&mut self) -> Result<()>;
}

/// Opens [`Mailbox`] sessions.
#[async_trait]
pub trait MailConnector: Send + Sync {
    /// Connects, authenticates and returns a session ready for listing.
    async fn connect(&self) -> Result<Box<dyn Mailbox>>;
}

/// Connector for implicit-TLS IMAP servers.
pub struct ImapConnector {
    config: MailConfig,
    tls: TlsConnector,
}

impl ImapConnector {
    /// Creates a connector; no network traffic happens until [`MailConnector::connect`].
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            tls: connection::tls_connector(),
        }
    }

    /// Returns the configuration sessions are opened with.
    #[must_use]
    pub fn config(&self) -> &MailConfig {
        &self.config
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    #[instrument(
        name = "mailbox::connect",
        skip_all,
        fields(
            imap_host = %self.config.host,
            username = %self.config.username(),
            mailbox = %self.config.mailbox
        )
    )]
    async fn connect(&self) -> Result<Box<dyn Mailbox>> {
        let config = &self.config;
        let timeouts = &config.timeouts;

        let tls_stream = bounded(
            timeouts.connect,
            connection::open(&self.tls, config),
            || Error::ConnectTimeout {
                target: config.server_address(),
                timeout: timeouts.connect,
            },
        )
        .await?;

        let session = bounded(
            timeouts.auth,
            session::authenticate(tls_stream, config.username(), config.password()),
            || Error::AuthTimeout {
                username: config.username().to_string(),
                timeout: timeouts.auth,
            },
        )
        .await?;

        debug!("Authenticated");

        Ok(Box::new(ImapMailbox {
            session,
            mailbox: config.mailbox.clone(),
            processed_folder: config.processed_folder.clone(),
            timeouts: timeouts.clone(),
            folder_created: false,
        }))
    }
}

/// One IMAP session on the configured mailbox.
struct ImapMailbox {
    session: ImapSession,
    mailbox: String,
    processed_folder: Option<String>,
    timeouts: TimeoutConfig,
    folder_created: bool,
}

impl ImapMailbox {
    /// Copies the message into the processed folder, then deletes the original.
    async fn file_into(&mut self, uid: u32, folder: &str) -> Result<()> {
        if !self.folder_created {
            // Usually fails because the folder exists already.
            if let Err(e) = session::create_folder(&mut self.session, folder).await {
                debug!(folder, error = %e, "Folder create rejected");
            }
            self.folder_created = true;
        }

        session::copy_message(&mut self.session, uid, folder).await?;
        session::add_flags(&mut self.session, uid, "\\Deleted").await?;
        session::expunge(&mut self.session, folder).await
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    #[instrument(name = "mailbox::list_unseen", skip(self), fields(mailbox = %self.mailbox))]
    async fn list_unseen(&mut self) -> Result<Vec<MessageRef>> {
        let select_timeout = self.timeouts.select;
        let search_timeout = self.timeouts.search;

        bounded(
            select_timeout,
            session::select_mailbox(&mut self.session, &self.mailbox),
            || Error::SelectTimeout {
                mailbox: self.mailbox.clone(),
                timeout: select_timeout,
            },
        )
        .await?;

        let uids = bounded(
            search_timeout,
            session::search_unseen(&mut self.session),
            || Error::SearchTimeout {
                timeout: search_timeout,
            },
        )
        .await?;

        Ok(uids.into_iter().map(MessageRef::new).collect())
    }

    async fn fetch_raw(&mut self, message: MessageRef) -> Result<Option<Vec<u8>>> {
        let uid = message.uid();
        let timeout = self.timeouts.fetch;

        bounded(timeout, session::fetch_raw(&mut self.session, uid), || {
            Error::FetchTimeout { uid, timeout }
        })
        .await
    }

    #[instrument(name = "mailbox::mark_processed", skip_all, fields(uid = %message))]
    async fn mark_processed(&mut self, message: MessageRef) -> Result<()> {
        let uid = message.uid();
        let timeout = self.timeouts.store;

        bounded(
            timeout,
            session::add_flags(&mut self.session, uid, "\\Seen \\Answered"),
            || Error::StoreTimeout { uid, timeout },
        )
        .await?;

        let Some(folder) = self.processed_folder.clone() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, self.file_into(uid, &folder)).await {
            Ok(Ok(())) => debug!(folder = %folder, "Filed message"),
            Ok(Err(e)) => debug!(folder = %folder, error = %e, "Filing skipped"),
            Err(_) => debug!(folder = %folder, "Filing timed out"),
        }

        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let timeout = self.timeouts.logout;

        bounded(timeout, session::logout(&mut self.session), || {
            Error::LogoutTimeout { timeout }
        })
        .await
    }
}

/// Runs `op` under `limit`, turning an elapsed timer into the error built by `on_timeout`.
async fn bounded<T, F>(
    limit: Duration,
    op: F,
    on_timeout: impl FnOnce() -> Error,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, op)
        .await
        .map_err(|_| on_timeout())?
}
