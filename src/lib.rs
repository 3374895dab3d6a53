//! # auto-confirm
//!
//! Async IMAP poller that follows confirmation links found in incoming mail.
//!
//! The crate provides:
//! - A poll loop that connects to an IMAP mailbox (optionally through a SOCKS5 proxy),
//!   picks up unseen messages and marks each one processed
//! - Link discovery in message bodies, including unwrapping of click-tracking redirects
//!   that carry the real destination in a `target` query parameter
//! - A small HTTP surface reporting loop health and allowing a manual scan
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_confirm::{AppConfig, HttpFetcher, ImapConnector, LinkFinder, StatusHandle, Worker};
//! use std::sync::Arc;
//!
//! # async fn example() -> auto_confirm::Result<()> {
//! let config = AppConfig::from_env()?;
//! let status = StatusHandle::new();
//!
//! let worker = Worker::new(
//!     Arc::new(ImapConnector::new(config.mail.clone())),
//!     Arc::new(HttpFetcher::new(&config.http)?),
//!     LinkFinder::with_marker(&config.link_marker),
//!     config.polling.clone(),
//!     status.clone(),
//! )
//! .spawn();
//!
//! // ... serve `status` ...
//!
//! worker.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Link Resolution
//!
//! ```
//! use auto_confirm::target::resolve_target;
//! use auto_confirm::LinkFinder;
//!
//! let html = r#"<a href="https://x.test/email/click/?target=https%3A%2F%2Fconfirm.test%2Fc%2F1">Confirm</a>"#;
//!
//! let finder = LinkFinder::default();
//! let links = finder.find_links(html);
//! let chosen = finder.choose(&links).unwrap();
//!
//! assert_eq!(resolve_target(chosen), "https://confirm.test/c/1");
//! ```
//!
//! ## Error Handling
//!
//! Every error carries an [`ErrorCategory`]. Use [`Error::is_retryable`] to tell transient
//! mail server problems from permanent ones:
//!
//! ```
//! use auto_confirm::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient {} error: {}", error.category(), error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing`. Major operations emit spans with structured fields.
//!
//! ### Span Naming Convention
//!
//! - `worker::run` - The poll loop
//! - `mailbox::connect` - Session open and login
//! - `mailbox::list_unseen` - Select and search
//! - `mailbox::mark_processed` - Flag update and filing
//! - `pipeline::process_message` - One message end to end
//! - `pipeline::scan_once` - Manual trigger
//! - `fetcher::get` - Confirmation request
//! - `session::authenticate` - IMAP authentication
//! - `connection::open` - TCP and TLS connection
//! - `connection::socks5` - Proxied TCP connection
//!
//! ### Standard Fields
//!
//! - `imap_host` - IMAP server hostname
//! - `username` - Login name
//! - `mailbox` - Selected mailbox
//! - `proxy_enabled` - Whether a proxy is used
//! - `uid` - Message UID

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod content;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod mailbox;
pub mod pipeline;
pub mod proxy;
pub mod server;
pub mod status;
pub mod target;
pub mod worker;

// Internal modules
mod connection;
mod session;

// Re-exports for ergonomic API
pub use config::{
    AppConfig, HttpConfig, MailConfig, MailConfigBuilder, PollingConfig, TimeoutConfig,
};
pub use error::{Error, ErrorCategory, Result};
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher};
pub use links::LinkFinder;
pub use mailbox::{ImapConnector, MailConnector, Mailbox, MessageRef};
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use status::{ProcessingResult, StatusHandle, WorkerState, WorkerStatus};
pub use worker::{Worker, WorkerHandle};
