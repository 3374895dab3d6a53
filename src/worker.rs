//! Background poll loop.
//!
//! ```text
//! Disconnected ──► Connecting ──► Polling ◄──► Reconnecting
//!                      │             │              │
//!                      └── connect   └──── stop ────┴──► Stopped
//!                          failed ─────────────────────►
//! ```
//!
//! The first connect is the only fatal failure. Listing failures drop the session,
//! wait [`PollingConfig::reconnect_delay`] and reconnect; a failed reconnect waits one
//! poll interval and tries again. Stop requests are honoured between messages and
//! during every pause; an in-flight HTTP request runs to completion or its timeout.
//!
//! Messages handled in the current session are not handled again while they stay
//! unseen, so a failed flag update cannot repeat a confirmation request.

use crate::config::PollingConfig;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::links::LinkFinder;
use crate::mailbox::{MailConnector, Mailbox, MessageRef};
use crate::pipeline;
use crate::status::{StatusHandle, WorkerState};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How long [`WorkerHandle::stop`] waits for the loop to wind down.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// The poll loop and everything it needs.
pub struct Worker {
    connector: Arc<dyn MailConnector>,
    fetcher: Arc<dyn Fetcher>,
    finder: LinkFinder,
    polling: PollingConfig,
    status: StatusHandle,
}

impl Worker {
    /// Creates a worker reporting into `status`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn MailConnector>,
        fetcher: Arc<dyn Fetcher>,
        finder: LinkFinder,
        polling: PollingConfig,
        status: StatusHandle,
    ) -> Self {
        Self {
            connector,
            fetcher,
            finder,
            polling,
            status,
        }
    }

    /// Runs the loop on a tokio task.
    #[must_use]
    pub fn spawn(self) -> WorkerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));
        WorkerHandle { token, task }
    }

    /// Runs the loop until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the connect error if the first session cannot be opened.
    #[instrument(
        name = "worker::run",
        skip_all,
        fields(poll_interval = ?self.polling.interval)
    )]
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        info!("Worker starting");
        self.status.start(WorkerState::Connecting);

        let mut mailbox = match self.connector.connect().await {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                error!(error = %e, "Mailbox connect failed, worker not started");
                self.status.stop();
                return Err(e);
            }
        };
        self.status.set_state(WorkerState::Polling);

        // Scoped to the session: references are only meaningful for the one that listed them.
        let mut handled = BTreeSet::new();

        while !token.is_cancelled() {
            let Some(session) = mailbox.as_mut() else {
                handled.clear();
                mailbox = self.reconnect(&token).await;
                continue;
            };

            match session.list_unseen().await {
                Ok(unseen) => {
                    handled.retain(|uid| unseen.contains(uid));
                    self.process_batch(session.as_mut(), &unseen, &mut handled, &token)
                        .await;
                }
                Err(e) => {
                    warn!(error = %e, category = %e.category(), "Listing failed, reconnecting");
                    self.status.set_state(WorkerState::Reconnecting);
                    pipeline::close(session.as_mut()).await;
                    mailbox = None;
                    continue;
                }
            }

            if !pause(&token, self.polling.interval).await {
                break;
            }
        }

        if let Some(mut session) = mailbox {
            pipeline::close(session.as_mut()).await;
        }
        self.status.stop();
        info!("Worker stopped");

        Ok(())
    }

    /// One reconnect attempt after the reconnect delay.
    async fn reconnect(&self, token: &CancellationToken) -> Option<Box<dyn Mailbox>> {
        if !pause(token, self.polling.reconnect_delay).await {
            return None;
        }

        match self.connector.connect().await {
            Ok(mailbox) => {
                info!("Reconnected");
                self.status.set_state(WorkerState::Polling);
                Some(mailbox)
            }
            Err(e) => {
                warn!(error = %e, "Reconnect failed");
                pause(token, self.polling.interval).await;
                None
            }
        }
    }

    async fn process_batch(
        &self,
        mailbox: &mut dyn Mailbox,
        unseen: &[MessageRef],
        handled: &mut BTreeSet<MessageRef>,
        token: &CancellationToken,
    ) {
        let pending: Vec<MessageRef> = unseen
            .iter()
            .copied()
            .filter(|uid| !handled.contains(uid))
            .collect();

        if pending.is_empty() {
            debug!(unseen = unseen.len(), "No new unseen messages");
            return;
        }

        debug!(count = pending.len(), "Processing unseen messages");

        for uid in pending {
            if token.is_cancelled() {
                break;
            }

            match pipeline::process_message(mailbox, uid, &self.finder, self.fetcher.as_ref())
                .await
            {
                Ok(result) => {
                    info!(uid = %uid, ok = result.succeeded, detail = %result.detail, "Processed message");
                    handled.insert(uid);
                    self.status.record(result);
                    pause(token, self.polling.message_delay).await;
                }
                Err(e) => error!(uid = %uid, error = %e, "Failed to process message"),
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("finder", &self.finder)
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}

/// Sleeps for `duration`; returns `false` if `token` was cancelled first.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Handle to a spawned [`Worker`].
#[derive(Debug)]
pub struct WorkerHandle {
    token: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Returns a token that stops the loop when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signals the loop to stop and waits up to [`STOP_TIMEOUT`] for it to exit.
    pub async fn stop(self) {
        self.token.cancel();

        match tokio::time::timeout(STOP_TIMEOUT, self.task).await {
            Ok(Ok(Ok(()))) => debug!("Worker joined"),
            Ok(Ok(Err(e))) => debug!(error = %e, "Worker had exited with an error"),
            Ok(Err(e)) => warn!(error = %e, "Worker task panicked or was aborted"),
            Err(_) => warn!(
                timeout_secs = STOP_TIMEOUT.as_secs(),
                "Worker did not stop in time"
            ),
        }
    }
}
