//! In-memory mail server and HTTP fetcher shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use auto_confirm::{
    Error, FetchOutcome, Fetcher, MailConnector, Mailbox, MessageRef, Result,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// The redirect link used throughout the tests and the URL it resolves to.
pub const REDIRECT_HREF: &str =
    "https://x.test/email/click/?target=https%3A%2F%2Fconfirm.test%2Fc%2F1";
pub const CONFIRM_URL: &str = "https://confirm.test/c/1";

/// A single-part HTML message with one anchor pointing at `href`.
pub fn html_message(href: &str) -> Vec<u8> {
    format!(
        "From: noreply@x.test\r\n\
         To: me@example.com\r\n\
         Subject: Please confirm\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         <html><body><p>Hi!</p><a href=\"{href}\">Confirm your account</a></body></html>\r\n"
    )
    .into_bytes()
}

/// A message whose body decodes to nothing.
pub fn empty_message() -> Vec<u8> {
    b"From: noreply@x.test\r\nSubject: Empty\r\n\r\n".to_vec()
}

#[derive(Default)]
struct MailState {
    /// uid -> raw bytes; `None` when the server returns no body section.
    messages: BTreeMap<u32, Option<Vec<u8>>>,
    processed: Vec<u32>,
    broken_fetches: BTreeSet<u32>,
    failing_lists: usize,
    failing_marks: bool,
    refuse_connects: bool,
    connects: usize,
    logouts: usize,
}

/// Fake IMAP server: every session sees the same messages and flags.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<MailState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, uid: u32, raw: Vec<u8>) {
        self.state.lock().messages.insert(uid, Some(raw));
    }

    pub fn deliver_without_body(&self, uid: u32) {
        self.state.lock().messages.insert(uid, None);
    }

    pub fn break_fetch(&self, uid: u32) {
        self.state.lock().broken_fetches.insert(uid);
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.state.lock().failing_lists = count;
    }

    /// Makes every flag update fail, leaving messages unseen.
    pub fn fail_marks(&self, fail: bool) {
        self.state.lock().failing_marks = fail;
    }

    pub fn refuse_connects(&self, refuse: bool) {
        self.state.lock().refuse_connects = refuse;
    }

    pub fn processed(&self) -> Vec<u32> {
        self.state.lock().processed.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().logouts
    }
}

#[async_trait]
impl MailConnector for FakeServer {
    async fn connect(&self) -> Result<Box<dyn Mailbox>> {
        let mut state = self.state.lock();
        state.connects += 1;

        if state.refuse_connects {
            return Err(Error::ConnectTimeout {
                target: "imap.test:993".to_string(),
                timeout: Duration::from_secs(30),
            });
        }

        Ok(Box::new(FakeMailbox {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeMailbox {
    state: Arc<Mutex<MailState>>,
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn list_unseen(&mut self) -> Result<Vec<MessageRef>> {
        let mut state = self.state.lock();

        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(Error::SearchTimeout {
                timeout: Duration::from_secs(10),
            });
        }

        Ok(state
            .messages
            .keys()
            .filter(|uid| !state.processed.contains(uid))
            .copied()
            .map(MessageRef::new)
            .collect())
    }

    async fn fetch_raw(&mut self, message: MessageRef) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock();
        let uid = message.uid();

        if state.broken_fetches.contains(&uid) {
            return Err(Error::FetchTimeout {
                uid,
                timeout: Duration::from_secs(30),
            });
        }

        Ok(state.messages.get(&uid).cloned().flatten())
    }

    async fn mark_processed(&mut self, message: MessageRef) -> Result<()> {
        let mut state = self.state.lock();

        if state.failing_marks {
            return Err(Error::StoreTimeout {
                uid: message.uid(),
                timeout: Duration::from_secs(10),
            });
        }

        state.processed.push(message.uid());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.state.lock().logouts += 1;
        Ok(())
    }
}

/// Records requested URLs and answers every request with `200`, or with a
/// transport failure once [`RecordingFetcher::fail_with`] is set.
#[derive(Clone, Default)]
pub struct RecordingFetcher {
    requested: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: &str) {
        *self.failure.lock() = Some(error.to_string());
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.requested.lock().push(url.to_string());

        match self.failure.lock().as_deref() {
            Some(error) => FetchOutcome::failed(error),
            None => FetchOutcome::completed(200, url),
        }
    }
}
