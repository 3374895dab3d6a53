//! Internal IMAP session commands.
//!
//! Thin wrappers over async-imap that attach context to errors. Streams returned by
//! async-imap are always drained before returning so the next command can be issued.

use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::Session;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Authenticates to the IMAP server and returns a session.
#[instrument(name = "session::authenticate", skip_all, fields(username = %username))]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    username: &str,
    password: &str,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(username, password)
        .await
        .map_err(|e| Error::ImapLogin {
            username: username.to_string(),
            source: e.0,
        })
}

/// Selects a mailbox, refreshing the server's view of it.
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    Ok(())
}

/// Returns the UIDs of all unseen messages in the selected mailbox, ascending.
///
/// A `NO` reply yields an empty list.
#[instrument(name = "session::search_unseen", skip(session))]
pub(crate) async fn search_unseen(session: &mut ImapSession) -> Result<Vec<u32>> {
    let uids = match session.uid_search("UNSEEN").await {
        Ok(uids) => uids,
        // A NO reply means there is nothing to work on; transport errors still fail.
        Err(async_imap::error::Error::No(reason)) => {
            debug!(reason = %reason, "Search refused, treating as empty");
            return Ok(Vec::new());
        }
        Err(source) => return Err(Error::ImapSearch { source }),
    };

    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();

    debug!(unseen = uids.len(), "Searched for unseen messages");

    Ok(uids)
}

/// Fetches the full RFC 822 content of one message, `None` if the server refuses.
///
/// `BODY.PEEK[]` leaves the `\Seen` flag alone; flags are set explicitly once the
/// message has been handled.
#[instrument(name = "session::fetch_raw", skip(session))]
pub(crate) async fn fetch_raw(session: &mut ImapSession, uid: u32) -> Result<Option<Vec<u8>>> {
    let fetched = match session.uid_fetch(uid.to_string(), "BODY.PEEK[]").await {
        Ok(stream) => stream.try_collect::<Vec<_>>().await,
        Err(e) => Err(e),
    };

    let fetches = match fetched {
        Ok(fetches) => fetches,
        Err(async_imap::error::Error::No(reason)) => {
            debug!(reason = %reason, "Fetch refused");
            return Ok(None);
        }
        Err(source) => return Err(Error::ImapFetch { uid, source }),
    };

    let body = body_for(
        fetches.iter().map(|fetch| (fetch.uid, fetch.body())),
        uid,
    );

    debug!(found = body.is_some(), "Fetched message");

    Ok(body)
}

/// Picks the body returned for `uid`; responses left over from an abandoned command
/// can carry other UIDs.
fn body_for<'a>(
    responses: impl IntoIterator<Item = (Option<u32>, Option<&'a [u8]>)>,
    uid: u32,
) -> Option<Vec<u8>> {
    responses
        .into_iter()
        .filter(|(fetched, _)| *fetched == Some(uid))
        .find_map(|(_, body)| body)
        .map(<[u8]>::to_vec)
}

/// Adds flags to one message, e.g. `\Seen \Answered`.
#[instrument(name = "session::add_flags", skip(session))]
pub(crate) async fn add_flags(session: &mut ImapSession, uid: u32, flags: &str) -> Result<()> {
    session
        .uid_store(uid.to_string(), format!("+FLAGS ({flags})"))
        .await
        .map_err(|source| Error::ImapStore { uid, source })?
        .try_collect::<Vec<_>>()
        .await
        .map_err(|source| Error::ImapStore { uid, source })?;

    Ok(())
}

/// Creates a folder. Fails when it already exists, which callers tolerate.
#[instrument(name = "session::create_folder", skip(session))]
pub(crate) async fn create_folder(session: &mut ImapSession, folder: &str) -> Result<()> {
    session
        .create(folder)
        .await
        .map_err(|source| Error::Filing {
            folder: folder.to_string(),
            source,
        })
}

/// Copies one message into `folder`.
#[instrument(name = "session::copy", skip(session))]
pub(crate) async fn copy_message(session: &mut ImapSession, uid: u32, folder: &str) -> Result<()> {
    session
        .uid_copy(uid.to_string(), folder)
        .await
        .map_err(|source| Error::Filing {
            folder: folder.to_string(),
            source,
        })
}

/// Permanently removes messages flagged `\Deleted` from the selected mailbox.
#[instrument(name = "session::expunge", skip(session))]
pub(crate) async fn expunge(session: &mut ImapSession, folder: &str) -> Result<()> {
    let removed = session
        .expunge()
        .await
        .map_err(|source| Error::Filing {
            folder: folder.to_string(),
            source,
        })?
        .collect::<Vec<_>>()
        .await;

    debug!(removed = removed.len(), "Expunged mailbox");

    Ok(())
}

/// Logs out from IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_for_ignores_other_uids() {
        let responses = [
            (Some(3), Some(&b"stale"[..])),
            (Some(7), None),
            (Some(7), Some(&b"wanted"[..])),
        ];

        assert_eq!(body_for(responses, 7), Some(b"wanted".to_vec()));
    }

    #[test]
    fn test_body_for_missing_uid() {
        assert_eq!(body_for([(Some(3), Some(&b"stale"[..]))], 7), None);
        assert_eq!(body_for([(None, Some(&b"untagged"[..]))], 7), None);
    }
}
