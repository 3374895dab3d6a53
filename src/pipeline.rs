//! Per-message processing: fetch, extract, find, decode, request, mark.
//!
//! Every message that gets past the fetch is marked processed, whether or not a link
//! was found, so it is not picked up again on the next pass.

use crate::content;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::links::LinkFinder;
use crate::mailbox::{MailConnector, Mailbox, MessageRef};
use crate::status::{ProcessingResult, NO_BODY, NO_LINK};
use crate::target;
use tracing::{debug, info, instrument, warn};

/// Handles one unseen message end to end.
///
/// Marking is best-effort: a failed flag update is logged and the result still
/// returned, so a confirmation request that was already sent gets counted.
///
/// # Errors
///
/// Returns an error if the message cannot be fetched. Link and HTTP problems are
/// reported in the returned [`ProcessingResult`].
#[instrument(name = "pipeline::process_message", skip_all, fields(uid = %uid))]
pub async fn process_message(
    mailbox: &mut dyn Mailbox,
    uid: MessageRef,
    finder: &LinkFinder,
    fetcher: &dyn Fetcher,
) -> Result<ProcessingResult> {
    let raw = mailbox.fetch_raw(uid).await?;

    let Some(body) = raw.as_deref().and_then(content::extract_body) else {
        debug!("No decodable body");
        mark(mailbox, uid).await;
        return Ok(ProcessingResult::skipped(uid, NO_BODY));
    };

    let links = finder.find_links(&body);
    let Some(chosen) = finder.choose(&links) else {
        debug!("No confirmation link");
        mark(mailbox, uid).await;
        return Ok(ProcessingResult::skipped(uid, NO_LINK));
    };

    let url = target::resolve_target(chosen);
    debug!(candidates = links.len(), link = %chosen, url = %url, "Resolved confirmation target");

    let outcome = fetcher.fetch(&url).await;
    mark(mailbox, uid).await;

    Ok(ProcessingResult::fetched(uid, &outcome))
}

/// Opens a dedicated session, handles every currently unseen message and logs out.
///
/// A message that fails before it is handled is reported as an errored result.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the listing fails.
#[instrument(name = "pipeline::scan_once", skip_all)]
pub async fn scan_once(
    connector: &dyn MailConnector,
    finder: &LinkFinder,
    fetcher: &dyn Fetcher,
) -> Result<Vec<ProcessingResult>> {
    let mut mailbox = connector.connect().await?;

    let unseen = match mailbox.list_unseen().await {
        Ok(unseen) => unseen,
        Err(e) => {
            close(mailbox.as_mut()).await;
            return Err(e);
        }
    };

    let mut results = Vec::with_capacity(unseen.len());
    for uid in unseen {
        match process_message(mailbox.as_mut(), uid, finder, fetcher).await {
            Ok(result) => {
                info!(uid = %uid, detail = %result.detail, "Processed message");
                results.push(result);
            }
            Err(e) => {
                warn!(uid = %uid, error = %e, "Failed to process message");
                results.push(ProcessingResult::errored(uid, &e));
            }
        }
    }

    close(mailbox.as_mut()).await;
    Ok(results)
}

/// Flags the message processed, logging instead of failing.
async fn mark(mailbox: &mut dyn Mailbox, uid: MessageRef) {
    if let Err(e) = mailbox.mark_processed(uid).await {
        warn!(uid = %uid, error = %e, "Failed to mark message processed");
    }
}

/// Best-effort logout.
pub(crate) async fn close(mailbox: &mut dyn Mailbox) {
    if let Err(e) = mailbox.logout().await {
        debug!(error = %e, "Logout failed");
    }
}
