//! Per-message processing and the one-shot scan against an in-memory mailbox.

mod common;

use auto_confirm::pipeline::{process_message, scan_once};
use auto_confirm::status::{NO_BODY, NO_LINK};
use auto_confirm::{ErrorCategory, LinkFinder, MailConnector, MessageRef};
use common::{
    empty_message, html_message, FakeServer, RecordingFetcher, CONFIRM_URL, REDIRECT_HREF,
};

#[tokio::test]
async fn test_redirect_link_is_unwrapped_and_requested() {
    let server = FakeServer::new();
    server.deliver(7, html_message(REDIRECT_HREF));
    let fetcher = RecordingFetcher::new();

    let mut mailbox = server.connect().await.unwrap();
    let result = process_message(
        mailbox.as_mut(),
        MessageRef::new(7),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap();

    assert_eq!(fetcher.requested(), vec![CONFIRM_URL.to_string()]);
    assert_eq!(server.processed(), vec![7]);
    assert_eq!(result.uid, MessageRef::new(7));
    assert!(result.succeeded);
    assert_eq!(result.detail, format!("status=200,final={CONFIRM_URL}"));
}

#[tokio::test]
async fn test_plain_confirmation_link_is_requested_as_is() {
    let server = FakeServer::new();
    server.deliver(1, html_message("https://shop.test/account/verify?t=abc"));
    let fetcher = RecordingFetcher::new();

    let mut mailbox = server.connect().await.unwrap();
    process_message(
        mailbox.as_mut(),
        MessageRef::new(1),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap();

    assert_eq!(fetcher.requested(), vec!["https://shop.test/account/verify?t=abc"]);
}

#[tokio::test]
async fn test_missing_body_is_marked_without_request() {
    let server = FakeServer::new();
    server.deliver_without_body(3);
    server.deliver(4, empty_message());
    let fetcher = RecordingFetcher::new();
    let finder = LinkFinder::default();

    let mut mailbox = server.connect().await.unwrap();
    for uid in [3, 4] {
        let result = process_message(mailbox.as_mut(), MessageRef::new(uid), &finder, &fetcher)
            .await
            .unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.detail, NO_BODY);
    }

    assert!(fetcher.requested().is_empty());
    assert_eq!(server.processed(), vec![3, 4]);
}

#[tokio::test]
async fn test_body_without_candidates_is_marked_no_link() {
    let server = FakeServer::new();
    server.deliver(5, html_message("https://news.test/unsubscribe"));
    let fetcher = RecordingFetcher::new();

    let mut mailbox = server.connect().await.unwrap();
    let result = process_message(
        mailbox.as_mut(),
        MessageRef::new(5),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap();

    assert_eq!(result.detail, NO_LINK);
    assert!(!result.succeeded);
    assert!(fetcher.requested().is_empty());
    assert_eq!(server.processed(), vec![5]);
}

#[tokio::test]
async fn test_fetch_error_leaves_message_unmarked() {
    let server = FakeServer::new();
    server.deliver(9, html_message(REDIRECT_HREF));
    server.break_fetch(9);
    let fetcher = RecordingFetcher::new();

    let mut mailbox = server.connect().await.unwrap();
    let err = process_message(
        mailbox.as_mut(),
        MessageRef::new(9),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Fetch);
    assert!(server.processed().is_empty());
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn test_scan_once_reports_every_unseen_message() {
    let server = FakeServer::new();
    server.deliver(1, html_message(REDIRECT_HREF));
    server.deliver(2, html_message("https://news.test/unsubscribe"));
    server.deliver(3, html_message(REDIRECT_HREF));
    server.break_fetch(3);
    let fetcher = RecordingFetcher::new();

    let results = scan_once(&server, &LinkFinder::default(), &fetcher)
        .await
        .unwrap();

    let uids: Vec<_> = results.iter().map(|r| r.uid.uid()).collect();
    assert_eq!(uids, vec![1, 2, 3]);
    assert_eq!(results[0].detail, format!("status=200,final={CONFIRM_URL}"));
    assert_eq!(results[1].detail, NO_LINK);
    assert!(!results[2].succeeded);
    assert_eq!(results[2].detail, "message fetch timeout for UID 3 after 30s");
    assert_eq!(server.processed(), vec![1, 2]);
    assert_eq!(server.logouts(), 1);
}

#[tokio::test]
async fn test_failed_flag_update_still_returns_result() {
    let server = FakeServer::new();
    server.deliver(8, html_message(REDIRECT_HREF));
    server.fail_marks(true);
    let fetcher = RecordingFetcher::new();

    let mut mailbox = server.connect().await.unwrap();
    let result = process_message(
        mailbox.as_mut(),
        MessageRef::new(8),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap();

    assert!(result.succeeded);
    assert_eq!(fetcher.requested(), vec![CONFIRM_URL.to_string()]);
    assert!(server.processed().is_empty());
}

#[tokio::test]
async fn test_failed_request_is_recorded_and_marked() {
    let server = FakeServer::new();
    server.deliver(6, html_message(REDIRECT_HREF));
    let fetcher = RecordingFetcher::new();
    fetcher.fail_with("connection refused");

    let mut mailbox = server.connect().await.unwrap();
    let result = process_message(
        mailbox.as_mut(),
        MessageRef::new(6),
        &LinkFinder::default(),
        &fetcher,
    )
    .await
    .unwrap();

    assert!(!result.succeeded);
    assert_eq!(result.detail, "status=none,final=connection refused");
    assert_eq!(fetcher.requested(), vec![CONFIRM_URL.to_string()]);
    assert_eq!(server.processed(), vec![6]);
}

#[tokio::test]
async fn test_scan_once_with_nothing_unseen() {
    let server = FakeServer::new();
    let fetcher = RecordingFetcher::new();

    let results = scan_once(&server, &LinkFinder::default(), &fetcher)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert!(fetcher.requested().is_empty());
    assert_eq!(server.logouts(), 1);
}

#[tokio::test]
async fn test_scan_once_listing_failure_closes_session() {
    let server = FakeServer::new();
    server.fail_next_lists(1);

    let err = scan_once(&server, &LinkFinder::default(), &RecordingFetcher::new())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::List);
    assert_eq!(server.logouts(), 1);
}

#[tokio::test]
async fn test_scan_once_connect_failure() {
    let server = FakeServer::new();
    server.refuse_connects(true);

    let err = scan_once(&server, &LinkFinder::default(), &RecordingFetcher::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::Connect);
}
