use auto_confirm::server::{self, AppState};
use auto_confirm::{
    AppConfig, Error, HttpFetcher, ImapConnector, LinkFinder, MailConnector, StatusHandle, Worker,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> auto_confirm::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    info!(
        imap_host = %config.mail.host,
        mailbox = %config.mail.mailbox,
        processed_folder = ?config.mail.processed_folder,
        proxy_enabled = config.mail.proxy.is_some(),
        bind_addr = %config.bind_addr,
        "Starting auto-confirm v{}",
        env!("CARGO_PKG_VERSION")
    );

    let connector: Arc<dyn MailConnector> = Arc::new(ImapConnector::new(config.mail.clone()));
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let finder = LinkFinder::with_marker(&config.link_marker);
    let status = StatusHandle::new();

    let worker = Worker::new(
        connector.clone(),
        fetcher.clone(),
        finder.clone(),
        config.polling.clone(),
        status.clone(),
    )
    .spawn();

    let app = server::router(AppState {
        status,
        connector,
        fetcher,
        finder: Arc::new(finder),
    });

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| Error::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
    info!(addr = %config.bind_addr, "Status server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Error::Serve { source });

    worker.stop().await;
    info!("Shut down");

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
