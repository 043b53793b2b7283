//! # civic-bot
//!
//! Assembles the adapters, the engine and the HTTP surface, then receives
//! Telegram updates by long polling or through the webhook route.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, RouterSettings};
use configs::{AppConfig, Delivery, LogFormat, StorageConfig};
use domains::{ChatTransport, IssueStore, MediaStore};
use secrecy::ExposeSecret;
use services::{BotEngine, EngineSettings, Ports};
use storage_adapters::{LocalMediaStore, MemoryIssueStore};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use transport_adapters::{PollingRunner, TelegramClient};

#[cfg(feature = "db-postgres")]
use storage_adapters::PgIssueStore;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("civic_bot=info,services=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn IssueStore>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryIssueStore::new()))
        }
        #[cfg(feature = "db-postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            let store = PgIssueStore::connect(url.expose_secret(), *max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("postgres storage ready");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageConfig::Postgres { .. } => {
            anyhow::bail!("built without db-postgres; set STORAGE=memory")
        }
    }
}

async fn shutdown_signal(notify: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
    let _ = notify.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.log_format);

    // 1. Storage
    let store = open_store(&config.storage).await?;
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(&config.server.upload_dir));

    // 2. Chat transport
    let client = Arc::new(TelegramClient::new(
        config.telegram.api_base.clone(),
        config.telegram.token.clone(),
        &config.server.upload_dir,
    )?);
    let transport: Arc<dyn ChatTransport> = client.clone();

    // 3. Engine
    let mut settings = EngineSettings::new(config.admin_secret.expose_secret());
    settings.broadcast_delay = config.broadcast_delay;
    let engine = Arc::new(BotEngine::new(Ports::new(store, transport, media), settings));

    // 4. HTTP surface
    let state = AppState::new(
        engine.clone(),
        config.api_token.clone(),
        config.webhook_secret(),
    );
    let app = router(
        state,
        &RouterSettings {
            webhook_path: config.server.webhook_path.clone(),
            upload_dir: config.server.upload_dir.clone(),
        },
    );

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "civic-bot listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 5. Inbound delivery
    let poller = match &config.delivery {
        Delivery::Webhook { url, secret } => {
            client
                .set_webhook(url, secret.as_ref().map(|s| s.expose_secret()))
                .await
                .context("registering webhook")?;
            tracing::info!(path = %config.server.webhook_path, "webhook registered");
            None
        }
        Delivery::Polling => {
            let runner = PollingRunner::new(client.clone(), engine.clone());
            Some(tokio::spawn(runner.run(shutdown_rx.clone())))
        }
    };

    let mut server_shutdown = shutdown_rx.clone();
    tokio::spawn(shutdown_signal(shutdown_tx));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("http server")?;

    if let Some(poller) = poller {
        poller.await??;
    }
    tracing::info!("civic-bot stopped");
    Ok(())
}
