// src/lib.rs
//! Backend for the election hub frontend.
//!
//! - [`ingest`]: scheduled news fetch with insert-if-absent storage
//! - [`store`]: SQLite and in-memory backends for news and vote tallies
//! - [`api`]: HTTP routes (news reader, votes, accounts, election results proxy)
//! - [`auth`]: password hashing, JWT issue/verify and the bearer extractor
//! - [`elections`]: FEC pass-through client
//!
//! Public library surface is also what the integration tests use.

pub mod api;
pub mod auth;
pub mod config;
pub mod elections;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;
pub mod votes;

pub use crate::api::create_router;
pub use crate::config::Config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::api::AppState;
use crate::auth::Authenticator;
use crate::elections::FecClient;
use crate::ingest::providers::currents::CurrentsFeed;
use crate::ingest::scheduler::{Cadence, Scheduler, SchedulerHandle};
use crate::ingest::NewsIngestor;
use crate::store::sqlite::{self, SqliteStore};
use crate::store::NewsStore;

/// Schedule the news ingestion job. Returns `None` when no feed credential is configured.
pub fn start_news_ingest(
    config: &Config,
    store: Arc<dyn NewsStore>,
) -> Result<Option<SchedulerHandle>> {
    let Some(key) = config.news_api_key.clone() else {
        warn!("NEWS_API_KEY not set, news ingestion disabled");
        return Ok(None);
    };

    let feed = CurrentsFeed::from_config(&config.ingest, key).context("building news feed")?;
    let cadence = Cadence::cron(&config.ingest.schedule)
        .with_context(|| format!("invalid ingest schedule `{}`", config.ingest.schedule))?;

    let ingestor = NewsIngestor::new(Arc::new(feed), store);
    let handle = Scheduler::new(cadence)
        .run_at_startup(config.ingest.run_at_startup)
        .start(Arc::new(ingestor));
    Ok(Some(handle))
}

/// Build the token signer from config. Without `JWT_SECRET` a random secret is
/// generated, so issued tokens stop verifying after a restart.
pub fn build_authenticator(config: &Config) -> Authenticator {
    let secret = match &config.jwt_secret {
        Some(s) => s.as_bytes().to_vec(),
        None => {
            warn!("JWT_SECRET not set, using a random per-process secret");
            let mut buf = [0u8; 32];
            rand::Rng::fill(&mut rand::rng(), &mut buf);
            buf.to_vec()
        }
    };
    Authenticator::new(&secret, config.jwt_ttl, auth::BCRYPT_COST)
}

/// Boot the whole service and block until shutdown.
pub async fn run(config: Config) -> Result<()> {
    info!("Connecting to database...");
    let pool = sqlite::connect(&config.database_url, config.database_timeout).await?;
    sqlite::ensure_schema(&pool)
        .await
        .context("creating schema")?;
    let store = Arc::new(SqliteStore::new(pool.clone()));

    let fec = FecClient::new(
        config.fec_base_url.clone(),
        config.fec_api_key.clone(),
        config.fec_timeout,
    )?;

    let authn = Arc::new(build_authenticator(&config));
    if config.seed_test_user {
        auth::seed_test_user(store.as_ref(), &authn)
            .await
            .context("seeding test user")?;
    }

    let state = AppState {
        news: store.clone(),
        votes: store.clone(),
        users: store.clone(),
        auth: authn,
        fec: Arc::new(fec),
    };
    let mut app = create_router(state);

    match crate::metrics::Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics disabled"),
    }

    let scheduler = start_news_ingest(&config, store)?;

    info!("Binding to {}", config.bind);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Server running on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("Server shutting down...");
    if let Some(s) = scheduler {
        s.stop().await;
    }
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
