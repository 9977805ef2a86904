use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::api::server::RouteError;
use crate::bot::Bot;
use crate::bot::achievements::Notice;
use crate::db::prelude::*;
use crate::irc::client::IrcClientErr;
use crate::scoring::config::{ConfigError, ScoringConfig};
use crate::util::env::{self, EnvErr, Var};
use crate::util::telemetry;

mod api;
mod bot;
mod constants;
mod db;
mod games;
mod irc;
mod scoring;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Irc(#[from] IrcClientErr),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    tracing::info!("starting main application");

    let vars = env::env().await?;
    let config = ScoringConfig::load(var!(Var::ScoringConfigPath).await.ok())?;
    tracing::info!(
        hashtags = config.hashtags.len(),
        levels = config.levels.bands().len(),
        "scoring config loaded"
    );
    if config.hashtags.is_empty() {
        tracing::warn!("hashtag table is empty, no message will earn points");
    }

    let ledger = open_ledger(&config).await?;
    let (tx_notice, rx_notice) = mpsc::unbounded_channel::<Notice>();
    let bot = Arc::new(Bot::new(&config, ledger, tx_notice));

    let mut handles = vec![bot.spawn_game_sweeper()];

    if vars.irc_enabled() {
        let irc_handles =
            irc::client::irc_runner(Arc::clone(&bot), vars.irc_channels.clone(), rx_notice)
                .await?;
        handles.extend(irc_handles);
    } else {
        tracing::warn!("IRC_NICKNAME, IRC_TOKEN or IRC_CHANNELS unset, chat transport disabled");
        handles.push(log_notices(rx_notice));
    }

    let server_handles = api::server::start_server(bot, vars.server_api_port).await?;
    handles.extend(server_handles);

    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}

async fn open_ledger(config: &ScoringConfig) -> Result<Arc<dyn Ledger>> {
    if var!(Var::DatabaseUrl).await.is_err() {
        tracing::warn!("DATABASE_URL unset, points are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryLedger::new(config.levels.clone())));
    }

    let pool = db::db_pool().await?;
    Ok(Arc::new(PgLedger::new(pool.clone(), config.levels.clone())))
}

/// Without a chat transport, notices only reach the log.
fn log_notices(mut rx: UnboundedReceiver<Notice>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = rx.recv().await {
            tracing::info!(chat = %notice.chat_id, text = %notice.text, "notice");
        }
    })
}
