use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::Bot;
use tokio::fs;
use tokio::time::timeout;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Dispatcher;
use crate::cache::PackCache;
use crate::client::MessagingClient;
use crate::config::Config;
use crate::session::Session;
use crate::source::BotApiSource;
use crate::source::StickerSetSource;
use crate::sync::Stickers;

const SHUTDOWN_MARGIN: Duration = Duration::from_secs(1);

/// Everything a front end needs, wired once at startup.
pub struct App<C, S> {
  config: Config,
  session: Arc<Session<C>>,
  stickers: Arc<Stickers<C, S>>,
}

impl<C: MessagingClient, S: StickerSetSource> App<C, S> {
  #[instrument(skip_all, fields(user = %config.user, data_dir = %config.data_dir.display()))]
  pub async fn init(config: Config, client: Arc<C>, source: S) -> anyhow::Result<Self> {
    for dir in [config.user_dir(), config.cache_dir()] {
      fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    }

    let session = Arc::new(Session::new(client));
    let state = session.resume().await.context("resuming session")?;
    info!(?state, "session resumed");

    let dispatcher = Arc::new(Dispatcher::new(
      session.clone(),
      config.sticker_bot.clone(),
      config.reply_timeout,
    ));
    let stickers = Arc::new(Stickers::new(dispatcher, source, PackCache::new(config.cache_dir())));

    Ok(Self {
      config,
      session,
      stickers,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn session(&self) -> &Arc<Session<C>> {
    &self.session
  }

  pub fn stickers(&self) -> &Arc<Stickers<C, S>> {
    &self.stickers
  }

  /// Cancels any running operation, lets it reset the bot conversation, then disconnects.
  pub async fn shutdown(&self) -> anyhow::Result<()> {
    if self.stickers.cancel() {
      info!("cancelled pending sticker bot operation");
      let grace = self.config.reply_timeout + SHUTDOWN_MARGIN;
      if timeout(grace, self.stickers.dispatcher().idle()).await.is_err() {
        warn!(?grace, "sticker bot operation still running, disconnecting anyway");
      }
    }
    self.session.client().disconnect().await.context("disconnecting client")?;
    info!("shut down");
    Ok(())
  }
}

impl<C: MessagingClient> App<C, BotApiSource> {
  /// Reads sticker sets through the Bot API using the configured token.
  pub async fn with_bot_api(config: Config, client: Arc<C>) -> anyhow::Result<Self> {
    let source = BotApiSource::new(Bot::new(config.bot_token.clone()));
    Self::init(config, client, source).await
  }
}
