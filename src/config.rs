use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;

const DEFAULT_DATA_DIR: &str = "tgsticker";
const DEFAULT_USER: &str = "user";
const DEFAULT_STICKER_BOT: &str = "Stickers";
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
  pub api_id: i32,
  pub api_hash: String,
  pub bot_token: String,
  pub data_dir: PathBuf,
  pub user: String,
  pub sticker_bot: String,
  pub reply_timeout: Duration,
  pub log_file: Option<PathBuf>,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let api_id = env::var("TG_API_ID")
      .context("TG_API_ID must be set")?
      .trim()
      .parse::<i32>()
      .context("TG_API_ID must be an integer")?;
    let api_hash = env::var("TG_API_HASH").context("TG_API_HASH must be set")?;
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let data_dir = env::var("TGSTICKER_DATA_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let user = env::var("TGSTICKER_USER").unwrap_or_else(|_| DEFAULT_USER.to_string());
    let sticker_bot = env::var("STICKER_BOT").unwrap_or_else(|_| DEFAULT_STICKER_BOT.to_string());
    let reply_timeout = parse_timeout(&env::var("BOT_REPLY_TIMEOUT_SECS").unwrap_or_default());
    let log_file = env::var("TGSTICKER_LOG_FILE").ok().map(PathBuf::from);
    Ok(Self {
      api_id,
      api_hash,
      bot_token,
      data_dir,
      user,
      sticker_bot: normalize_username(&sticker_bot),
      reply_timeout,
      log_file,
    })
  }

  pub fn users_dir(&self) -> PathBuf {
    self.data_dir.join("users")
  }

  pub fn user_dir(&self) -> PathBuf {
    self.users_dir().join(&self.user)
  }

  /// Where the user client keeps its session.
  pub fn session_file(&self) -> PathBuf {
    self.user_dir().join(&self.user)
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.data_dir.join("cache")
  }
}

fn parse_timeout(raw: &str) -> Duration {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return DEFAULT_REPLY_TIMEOUT;
  }
  match trimmed.parse::<u64>() {
    Ok(0) => {
      tracing::warn!(value = trimmed, "BOT_REPLY_TIMEOUT_SECS must be positive");
      DEFAULT_REPLY_TIMEOUT
    },
    Ok(secs) => Duration::from_secs(secs),
    Err(err) => {
      tracing::warn!(value = trimmed, error = %err, "invalid BOT_REPLY_TIMEOUT_SECS");
      DEFAULT_REPLY_TIMEOUT
    },
  }
}

fn normalize_username(raw: &str) -> String {
  let trimmed = raw.trim().trim_start_matches('@');
  if trimmed.is_empty() {
    DEFAULT_STICKER_BOT.to_string()
  } else {
    trimmed.to_string()
  }
}
