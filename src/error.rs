use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::bot::protocol::BotRejection;
use crate::bot::state::Expect;
use crate::bot::state::OperationKind;
use crate::session::SignInState;

pub type Result<T, E = StickerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StickerError {
  #[error("not signed in to Telegram")]
  AuthRequired,
  #[error("cannot {action} while sign-in state is {state:?}")]
  InvalidAuthStep { action: &'static str, state: SignInState },
  #[error("invalid phone number: {0}")]
  InvalidPhone(String),
  #[error("another {0} operation is still in progress")]
  OperationInProgress(OperationKind),
  #[error("no reply from the sticker bot after {after:?} while waiting for {step:?} ({kind})")]
  BotTimeout {
    kind: OperationKind,
    step: Expect,
    after: Duration,
  },
  #[error("unexpected sticker bot reply while waiting for {step:?} ({kind}): {reply}")]
  BotProtocolMismatch {
    kind: OperationKind,
    step: Expect,
    reply: String,
  },
  #[error("sticker bot refused {kind}: {reason}")]
  BotRejected { kind: OperationKind, reason: BotRejection },
  #[error("{0} was cancelled")]
  Cancelled(OperationKind),
  #[error("{} is not a PNG, WEBP, TGS or WEBM file", .0.display())]
  UnsupportedFile(PathBuf),
  #[error("sticker pack {0} not found")]
  PackNotFound(String),
  #[error("sync incomplete, failed packs: {}", failed_names(.failed))]
  PartialSync { failed: Vec<(String, String)> },
  #[error("pack cache i/o failed: {0}")]
  CacheIo(#[from] io::Error),
  #[error("pack cache is malformed: {0}")]
  CacheFormat(#[from] serde_json::Error),
  #[error(transparent)]
  Client(#[from] anyhow::Error),
}

fn failed_names(failed: &[(String, String)]) -> String {
  failed
    .iter()
    .map(|(name, reason)| format!("{name} ({reason})"))
    .collect::<Vec<_>>()
    .join(", ")
}
