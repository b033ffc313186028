use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use anyhow::anyhow;
use futures::FutureExt;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio::time::timeout;
use tokio::time::timeout_at;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::protocol::BotRejection;
use crate::bot::protocol::Capture;
use crate::bot::protocol::Reply;
use crate::bot::protocol::classify;
use crate::bot::state::Exchange;
use crate::bot::state::Expect;
use crate::bot::state::Operation;
use crate::bot::state::OperationKind;
use crate::bot::state::Outcome;
use crate::bot::state::PendingOperation;
use crate::client::IncomingMessage;
use crate::client::MessagingClient;
use crate::client::Outgoing;
use crate::client::Peer;
use crate::error::Result;
use crate::error::StickerError;
use crate::session::Session;
use crate::util::upload_format;

struct Active {
  pending: PendingOperation,
  cancel: Arc<Notify>,
}

struct Conversation {
  peer: Peer,
  replies: BoxStream<'static, IncomingMessage>,
  closed: bool,
}

/// Clears the active slot however the operation ends.
struct ActiveGuard<'a> {
  slot: &'a Mutex<Option<Active>>,
  idle: &'a Notify,
}

impl Drop for ActiveGuard<'_> {
  fn drop(&mut self) {
    let finished = lock(self.slot).take();
    if let Some(active) = finished {
      debug!(kind = %active.pending.kind, "operation finished");
    }
    self.idle.notify_waiters();
  }
}

fn lock(slot: &Mutex<Option<Active>>) -> MutexGuard<'_, Option<Active>> {
  slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs one `@Stickers` conversation at a time.
pub struct Dispatcher<C> {
  session: Arc<Session<C>>,
  bot_username: String,
  reply_timeout: Duration,
  active: Mutex<Option<Active>>,
  idle: Notify,
  conversation: tokio::sync::Mutex<Option<Conversation>>,
}

impl<C: MessagingClient> Dispatcher<C> {
  pub fn new(session: Arc<Session<C>>, bot_username: impl Into<String>, reply_timeout: Duration) -> Self {
    Self {
      session,
      bot_username: bot_username.into(),
      reply_timeout,
      active: Mutex::new(None),
      idle: Notify::new(),
      conversation: tokio::sync::Mutex::new(None),
    }
  }

  pub fn session(&self) -> &Arc<Session<C>> {
    &self.session
  }

  pub fn pending(&self) -> Option<PendingOperation> {
    lock(&self.active).as_ref().map(|active| active.pending.clone())
  }

  /// Aborts the active operation, whatever step it is in.
  pub fn cancel(&self) -> bool {
    match lock(&self.active).as_ref() {
      Some(active) => {
        info!(kind = %active.pending.kind, step = ?active.pending.step, "cancelling operation");
        active.cancel.notify_one();
        true
      },
      None => false,
    }
  }

  /// Resolves once no operation is running, including its `/cancel` reset.
  pub async fn idle(&self) {
    loop {
      let finished = self.idle.notified();
      if lock(&self.active).is_none() {
        return;
      }
      finished.await;
    }
  }

  pub async fn list_packs(&self) -> Result<Vec<String>> {
    match self.run(Operation::ListPacks).await? {
      Outcome::Packs(packs) => Ok(packs),
      other => Err(anyhow!("pack listing finished with {other:?}").into()),
    }
  }

  #[instrument(skip(self, operation), fields(kind = %operation.kind(), pack = operation.pack().unwrap_or("-")))]
  pub async fn run(&self, operation: Operation) -> Result<Outcome> {
    self.session.require_signed_in()?;
    for path in operation.uploads() {
      if upload_format(&path.to_string_lossy()).is_none() {
        return Err(StickerError::UnsupportedFile(path.to_path_buf()));
      }
    }

    let script = operation.script();
    let cancel = Arc::new(Notify::new());
    let _guard = self.begin(&operation, &script, cancel.clone())?;

    let mut slot = self.conversation.lock().await;
    let conversation = match slot.take() {
      Some(conversation) => conversation,
      None => self.open().await?,
    };
    let conversation = slot.insert(conversation);
    discard_stale(conversation);

    let result = self.drive(&operation, &script, conversation, &cancel).await;
    match &result {
      Ok(outcome) => info!(?outcome, "operation completed"),
      Err(err) => {
        warn!(error = %err, "operation failed");
        if !conversation.closed && !matches!(err, StickerError::BotRejected { reason: BotRejection::NoSets, .. }) {
          self.reset(conversation).await;
        }
      },
    }
    if conversation.closed {
      slot.take();
    }
    result
  }

  fn begin(&self, operation: &Operation, script: &[Exchange], cancel: Arc<Notify>) -> Result<ActiveGuard<'_>> {
    let mut active = lock(&self.active);
    if let Some(current) = active.as_ref() {
      return Err(StickerError::OperationInProgress(current.pending.kind));
    }
    let pending = PendingOperation::new(operation, script);
    info!(kind = %pending.kind, steps = pending.steps, "operation started");
    *active = Some(Active { pending, cancel });
    Ok(ActiveGuard {
      slot: &self.active,
      idle: &self.idle,
    })
  }

  fn advance(&self, index: usize, step: Expect) {
    if let Some(active) = lock(&self.active).as_mut() {
      active.pending.step_index = index;
      active.pending.step = step;
    }
  }

  async fn open(&self) -> Result<Conversation> {
    let client = self.session.client();
    let peer = client.resolve_username(&self.bot_username).await?;
    let replies = client.incoming(&peer).await?;
    info!(peer_id = peer.id, username = %peer.username, "opened sticker bot conversation");
    Ok(Conversation {
      peer,
      replies,
      closed: false,
    })
  }

  async fn drive(
    &self,
    operation: &Operation,
    script: &[Exchange],
    conversation: &mut Conversation,
    cancel: &Notify,
  ) -> Result<Outcome> {
    let kind = operation.kind();
    let mut offered: Option<Vec<String>> = None;
    let mut published: Option<String> = None;

    for (index, exchange) in script.iter().enumerate() {
      self.advance(index, exchange.expect);
      debug!(step = ?exchange.expect, send = %exchange.send.describe(), "sending to sticker bot");
      self
        .session
        .client()
        .send_message(&conversation.peer, &exchange.send)
        .await?;

      let msg = tokio::select! {
        biased;
        _ = cancel.notified() => return Err(StickerError::Cancelled(kind)),
        reply = timeout(self.reply_timeout, conversation.replies.next()) => match reply {
          Err(_) => {
            return Err(StickerError::BotTimeout {
              kind,
              step: exchange.expect,
              after: self.reply_timeout,
            });
          },
          Ok(None) => {
            conversation.closed = true;
            return Err(anyhow!("sticker bot conversation closed").into());
          },
          Ok(Some(msg)) => msg,
        },
      };
      debug!(step = ?exchange.expect, reply = %msg.text, "sticker bot replied");

      match classify(exchange.expect, &msg) {
        Reply::Matched(Capture::NoSets) if kind == OperationKind::ListPacks => {
          return Ok(Outcome::Packs(Vec::new()));
        },
        Reply::Matched(Capture::NoSets) => {
          return Err(StickerError::BotRejected {
            kind,
            reason: BotRejection::NoSets,
          });
        },
        Reply::Matched(Capture::Sets(sets)) => {
          let missing = operation
            .pack()
            .is_some_and(|pack| !sets.is_empty() && !sets.iter().any(|set| set == pack));
          if kind != OperationKind::ListPacks && missing {
            return Err(StickerError::BotRejected {
              kind,
              reason: BotRejection::InvalidSet,
            });
          }
          offered = Some(sets);
        },
        Reply::Matched(Capture::ShortName(name)) => published = Some(name),
        Reply::Matched(Capture::Nothing) => {},
        Reply::Rejected(reason) => return Err(StickerError::BotRejected { kind, reason }),
        Reply::Unexpected => {
          return Err(StickerError::BotProtocolMismatch {
            kind,
            step: exchange.expect,
            reply: msg.text,
          });
        },
      }
    }

    Ok(match operation {
      Operation::ListPacks => Outcome::Packs(offered.unwrap_or_default()),
      Operation::NewPack(new) => Outcome::Published {
        short_name: published.unwrap_or_else(|| new.short_name.clone()),
      },
      _ => Outcome::Done,
    })
  }

  /// Leaves the bot outside any command after a failed or cancelled operation.
  async fn reset(&self, conversation: &mut Conversation) {
    let cancel = Outgoing::text(Command::Cancel.as_str());
    if let Err(err) = self.session.client().send_message(&conversation.peer, &cancel).await {
      warn!(error = %err, "failed to reset sticker bot conversation");
      return;
    }
    // Late replies to the abandoned step may arrive before the acknowledgement.
    let deadline = Instant::now() + self.reply_timeout;
    loop {
      match timeout_at(deadline, conversation.replies.next()).await {
        Ok(Some(msg)) => match classify(Expect::Cancelled, &msg) {
          Reply::Matched(_) => {
            debug!("sticker bot conversation reset");
            return;
          },
          _ => debug!(reply = %msg.text, "discarding reply to the abandoned step"),
        },
        Ok(None) => {
          conversation.closed = true;
          return;
        },
        Err(_) => {
          warn!("sticker bot did not acknowledge /cancel");
          return;
        },
      }
    }
  }
}

fn discard_stale(conversation: &mut Conversation) {
  while let Some(next) = conversation.replies.next().now_or_never() {
    match next {
      Some(msg) => debug!(reply = %msg.text, "discarding stale sticker bot message"),
      None => {
        conversation.closed = true;
        break;
      },
    }
  }
}
