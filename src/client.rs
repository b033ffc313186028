//! The user-account Telegram client this crate drives.
//!
//! Transport, session storage and the login handshake belong to the
//! implementation; this crate only needs the handful of calls below.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::Serialize;

use crate::models::StickerRef;

/// A resolved chat partner, e.g. the `@Stickers` bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
  pub id: i64,
  pub username: String,
}

/// Opaque token returned when a login code is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
  SignedIn,
  PasswordRequired { hint: Option<String> },
}

/// A message sent by the user to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
  Text(String),
  /// Upload a local file as a document.
  File(PathBuf),
  /// Re-send an existing sticker.
  Sticker(StickerRef),
}

impl Outgoing {
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text(text.into())
  }

  /// Short form for logs.
  pub fn describe(&self) -> String {
    match self {
      Self::Text(text) => text.clone(),
      Self::File(path) => format!("<file {}>", path.display()),
      Self::Sticker(sticker) => format!("<sticker {} from {}>", sticker.file_id, sticker.pack),
    }
  }
}

/// A message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncomingMessage {
  pub id: i32,
  pub text: String,
  /// Reply keyboard rows attached to the message.
  pub keyboard: Vec<Vec<String>>,
}

impl IncomingMessage {
  pub fn new(id: i32, text: impl Into<String>) -> Self {
    Self {
      id,
      text: text.into(),
      keyboard: Vec::new(),
    }
  }

  pub fn with_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
    self.keyboard = rows;
    self
  }

  pub fn buttons(&self) -> impl Iterator<Item = &str> {
    self.keyboard.iter().flatten().map(String::as_str)
  }
}

#[async_trait]
pub trait MessagingClient: Send + Sync + 'static {
  /// Whether the stored session is already authorized.
  async fn is_authorized(&self) -> anyhow::Result<bool>;

  async fn request_login_code(&self, phone: &str) -> anyhow::Result<LoginToken>;

  async fn sign_in(&self, token: &LoginToken, code: &str) -> anyhow::Result<SignInOutcome>;

  async fn check_password(&self, password: &str) -> anyhow::Result<()>;

  async fn sign_out(&self) -> anyhow::Result<()>;

  async fn resolve_username(&self, username: &str) -> anyhow::Result<Peer>;

  /// Sends a message and returns its id.
  async fn send_message(&self, peer: &Peer, message: &Outgoing) -> anyhow::Result<i32>;

  /// Messages arriving from `peer` from now on, in order.
  async fn incoming(&self, peer: &Peer) -> anyhow::Result<BoxStream<'static, IncomingMessage>>;

  async fn disconnect(&self) -> anyhow::Result<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::IncomingMessage;
  use super::Outgoing;
  use crate::models::StickerRef;

  #[test]
  fn flattens_keyboard_buttons() {
    let msg = IncomingMessage::new(1, "Choose a sticker set.")
      .with_keyboard(vec![vec!["cats".into(), "dogs".into()], vec!["birds".into()]]);
    assert_eq!(msg.buttons().collect::<Vec<_>>(), vec!["cats", "dogs", "birds"]);
  }

  #[test]
  fn describes_outgoing_messages() {
    let sticker = Outgoing::Sticker(StickerRef {
      pack: "cats".to_string(),
      file_id: "abc".to_string(),
    });
    assert_eq!(sticker.describe(), "<sticker abc from cats>");
    assert_eq!(Outgoing::text("/cancel").describe(), "/cancel");
  }
}
