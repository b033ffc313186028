//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::BoxStream;

use crate::client::IncomingMessage;
use crate::client::LoginToken;
use crate::client::MessagingClient;
use crate::client::Outgoing;
use crate::client::Peer;
use crate::client::SignInOutcome;
use crate::models::PackMetadata;
use crate::models::Sticker;
use crate::models::StickerFormat;
use crate::source::RemoteFile;
use crate::source::StickerSetSource;

/// Canned `@Stickers` replies.
pub mod bot {
  use crate::client::IncomingMessage;

  pub fn text(text: &str) -> Vec<IncomingMessage> {
    vec![IncomingMessage::new(0, text)]
  }

  pub fn choose_set(sets: &[&str]) -> Vec<IncomingMessage> {
    let rows = sets.iter().map(|set| vec![set.to_string()]).collect();
    vec![IncomingMessage::new(0, "Choose a sticker set.").with_keyboard(rows)]
  }

  pub fn no_sets() -> Vec<IncomingMessage> {
    text("You don't have any sticker sets yet. Use /newpack to create one.")
  }

  pub fn new_pack_flow(short_name: &str) -> Vec<Vec<IncomingMessage>> {
    vec![
      text("Yay! A new set of stickers. How are we going to call it? Please choose a name for your set."),
      text("Alright! Now send me the sticker. The image file should be in PNG or WEBP format."),
      text("Thanks! Now send me an emoji that corresponds to your first sticker."),
      text("Congratulations. Stickers in the set: 1. When you're done, simply send the /publish command."),
      text("You can set an icon for your sticker set. To skip this step, send /skip."),
      text("Please provide a short name for your set. I'll use it to create a link."),
      text(&format!(
        "Kaboom! I've just published your sticker set. Here's your link: https://t.me/addstickers/{short_name}"
      )),
    ]
  }

  pub fn add_sticker_flow(pack: &str) -> Vec<Vec<IncomingMessage>> {
    vec![
      choose_set(&[pack]),
      text("Alright! Now send me the sticker."),
      text("Thanks! Now send me an emoji that corresponds to your sticker."),
      text("There we go. I've added your sticker to the set. When you're done, simply send the /done command."),
      text("OK, well done!"),
    ]
  }

  pub fn edit_sticker_flow(pack: &str) -> Vec<Vec<IncomingMessage>> {
    vec![
      choose_set(&[pack]),
      text("Please send me the sticker you want to edit."),
      text("Current emoji: 😺. Please send me the new emoji for this sticker."),
      text("I have updated your sticker."),
    ]
  }

  pub fn order_sticker_flow(pack: &str) -> Vec<Vec<IncomingMessage>> {
    vec![
      choose_set(&[pack]),
      text("Please send me the sticker you want to move."),
      text("Now send me the sticker whose place the first sticker should take."),
      text("I have moved the sticker to its new position."),
    ]
  }

  pub fn set_pack_icon_flow(pack: &str) -> Vec<Vec<IncomingMessage>> {
    vec![
      choose_set(&[pack]),
      text("OK, now send me the sticker set icon as a 100x100 WEBP image."),
      text("I have updated the icon for your sticker set."),
    ]
  }

  pub fn cancelled() -> IncomingMessage {
    IncomingMessage::new(0, "The command has been cancelled. Anything else I can do for you?")
  }
}

#[derive(Default)]
struct ClientState {
  authorized: bool,
  password: Option<String>,
  login_phone: Option<String>,
  script: VecDeque<Vec<IncomingMessage>>,
  sent: Vec<Outgoing>,
  next_id: i32,
  disconnected: bool,
  late: Vec<IncomingMessage>,
  cancel_ack_delay: Option<Duration>,
  reply_delay: Option<Duration>,
}

/// A user client whose only contact is a scripted `@Stickers` bot.
///
/// Every message except `/cancel` consumes the next scripted reply batch;
/// an empty batch (or an exhausted script) means the bot stays silent.
/// `/cancel` is always acknowledged, after any queued late replies.
/// Sending fails once the client is disconnected.
pub struct FakeClient {
  state: Mutex<ClientState>,
  tx: mpsc::UnboundedSender<IncomingMessage>,
  rx: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
}

impl FakeClient {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded();
    Self {
      state: Mutex::new(ClientState::default()),
      tx,
      rx: Mutex::new(Some(rx)),
    }
  }

  pub fn authorized(self) -> Self {
    self.state.lock().unwrap().authorized = true;
    self
  }

  pub fn with_password(self, password: &str) -> Self {
    self.state.lock().unwrap().password = Some(password.to_string());
    self
  }

  pub fn replying(self, script: Vec<Vec<IncomingMessage>>) -> Self {
    self.replies(script);
    self
  }

  /// Replies to an abandoned step that only show up once `/cancel` is sent.
  pub fn late_replies(&self, replies: Vec<IncomingMessage>) {
    self.state.lock().unwrap().late.extend(replies);
  }

  pub fn delay_cancel_ack(&self, delay: Duration) {
    self.state.lock().unwrap().cancel_ack_delay = Some(delay);
  }

  /// Delivers scripted replies `delay` after the message that triggers them.
  pub fn delay_replies(&self, delay: Duration) {
    self.state.lock().unwrap().reply_delay = Some(delay);
  }

  pub fn replies(&self, script: Vec<Vec<IncomingMessage>>) {
    self.state.lock().unwrap().script.extend(script);
  }

  pub fn push_incoming(&self, msg: IncomingMessage) {
    self.tx.unbounded_send(msg).unwrap();
  }

  pub fn sent(&self) -> Vec<Outgoing> {
    self.state.lock().unwrap().sent.clone()
  }

  pub fn sent_texts(&self) -> Vec<String> {
    self.sent().iter().map(Outgoing::describe).collect()
  }

  pub fn login_phone(&self) -> Option<String> {
    self.state.lock().unwrap().login_phone.clone()
  }

  pub fn is_signed_in(&self) -> bool {
    self.state.lock().unwrap().authorized
  }

  pub fn is_disconnected(&self) -> bool {
    self.state.lock().unwrap().disconnected
  }

  pub async fn wait_for_sent(&self, count: usize) {
    while self.sent().len() < count {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  }
}

#[async_trait]
impl MessagingClient for FakeClient {
  async fn is_authorized(&self) -> anyhow::Result<bool> {
    Ok(self.state.lock().unwrap().authorized)
  }

  async fn request_login_code(&self, phone: &str) -> anyhow::Result<LoginToken> {
    self.state.lock().unwrap().login_phone = Some(phone.to_string());
    Ok(LoginToken(format!("token-{phone}")))
  }

  async fn sign_in(&self, _token: &LoginToken, code: &str) -> anyhow::Result<SignInOutcome> {
    if code.is_empty() {
      bail!("empty login code");
    }
    let mut state = self.state.lock().unwrap();
    if state.password.is_some() {
      return Ok(SignInOutcome::PasswordRequired {
        hint: Some("usual".to_string()),
      });
    }
    state.authorized = true;
    Ok(SignInOutcome::SignedIn)
  }

  async fn check_password(&self, password: &str) -> anyhow::Result<()> {
    let mut state = self.state.lock().unwrap();
    if state.password.as_deref() != Some(password) {
      bail!("wrong password");
    }
    state.authorized = true;
    Ok(())
  }

  async fn sign_out(&self) -> anyhow::Result<()> {
    self.state.lock().unwrap().authorized = false;
    Ok(())
  }

  async fn resolve_username(&self, username: &str) -> anyhow::Result<Peer> {
    Ok(Peer {
      id: 429_000,
      username: username.to_string(),
    })
  }

  async fn send_message(&self, _peer: &Peer, message: &Outgoing) -> anyhow::Result<i32> {
    let (id, now, later) = {
      let mut state = self.state.lock().unwrap();
      if state.disconnected {
        bail!("client is disconnected");
      }
      state.sent.push(message.clone());
      state.next_id += 1;
      let (now, later) = if *message == Outgoing::text("/cancel") {
        let mut now = std::mem::take(&mut state.late);
        match state.cancel_ack_delay {
          Some(delay) => (now, Some((delay, vec![bot::cancelled()]))),
          None => {
            now.push(bot::cancelled());
            (now, None)
          },
        }
      } else {
        let batch = state.script.pop_front().unwrap_or_default();
        match state.reply_delay {
          Some(delay) => (Vec::new(), Some((delay, batch))),
          None => (batch, None),
        }
      };
      (state.next_id, now, later)
    };
    for reply in now {
      self.tx.unbounded_send(reply).map_err(|err| anyhow!(err.to_string()))?;
    }
    if let Some((delay, replies)) = later {
      let tx = self.tx.clone();
      tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for reply in replies {
          let _ = tx.unbounded_send(reply);
        }
      });
    }
    Ok(id)
  }

  async fn incoming(&self, _peer: &Peer) -> anyhow::Result<BoxStream<'static, IncomingMessage>> {
    let rx = self
      .rx
      .lock()
      .unwrap()
      .take()
      .ok_or_else(|| anyhow!("incoming stream already taken"))?;
    Ok(rx.boxed())
  }

  async fn disconnect(&self) -> anyhow::Result<()> {
    self.state.lock().unwrap().disconnected = true;
    Ok(())
  }
}

#[derive(Default)]
struct SourceState {
  sets: HashMap<String, PackMetadata>,
  failing: HashSet<String>,
  fetches: Vec<String>,
  downloads: usize,
}

/// A sticker set source backed by a map.
#[derive(Default)]
pub struct FakeSource {
  state: Mutex<SourceState>,
}

impl FakeSource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_set(self, meta: PackMetadata) -> Self {
    self.put(meta);
    self
  }

  pub fn put(&self, meta: PackMetadata) {
    self.state.lock().unwrap().sets.insert(meta.short_name.clone(), meta);
  }

  pub fn fail(&self, short_name: &str) {
    self.state.lock().unwrap().failing.insert(short_name.to_string());
  }

  pub fn fetches(&self) -> Vec<String> {
    self.state.lock().unwrap().fetches.clone()
  }

  pub fn downloads(&self) -> usize {
    self.state.lock().unwrap().downloads
  }
}

pub fn meta(short_name: &str, title: &str, stickers: usize) -> PackMetadata {
  PackMetadata {
    short_name: short_name.to_string(),
    title: title.to_string(),
    format: StickerFormat::Static,
    stickers: (0 .. stickers)
      .map(|i| Sticker {
        file_id: format!("{short_name}-{i}"),
        file_unique_id: format!("u-{short_name}-{i}"),
        emoji: Some("😺".to_string()),
      })
      .collect(),
    thumbnail_file_id: Some(format!("{short_name}-thumb")),
    thumbnail_unique_id: Some(format!("u-{short_name}-thumb")),
  }
}

#[async_trait]
impl StickerSetSource for FakeSource {
  async fn sticker_set(&self, short_name: &str) -> anyhow::Result<Option<PackMetadata>> {
    let mut state = self.state.lock().unwrap();
    state.fetches.push(short_name.to_string());
    if state.failing.contains(short_name) {
      bail!("network unreachable");
    }
    Ok(state.sets.get(short_name).cloned())
  }

  async fn download(&self, file_id: &str) -> anyhow::Result<RemoteFile> {
    self.state.lock().unwrap().downloads += 1;
    Ok(RemoteFile {
      path: format!("thumbnails/{file_id}.webp"),
      bytes: file_id.as_bytes().to_vec(),
    })
  }
}
