use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::bot::Command;
use crate::client::Outgoing;
use crate::models::StickerFormat;
use crate::models::StickerInput;
use crate::models::StickerRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
  ListPacks,
  NewPack,
  AddSticker,
  EditSticker,
  OrderSticker,
  SetPackIcon,
  DelSticker,
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::ListPacks => "list packs",
      Self::NewPack => "new pack",
      Self::AddSticker => "add sticker",
      Self::EditSticker => "edit sticker",
      Self::OrderSticker => "order sticker",
      Self::SetPackIcon => "set pack icon",
      Self::DelSticker => "delete sticker",
    };
    f.write_str(name)
  }
}

/// The bot reply awaited after an outgoing message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
  ChooseSet,
  PackTitle,
  StickerFile,
  Emoji,
  ReadyToPublish,
  IconOrSkip,
  ShortName,
  Published,
  StickerAdded,
  Done,
  PickSticker,
  PickTarget,
  StickerEdited,
  Reordered,
  IconFile,
  IconUpdated,
  StickerDeleted,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPack {
  pub title: String,
  pub short_name: String,
  pub format: StickerFormat,
  pub first: StickerInput,
}

/// One bot conversation, from its command to its final confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  ListPacks,
  NewPack(NewPack),
  AddSticker { pack: String, sticker: StickerInput },
  EditSticker { sticker: StickerRef, emojis: String },
  OrderSticker { sticker: StickerRef, target: StickerRef },
  SetPackIcon { pack: String, icon: PathBuf },
  DelSticker { sticker: StickerRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
  pub send: Outgoing,
  pub expect: Expect,
}

impl Exchange {
  fn new(send: Outgoing, expect: Expect) -> Self {
    Self { send, expect }
  }

  fn command(command: Command, expect: Expect) -> Self {
    Self::new(Outgoing::text(command.as_str()), expect)
  }
}

impl Operation {
  pub fn kind(&self) -> OperationKind {
    match self {
      Self::ListPacks => OperationKind::ListPacks,
      Self::NewPack(_) => OperationKind::NewPack,
      Self::AddSticker { .. } => OperationKind::AddSticker,
      Self::EditSticker { .. } => OperationKind::EditSticker,
      Self::OrderSticker { .. } => OperationKind::OrderSticker,
      Self::SetPackIcon { .. } => OperationKind::SetPackIcon,
      Self::DelSticker { .. } => OperationKind::DelSticker,
    }
  }

  /// The pack this operation changes, if any.
  pub fn pack(&self) -> Option<&str> {
    match self {
      Self::ListPacks => None,
      Self::NewPack(new) => Some(new.short_name.as_str()),
      Self::AddSticker { pack, .. } | Self::SetPackIcon { pack, .. } => Some(pack.as_str()),
      Self::EditSticker { sticker, .. } | Self::OrderSticker { sticker, .. } | Self::DelSticker { sticker } => {
        Some(sticker.pack.as_str())
      },
    }
  }

  /// Local files this operation uploads.
  pub fn uploads(&self) -> Vec<&Path> {
    match self {
      Self::NewPack(new) => vec![new.first.file.as_path()],
      Self::AddSticker { sticker, .. } => vec![sticker.file.as_path()],
      Self::SetPackIcon { icon, .. } => vec![icon.as_path()],
      _ => Vec::new(),
    }
  }

  pub fn script(&self) -> Vec<Exchange> {
    match self {
      Self::ListPacks => vec![
        Exchange::command(Command::AddSticker, Expect::ChooseSet),
        Exchange::command(Command::Cancel, Expect::Cancelled),
      ],
      Self::NewPack(new) => vec![
        Exchange::command(Command::new_pack(new.format), Expect::PackTitle),
        Exchange::new(Outgoing::text(&new.title), Expect::StickerFile),
        Exchange::new(Outgoing::File(new.first.file.clone()), Expect::Emoji),
        Exchange::new(Outgoing::text(&new.first.emojis), Expect::ReadyToPublish),
        Exchange::command(Command::Publish, Expect::IconOrSkip),
        Exchange::command(Command::Skip, Expect::ShortName),
        Exchange::new(Outgoing::text(&new.short_name), Expect::Published),
      ],
      Self::AddSticker { pack, sticker } => vec![
        Exchange::command(Command::AddSticker, Expect::ChooseSet),
        Exchange::new(Outgoing::text(pack), Expect::StickerFile),
        Exchange::new(Outgoing::File(sticker.file.clone()), Expect::Emoji),
        Exchange::new(Outgoing::text(&sticker.emojis), Expect::StickerAdded),
        Exchange::command(Command::Done, Expect::Done),
      ],
      Self::EditSticker { sticker, emojis } => vec![
        Exchange::command(Command::EditSticker, Expect::ChooseSet),
        Exchange::new(Outgoing::text(&sticker.pack), Expect::PickSticker),
        Exchange::new(Outgoing::Sticker(sticker.clone()), Expect::Emoji),
        Exchange::new(Outgoing::text(emojis), Expect::StickerEdited),
      ],
      Self::OrderSticker { sticker, target } => vec![
        Exchange::command(Command::OrderSticker, Expect::ChooseSet),
        Exchange::new(Outgoing::text(&sticker.pack), Expect::PickSticker),
        Exchange::new(Outgoing::Sticker(sticker.clone()), Expect::PickTarget),
        Exchange::new(Outgoing::Sticker(target.clone()), Expect::Reordered),
      ],
      Self::SetPackIcon { pack, icon } => vec![
        Exchange::command(Command::SetPackIcon, Expect::ChooseSet),
        Exchange::new(Outgoing::text(pack), Expect::IconFile),
        Exchange::new(Outgoing::File(icon.clone()), Expect::IconUpdated),
      ],
      Self::DelSticker { sticker } => vec![
        Exchange::command(Command::DelSticker, Expect::PickSticker),
        Exchange::new(Outgoing::Sticker(sticker.clone()), Expect::StickerDeleted),
      ],
    }
  }
}

/// The in-flight bot conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingOperation {
  pub kind: OperationKind,
  pub pack: Option<String>,
  pub step: Expect,
  pub step_index: usize,
  pub steps: usize,
  pub started_at: DateTime<Utc>,
}

impl PendingOperation {
  pub fn new(operation: &Operation, script: &[Exchange]) -> Self {
    Self {
      kind: operation.kind(),
      pack: operation.pack().map(str::to_string),
      step: script.first().map_or(Expect::Cancelled, |exchange| exchange.expect),
      step_index: 0,
      steps: script.len(),
      started_at: Utc::now(),
    }
  }
}

/// Result of a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Packs(Vec<String>),
  Published { short_name: String },
  Done,
}
