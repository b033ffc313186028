//! Classification of `@Stickers` replies against the step being awaited.
//!
//! Rules follow the bot's English wording. Each awaited step has its own
//! pattern; only when that pattern fails are the refusal patterns tried.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::bot::state::Expect;
use crate::client::IncomingMessage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotRejection {
  #[error("invalid set selected")]
  InvalidSet,
  #[error("you have no sticker sets")]
  NoSets,
  #[error("short name is already taken")]
  ShortNameTaken,
  #[error("short name is not acceptable")]
  InvalidShortName,
  #[error("file was not accepted")]
  InvalidFile,
  #[error("emoji was not accepted")]
  InvalidEmoji,
  #[error("sticker does not belong to one of your sets")]
  NotYourSticker,
  #[error("sticker set is full")]
  SetFull,
  #[error("{0}")]
  Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
  Nothing,
  /// Short names offered on the reply keyboard.
  Sets(Vec<String>),
  /// The bot has no sets to offer and is not inside a command.
  NoSets,
  /// Short name taken from the published set link.
  ShortName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  Matched(Capture),
  Rejected(BotRejection),
  Unexpected,
}

static STEP_RULES: Lazy<Vec<(Expect, Regex)>> = Lazy::new(|| {
  [
    (Expect::ChooseSet, r"choose (a|the) sticker (set|pack)"),
    (Expect::PackTitle, r"(choose|send me) a (name|title) for your (set|pack)"),
    (Expect::StickerFile, r"now send me the (\w+ )?sticker"),
    (Expect::Emoji, r"send me (an|one or (several|more)|the new) emoji"),
    (Expect::ReadyToPublish, r"/publish"),
    (Expect::IconOrSkip, r"/skip"),
    (Expect::ShortName, r"short name for your (set|pack)"),
    (Expect::Published, r"published your sticker (set|pack)|addstickers/"),
    (Expect::StickerAdded, r"added your sticker"),
    (Expect::Done, r"well done|all done"),
    (Expect::PickSticker, r"send me (a|the) sticker"),
    (Expect::PickTarget, r"whose place|new position|place it"),
    (Expect::StickerEdited, r"(updated|edited|changed) (the |your |that )?(sticker|emoji)"),
    (Expect::Reordered, r"moved|reordered|changed the (sticker )?order"),
    (Expect::IconFile, r"send me .*(icon|thumbnail)"),
    (
      Expect::IconUpdated,
      r"(updated|changed|set) (the |your )?(sticker )?(set |pack )?(icon|thumbnail)",
    ),
    (Expect::StickerDeleted, r"(deleted|removed) (that|the|your) sticker"),
    (Expect::Cancelled, r"cancell?ed|nothing to cancel|no active command"),
  ]
  .into_iter()
  .map(|(expect, pattern)| (expect, case_insensitive(pattern)))
  .collect()
});

static REJECTION_RULES: Lazy<Vec<(BotRejection, Regex)>> = Lazy::new(|| {
  [
    (BotRejection::InvalidSet, r"invalid (sticker )?(set|pack)"),
    (BotRejection::ShortNameTaken, r"already taken|is occupied|already exists"),
    (
      BotRejection::InvalidShortName,
      r"(short )?name (is )?(invalid|unacceptable|not acceptable)|must (begin|start) with a letter",
    ),
    (
      BotRejection::InvalidFile,
      r"(file|image|document|dimensions).*(must|should|too (big|large)|invalid|wrong|not supported)",
    ),
    (BotRejection::SetFull, r"too many stickers|(set|pack) is full|maximum number"),
    (
      BotRejection::NotYourSticker,
      r"(not|isn't) (one of )?your (sticker )?(sets?|packs?|stickers?)|sticker from (one of )?your",
    ),
    (BotRejection::InvalidEmoji, r"(sorry|invalid|please).*emoji"),
  ]
  .into_iter()
  .map(|(rejection, pattern)| (rejection, case_insensitive(pattern)))
  .collect()
});

static NO_SETS: Lazy<Regex> = Lazy::new(|| case_insensitive(r"(don[’']?t|do not) have any (sticker )?(sets|packs)"));
static GENERIC_REFUSAL: Lazy<Regex> = Lazy::new(|| case_insensitive(r"^\W*(sorry|oops|error)\b"));
static SET_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"addstickers/([A-Za-z0-9_]+)").expect("valid regex"));

fn case_insensitive(pattern: &str) -> Regex {
  Regex::new(&format!("(?i){pattern}")).expect("valid regex")
}

fn step_rule(expect: Expect) -> &'static Regex {
  STEP_RULES
    .iter()
    .find(|(step, _)| *step == expect)
    .map(|(_, regex)| regex)
    .expect("every step has a rule")
}

/// Classifies a bot message received while waiting for `expect`.
pub fn classify(expect: Expect, msg: &IncomingMessage) -> Reply {
  let text = msg.text.trim();

  if expect == Expect::ChooseSet && NO_SETS.is_match(text) {
    return Reply::Matched(Capture::NoSets);
  }

  if step_rule(expect).is_match(text) {
    let capture = match expect {
      Expect::ChooseSet => Capture::Sets(
        msg
          .buttons()
          .map(str::trim)
          .filter(|button| !button.is_empty() && !button.starts_with('/'))
          .map(str::to_string)
          .collect(),
      ),
      Expect::Published => SET_LINK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(Capture::Nothing, |name| Capture::ShortName(name.as_str().to_string())),
      _ => Capture::Nothing,
    };
    return Reply::Matched(capture);
  }

  if let Some((rejection, _)) = REJECTION_RULES.iter().find(|(_, regex)| regex.is_match(text)) {
    return Reply::Rejected(rejection.clone());
  }

  if GENERIC_REFUSAL.is_match(text) {
    return Reply::Rejected(BotRejection::Other(text.to_string()));
  }

  Reply::Unexpected
}
