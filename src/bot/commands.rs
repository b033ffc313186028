use std::fmt;

use crate::models::StickerFormat;

/// Commands understood by the `@Stickers` bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
  /// Create a new static sticker set
  NewPack,
  /// Create a new animated sticker set
  NewAnimated,
  /// Create a new video sticker set
  NewVideo,
  /// Add a sticker to an existing set
  AddSticker,
  /// Change the emoji of a sticker
  EditSticker,
  /// Move a sticker within its set
  OrderSticker,
  /// Change the icon of a set
  SetPackIcon,
  /// Remove a sticker from its set
  DelSticker,
  /// Abort the current command
  Cancel,
  Publish,
  Skip,
  Done,
}

impl Command {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NewPack => "/newpack",
      Self::NewAnimated => "/newanimated",
      Self::NewVideo => "/newvideo",
      Self::AddSticker => "/addsticker",
      Self::EditSticker => "/editsticker",
      Self::OrderSticker => "/ordersticker",
      Self::SetPackIcon => "/setpackicon",
      Self::DelSticker => "/delsticker",
      Self::Cancel => "/cancel",
      Self::Publish => "/publish",
      Self::Skip => "/skip",
      Self::Done => "/done",
    }
  }

  pub fn new_pack(format: StickerFormat) -> Self {
    match format {
      StickerFormat::Static => Self::NewPack,
      StickerFormat::Animated => Self::NewAnimated,
      StickerFormat::Video => Self::NewVideo,
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::Command;
  use crate::models::StickerFormat;

  #[test]
  fn picks_creation_command_by_format() {
    assert_eq!(Command::new_pack(StickerFormat::Static).as_str(), "/newpack");
    assert_eq!(Command::new_pack(StickerFormat::Animated).to_string(), "/newanimated");
    assert_eq!(Command::new_pack(StickerFormat::Video).to_string(), "/newvideo");
  }
}
