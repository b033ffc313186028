use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StickerFormat {
  #[default]
  Static,
  Animated,
  Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sticker {
  pub file_id: String,
  pub file_unique_id: String,
  pub emoji: Option<String>,
}

/// A sticker pack as cached in `packs.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StickerPack {
  pub short_name: String,
  pub title: String,
  #[serde(default)]
  pub format: StickerFormat,
  /// File name of the thumbnail inside the cache directory.
  pub thumbnail: Option<String>,
  /// Telegram's unique id of the file the thumbnail was downloaded from.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail_id: Option<String>,
  pub stickers: Vec<Sticker>,
  /// Index of the pack in the sticker bot's own listing.
  pub position: usize,
  pub fetched_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub stale: bool,
}

impl StickerPack {
  /// Entry for a pack that exists on Telegram but whose metadata was never fetched.
  pub fn placeholder(short_name: &str, title: &str, format: StickerFormat, position: usize) -> Self {
    Self {
      short_name: short_name.to_string(),
      title: title.to_string(),
      format,
      thumbnail: None,
      thumbnail_id: None,
      stickers: Vec::new(),
      position,
      fetched_at: None,
      stale: true,
    }
  }

  pub fn same_content(&self, meta: &PackMetadata) -> bool {
    self.short_name == meta.short_name
      && self.title == meta.title
      && self.format == meta.format
      && self.stickers == meta.stickers
  }
}

/// Metadata of a sticker set as reported by a [`crate::source::StickerSetSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMetadata {
  pub short_name: String,
  pub title: String,
  pub format: StickerFormat,
  pub stickers: Vec<Sticker>,
  /// Remote file to use as the pack thumbnail.
  pub thumbnail_file_id: Option<String>,
  /// Stable across bots, unlike `thumbnail_file_id`.
  pub thumbnail_unique_id: Option<String>,
}

/// A sticker sent back to the bot to identify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StickerRef {
  pub pack: String,
  pub file_id: String,
}

impl StickerRef {
  pub fn new(pack: &str, sticker: &Sticker) -> Self {
    Self {
      pack: pack.to_string(),
      file_id: sticker.file_id.clone(),
    }
  }
}

/// A new sticker to upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StickerInput {
  pub file: PathBuf,
  pub emojis: String,
}

#[cfg(test)]
mod tests {
  use super::PackMetadata;
  use super::Sticker;
  use super::StickerFormat;
  use super::StickerPack;

  #[test]
  fn placeholder_is_stale_and_serializes_flag() {
    let pack = StickerPack::placeholder("cats", "Cats", StickerFormat::Static, 0);
    assert!(pack.stale);
    let json = serde_json::to_value(&pack).unwrap();
    assert_eq!(json["stale"], true);
    assert_eq!(json["format"], "static");
  }

  #[test]
  fn fresh_pack_omits_stale_flag() {
    let mut pack = StickerPack::placeholder("cats", "Cats", StickerFormat::Static, 0);
    pack.stale = false;
    let json = serde_json::to_value(&pack).unwrap();
    assert!(json.get("stale").is_none());
  }

  #[test]
  fn content_comparison_ignores_bookkeeping() {
    let sticker = Sticker {
      file_id: "f1".to_string(),
      file_unique_id: "u1".to_string(),
      emoji: Some("😺".to_string()),
    };
    let mut pack = StickerPack::placeholder("cats", "Cats", StickerFormat::Static, 3);
    pack.stickers.push(sticker.clone());
    let meta = PackMetadata {
      short_name: "cats".to_string(),
      title: "Cats".to_string(),
      format: StickerFormat::Static,
      stickers: vec![sticker],
      thumbnail_file_id: Some("thumb".to_string()),
      thumbnail_unique_id: Some("u-thumb".to_string()),
    };
    assert!(pack.same_content(&meta));

    let renamed = PackMetadata {
      title: "More cats".to_string(),
      ..meta
    };
    assert!(!pack.same_content(&renamed));
  }
}
