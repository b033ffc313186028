use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use teloxide::types::StickerSet;
use tracing::debug;
use tracing::instrument;

use crate::models::PackMetadata;
use crate::models::Sticker;
use crate::models::StickerFormat;

/// A downloaded remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
  /// Server-side path; its extension names the file type.
  pub path: String,
  pub bytes: Vec<u8>,
}

/// Where pack metadata and thumbnails come from.
#[async_trait]
pub trait StickerSetSource: Send + Sync + 'static {
  /// `None` when no set with this short name exists.
  async fn sticker_set(&self, short_name: &str) -> anyhow::Result<Option<PackMetadata>>;

  async fn download(&self, file_id: &str) -> anyhow::Result<RemoteFile>;
}

#[async_trait]
impl<T: StickerSetSource + ?Sized> StickerSetSource for Arc<T> {
  async fn sticker_set(&self, short_name: &str) -> anyhow::Result<Option<PackMetadata>> {
    (**self).sticker_set(short_name).await
  }

  async fn download(&self, file_id: &str) -> anyhow::Result<RemoteFile> {
    (**self).download(file_id).await
  }
}

/// Reads sticker sets through the Bot API.
#[derive(Clone)]
pub struct BotApiSource {
  bot: Bot,
}

impl BotApiSource {
  pub fn new(bot: Bot) -> Self {
    Self { bot }
  }
}

#[async_trait]
impl StickerSetSource for BotApiSource {
  #[instrument(skip(self))]
  async fn sticker_set(&self, short_name: &str) -> anyhow::Result<Option<PackMetadata>> {
    match self.bot.get_sticker_set(short_name).await {
      Ok(set) => Ok(Some(pack_metadata(&set))),
      Err(RequestError::Api(ApiError::InvalidStickersSet)) => {
        debug!(short_name, "sticker set does not exist");
        Ok(None)
      },
      Err(err) => Err(err).with_context(|| format!("fetching sticker set {short_name}")),
    }
  }

  #[instrument(skip(self))]
  async fn download(&self, file_id: &str) -> anyhow::Result<RemoteFile> {
    let file = self
      .bot
      .get_file(FileId(file_id.to_string()))
      .await
      .with_context(|| format!("resolving file {file_id}"))?;
    let mut bytes = Vec::new();
    self
      .bot
      .download_file(&file.path, &mut bytes)
      .await
      .with_context(|| format!("downloading {}", file.path))?;
    debug!(path = %file.path, size = bytes.len(), "downloaded file");
    Ok(RemoteFile { path: file.path, bytes })
  }
}

pub(crate) fn pack_metadata(set: &StickerSet) -> PackMetadata {
  let format = match set.stickers.first() {
    Some(sticker) if sticker.is_animated() => StickerFormat::Animated,
    Some(sticker) if sticker.is_video() => StickerFormat::Video,
    _ => StickerFormat::Static,
  };
  let thumbnail = set
    .thumbnail
    .as_ref()
    .map(|thumb| &thumb.file)
    .or_else(|| set.stickers.first().map(|sticker| &sticker.file));

  PackMetadata {
    short_name: set.name.clone(),
    title: set.title.clone(),
    format,
    stickers: set
      .stickers
      .iter()
      .map(|sticker| Sticker {
        file_id: sticker.file.id.0.clone(),
        file_unique_id: sticker.file.unique_id.0.clone(),
        emoji: sticker.emoji.clone(),
      })
      .collect(),
    thumbnail_file_id: thumbnail.map(|file| file.id.0.clone()),
    thumbnail_unique_id: thumbnail.map(|file| file.unique_id.0.clone()),
  }
}
