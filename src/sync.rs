use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Dispatcher;
use crate::bot::state::NewPack;
use crate::bot::state::Operation;
use crate::bot::state::Outcome;
use crate::cache::PackCache;
use crate::cache::PackIndex;
use crate::client::MessagingClient;
use crate::error::Result;
use crate::error::StickerError;
use crate::models::PackMetadata;
use crate::models::StickerInput;
use crate::models::StickerPack;
use crate::models::StickerRef;
use crate::source::StickerSetSource;

/// What a successful [`Stickers::update_owned_packs`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub added: Vec<String>,
  pub updated: Vec<String>,
  pub unchanged: Vec<String>,
  pub removed: Vec<String>,
}

/// A thumbnail downloaded but not yet written to the cache.
struct StagedThumb {
  file_name: String,
  bytes: Vec<u8>,
}

/// Owned sticker packs, cached on disk and kept in step with `@Stickers`.
pub struct Stickers<C, S> {
  dispatcher: Arc<Dispatcher<C>>,
  source: S,
  cache: PackCache,
  index: Mutex<Option<PackIndex>>,
}

impl<C: MessagingClient, S: StickerSetSource> Stickers<C, S> {
  pub fn new(dispatcher: Arc<Dispatcher<C>>, source: S, cache: PackCache) -> Self {
    Self {
      dispatcher,
      source,
      cache,
      index: Mutex::new(None),
    }
  }

  pub fn dispatcher(&self) -> &Arc<Dispatcher<C>> {
    &self.dispatcher
  }

  pub fn thumb_path(&self, pack: &StickerPack) -> Option<PathBuf> {
    pack.thumbnail.as_deref().map(|name| self.cache.thumb_path(name))
  }

  /// Short names of the owned packs, in the bot's order.
  #[instrument(skip(self))]
  pub async fn get_owned_packs(&self) -> Result<Vec<String>> {
    let synced = {
      let mut index = self.index.lock().await;
      self.load(&mut index).await?;
      index.is_some()
    };
    if !synced {
      info!("no pack cache on disk, syncing with the sticker bot");
      self.update_owned_packs().await?;
    }
    let index = self.index.lock().await;
    Ok(index.as_ref().map(owned_names).unwrap_or_default())
  }

  #[instrument(skip(self))]
  pub async fn get_pack(&self, short_name: &str) -> Result<StickerPack> {
    let mut index = self.index.lock().await;
    self.load(&mut index).await?;
    let cached = index.as_ref().and_then(|packs| packs.get(short_name)).cloned();
    if let Some(pack) = &cached {
      if !pack.stale {
        return Ok(pack.clone());
      }
    }

    let meta = self
      .source
      .sticker_set(short_name)
      .await?
      .ok_or_else(|| StickerError::PackNotFound(short_name.to_string()))?;

    let (Some(old), Some(packs)) = (cached, index.as_ref()) else {
      // Not one of ours: hand it out without caching.
      return Ok(fresh_pack(meta, 0, None));
    };

    let (pack, staged) = self.build(meta, old.position).await?;
    let mut next = packs.clone();
    next.insert(short_name.to_string(), pack.clone());
    self.commit(&mut index, next, staged.into_iter().collect()).await?;
    info!(short_name, stickers = pack.stickers.len(), "refreshed pack");
    Ok(pack)
  }

  /// Reconciles the cache with the packs `@Stickers` reports for this account.
  #[instrument(skip(self))]
  pub async fn update_owned_packs(&self) -> Result<SyncReport> {
    let owned = self.dispatcher.list_packs().await?;
    info!(count = owned.len(), "sticker bot listed owned packs");

    let mut index = self.index.lock().await;
    self.load(&mut index).await?;
    let previous = index.as_ref().cloned().unwrap_or_default();

    let mut next = PackIndex::new();
    let mut staged = Vec::new();
    let mut report = SyncReport::default();
    let mut failed = Vec::new();

    for (position, name) in owned.iter().enumerate() {
      let existing = previous.get(name);
      let meta = match self.source.sticker_set(name).await {
        Ok(Some(meta)) => meta,
        Ok(None) => {
          warn!(short_name = %name, "listed pack has no sticker set");
          failed.push((name.clone(), "sticker set not found".to_string()));
          keep_previous(&mut next, existing, position);
          continue;
        },
        Err(err) => {
          warn!(short_name = %name, error = %err, "failed to fetch pack");
          failed.push((name.clone(), err.to_string()));
          keep_previous(&mut next, existing, position);
          continue;
        },
      };

      if let Some(old) = existing {
        if self.reusable(old, &meta).await {
          let mut pack = old.clone();
          pack.position = position;
          next.insert(name.clone(), pack);
          report.unchanged.push(name.clone());
          continue;
        }
      }

      match self.build(meta, position).await {
        Ok((pack, thumb)) => {
          staged.extend(thumb);
          next.insert(name.clone(), pack);
          if existing.is_some() {
            report.updated.push(name.clone());
          } else {
            report.added.push(name.clone());
          }
        },
        Err(err) => {
          warn!(short_name = %name, error = %err, "failed to download thumbnail");
          failed.push((name.clone(), err.to_string()));
          keep_previous(&mut next, existing, position);
        },
      }
    }

    report.removed = previous.keys().filter(|name| !next.contains_key(*name)).cloned().collect();
    report.removed.retain(|name| !owned.contains(name));

    self.commit(&mut index, next, staged).await?;
    info!(
      added = report.added.len(),
      updated = report.updated.len(),
      unchanged = report.unchanged.len(),
      removed = report.removed.len(),
      failed = failed.len(),
      "pack sync finished"
    );

    if failed.is_empty() {
      Ok(report)
    } else {
      Err(StickerError::PartialSync { failed })
    }
  }

  /// Creates a pack and records it as owned; returns its short name.
  pub async fn create_pack(&self, new: NewPack) -> Result<String> {
    let title = new.title.clone();
    let format = new.format;
    let short_name = match self.dispatcher.run(Operation::NewPack(new)).await? {
      Outcome::Published { short_name } => short_name,
      other => return Err(anyhow!("pack creation finished with {other:?}").into()),
    };
    self
      .update_cached(|packs| {
        let position = packs.values().map(|pack| pack.position + 1).max().unwrap_or(0);
        packs.insert(
          short_name.clone(),
          StickerPack::placeholder(&short_name, &title, format, position),
        );
      })
      .await?;
    Ok(short_name)
  }

  pub async fn add_sticker(&self, pack: &str, sticker: StickerInput) -> Result<()> {
    self
      .run_edit(Operation::AddSticker {
        pack: pack.to_string(),
        sticker,
      })
      .await
  }

  pub async fn edit_sticker(&self, sticker: StickerRef, emojis: &str) -> Result<()> {
    self
      .run_edit(Operation::EditSticker {
        sticker,
        emojis: emojis.to_string(),
      })
      .await
  }

  /// Moves `sticker` to the position currently held by `target`.
  pub async fn order_sticker(&self, sticker: StickerRef, target: StickerRef) -> Result<()> {
    self.run_edit(Operation::OrderSticker { sticker, target }).await
  }

  pub async fn set_pack_icon(&self, pack: &str, icon: PathBuf) -> Result<()> {
    self
      .run_edit(Operation::SetPackIcon {
        pack: pack.to_string(),
        icon,
      })
      .await
  }

  pub async fn delete_sticker(&self, sticker: StickerRef) -> Result<()> {
    self.run_edit(Operation::DelSticker { sticker }).await
  }

  pub fn cancel(&self) -> bool {
    self.dispatcher.cancel()
  }

  async fn run_edit(&self, operation: Operation) -> Result<()> {
    let pack = operation.pack().map(str::to_string);
    self.dispatcher.run(operation).await?;
    if let Some(pack) = pack {
      self
        .update_cached(|packs| {
          if let Some(cached) = packs.get_mut(&pack) {
            cached.stale = true;
          }
        })
        .await?;
    }
    Ok(())
  }

  /// Applies `change` to the cache; skipped while no cache exists, as the first sync will see it.
  async fn update_cached(&self, change: impl FnOnce(&mut PackIndex)) -> Result<()> {
    let mut index = self.index.lock().await;
    self.load(&mut index).await?;
    let Some(packs) = index.as_ref() else {
      return Ok(());
    };
    let mut next = packs.clone();
    change(&mut next);
    self.commit(&mut index, next, Vec::new()).await
  }

  async fn load(&self, index: &mut MutexGuard<'_, Option<PackIndex>>) -> Result<()> {
    if index.is_none() {
      **index = self.cache.load().await?;
    }
    Ok(())
  }

  async fn reusable(&self, old: &StickerPack, meta: &PackMetadata) -> bool {
    if old.stale || !old.same_content(meta) || old.thumbnail_id != meta.thumbnail_unique_id {
      return false;
    }
    match &old.thumbnail {
      Some(name) => self.cache.has_thumb(name).await,
      None => meta.thumbnail_file_id.is_none(),
    }
  }

  async fn build(&self, meta: PackMetadata, position: usize) -> Result<(StickerPack, Option<StagedThumb>)> {
    let staged = match &meta.thumbnail_file_id {
      Some(file_id) => {
        let file = self.source.download(file_id).await?;
        Some(StagedThumb {
          file_name: PackCache::thumb_name(&meta.short_name, &file.path),
          bytes: file.bytes,
        })
      },
      None => None,
    };
    let thumbnail = staged.as_ref().map(|thumb| thumb.file_name.clone());
    Ok((fresh_pack(meta, position, thumbnail), staged))
  }

  /// Stages thumbnails, writes the index, then swaps the thumbnails in and drops
  /// the ones nothing references. Nothing visible changes if the index write fails.
  async fn commit(
    &self,
    index: &mut MutexGuard<'_, Option<PackIndex>>,
    next: PackIndex,
    staged: Vec<StagedThumb>,
  ) -> Result<()> {
    let mut written = Vec::with_capacity(staged.len());
    for thumb in &staged {
      if let Err(err) = self.cache.stage_thumb(&thumb.file_name, &thumb.bytes).await {
        written.push(thumb.file_name.as_str());
        self.discard(&written).await;
        return Err(err);
      }
      written.push(thumb.file_name.as_str());
    }
    if let Err(err) = self.cache.store(&next).await {
      self.discard(&written).await;
      return Err(err);
    }
    for name in &written {
      self.cache.promote_thumb(name).await?;
    }

    let referenced: BTreeSet<&str> = next.values().filter_map(|pack| pack.thumbnail.as_deref()).collect();
    let orphaned: Vec<String> = index
      .iter()
      .flat_map(|packs| packs.values())
      .filter_map(|pack| pack.thumbnail.clone())
      .filter(|name| !referenced.contains(name.as_str()))
      .collect();
    for name in orphaned {
      self.cache.remove_thumb(&name).await;
    }

    **index = Some(next);
    Ok(())
  }

  async fn discard(&self, staged: &[&str]) {
    for name in staged {
      self.cache.discard_staged(name).await;
    }
  }
}

fn fresh_pack(meta: PackMetadata, position: usize, thumbnail: Option<String>) -> StickerPack {
  StickerPack {
    short_name: meta.short_name,
    title: meta.title,
    format: meta.format,
    thumbnail_id: thumbnail.as_ref().and(meta.thumbnail_unique_id),
    thumbnail,
    stickers: meta.stickers,
    position,
    fetched_at: Some(Utc::now()),
    stale: false,
  }
}

fn keep_previous(next: &mut PackIndex, existing: Option<&StickerPack>, position: usize) {
  if let Some(old) = existing {
    let mut pack = old.clone();
    pack.position = position;
    next.insert(pack.short_name.clone(), pack);
  }
}

fn owned_names(index: &PackIndex) -> Vec<String> {
  let mut packs: Vec<&StickerPack> = index.values().collect();
  packs.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.short_name.cmp(&b.short_name)));
  packs.into_iter().map(|pack| pack.short_name.clone()).collect()
}
