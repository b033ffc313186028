use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tokio::fs;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::error::Result;
use crate::models::StickerPack;
use crate::util::path_ext;

pub const PACKS_FILE: &str = "packs.json";
const DEFAULT_THUMB_EXT: &str = "webp";

pub type PackIndex = BTreeMap<String, StickerPack>;

/// `packs.json` and the thumbnail files next to it.
#[derive(Debug, Clone)]
pub struct PackCache {
  dir: PathBuf,
}

impl PackCache {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn index_path(&self) -> PathBuf {
    self.dir.join(PACKS_FILE)
  }

  pub fn thumb_path(&self, file_name: &str) -> PathBuf {
    self.dir.join(file_name)
  }

  /// File name for a pack thumbnail downloaded from `remote_path`.
  pub fn thumb_name(short_name: &str, remote_path: &str) -> String {
    format!("{short_name}.{}", path_ext(remote_path, DEFAULT_THUMB_EXT))
  }

  /// `None` when the cache has never been written.
  #[instrument(skip(self), fields(dir = %self.dir.display()))]
  pub async fn load(&self) -> Result<Option<PackIndex>> {
    let raw = match fs::read_to_string(self.index_path()).await {
      Ok(raw) => raw,
      Err(err) if err.kind() == ErrorKind::NotFound => {
        debug!("no pack cache yet");
        return Ok(None);
      },
      Err(err) => return Err(err.into()),
    };
    let index: PackIndex = serde_json::from_str(&raw)?;
    info!(packs = index.len(), "loaded pack cache");
    Ok(Some(index))
  }

  /// Replaces `packs.json` atomically.
  #[instrument(skip(self, index), fields(packs = index.len()))]
  pub async fn store(&self, index: &PackIndex) -> Result<()> {
    fs::create_dir_all(&self.dir).await?;
    let mut json = serde_json::to_string_pretty(index)?;
    json.push('\n');
    write_atomic(&self.index_path(), json.as_bytes()).await?;
    debug!("stored pack cache");
    Ok(())
  }

  /// Writes a thumbnail next to its final name; [`Self::promote_thumb`] makes it visible.
  pub async fn stage_thumb(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(&self.dir).await?;
    fs::write(self.staged_path(file_name), bytes).await?;
    Ok(())
  }

  pub async fn promote_thumb(&self, file_name: &str) -> Result<()> {
    fs::rename(self.staged_path(file_name), self.thumb_path(file_name)).await?;
    Ok(())
  }

  pub async fn discard_staged(&self, file_name: &str) {
    match fs::remove_file(self.staged_path(file_name)).await {
      Ok(()) => debug!(file_name, "discarded staged thumbnail"),
      Err(err) if err.kind() == ErrorKind::NotFound => {},
      Err(err) => warn!(file_name, error = %err, "failed to discard staged thumbnail"),
    }
  }

  fn staged_path(&self, file_name: &str) -> PathBuf {
    self.dir.join(format!(".{file_name}.staged"))
  }

  pub async fn has_thumb(&self, file_name: &str) -> bool {
    fs::try_exists(self.thumb_path(file_name)).await.unwrap_or(false)
  }

  /// Best effort; a leftover thumbnail is harmless.
  pub async fn remove_thumb(&self, file_name: &str) {
    match fs::remove_file(self.thumb_path(file_name)).await {
      Ok(()) => debug!(file_name, "removed thumbnail"),
      Err(err) if err.kind() == ErrorKind::NotFound => {},
      Err(err) => warn!(file_name, error = %err, "failed to remove thumbnail"),
    }
  }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);
  fs::write(&tmp, bytes).await?;
  if let Err(err) = fs::rename(&tmp, path).await {
    let _ = fs::remove_file(&tmp).await;
    return Err(err);
  }
  Ok(())
}
