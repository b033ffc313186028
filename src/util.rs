use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::StickerFormat;

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid regex"));
static PHONE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-().]").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
  #[error("phone number must contain 7 to 15 digits")]
  InvalidFormat,
  #[error("phone number must not start with 0")]
  LeadingZero,
}

/// Normalizes a phone number to `+<digits>`.
pub fn normalize_phone(input: &str) -> Result<String, PhoneError> {
  let compact = PHONE_SEPARATORS.replace_all(input.trim(), "");
  if !PHONE_PATTERN.is_match(&compact) {
    return Err(PhoneError::InvalidFormat);
  }
  let digits = compact.trim_start_matches('+');
  if digits.starts_with('0') {
    return Err(PhoneError::LeadingZero);
  }
  Ok(format!("+{digits}"))
}

/// Extension of the last path component, or `fallback` when it has none.
pub fn path_ext<'a>(path: &'a str, fallback: &'a str) -> &'a str {
  let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
  match name.rfind('.') {
    Some(i) if i + 1 < name.len() => &name[i + 1 ..],
    _ => fallback,
  }
}

/// Sticker format the bot accepts for an upload with this file name.
pub fn upload_format(path: &str) -> Option<StickerFormat> {
  match path_ext(path, "").to_ascii_lowercase().as_str() {
    "png" | "webp" => Some(StickerFormat::Static),
    "tgs" => Some(StickerFormat::Animated),
    "webm" => Some(StickerFormat::Video),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::PhoneError;
  use super::normalize_phone;
  use super::path_ext;
  use super::upload_format;
  use crate::models::StickerFormat;

  #[test]
  fn normalizes_valid_phones() {
    assert_eq!(normalize_phone("+44 7700 900123"), Ok("+447700900123".to_string()));
    assert_eq!(normalize_phone("1 (555) 010-9999"), Ok("+15550109999".to_string()));
  }

  #[test]
  fn rejects_invalid_phones() {
    assert_eq!(normalize_phone("12345"), Err(PhoneError::InvalidFormat));
    assert_eq!(normalize_phone("+1abc5550109"), Err(PhoneError::InvalidFormat));
    assert_eq!(normalize_phone("0123456789"), Err(PhoneError::LeadingZero));
  }

  #[test]
  fn extracts_extensions() {
    assert_eq!(path_ext("stickers/file_12.webp", "bin"), "webp");
    assert_eq!(path_ext("thumbnails/file.tar.tgs", "bin"), "tgs");
    assert_eq!(path_ext("dir.v2/file", "webp"), "webp");
    assert_eq!(path_ext("trailing.", "webp"), "webp");
  }

  #[test]
  fn detects_upload_formats() {
    assert_eq!(upload_format("cat.PNG"), Some(StickerFormat::Static));
    assert_eq!(upload_format("/tmp/dance.tgs"), Some(StickerFormat::Animated));
    assert_eq!(upload_format("clip.webm"), Some(StickerFormat::Video));
    assert_eq!(upload_format("cat.gif"), None);
    assert_eq!(upload_format("noext"), None);
  }
}
