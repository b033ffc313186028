//! Manage your Telegram sticker packs by talking to `@Stickers` from a user
//! account, with a local cache of pack metadata and thumbnails.

pub mod app;
pub mod bot;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod source;
pub mod sync;
pub mod telemetry;
pub mod util;

#[cfg(test)]
mod testing;

pub use app::App;
pub use client::MessagingClient;
pub use config::Config;
pub use error::Result;
pub use error::StickerError;
pub use session::Session;
pub use session::SignInState;
pub use source::BotApiSource;
pub use source::StickerSetSource;
pub use sync::Stickers;
pub use sync::SyncReport;
