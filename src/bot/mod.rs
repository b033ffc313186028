pub mod commands;
pub mod dispatcher;
pub mod protocol;
pub mod state;

pub use commands::Command;
pub use dispatcher::Dispatcher;
