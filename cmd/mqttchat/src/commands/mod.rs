//! CLI commands module.

mod chat;
mod config;
mod publish;
mod subscribe;
mod util;

pub use chat::ChatCommand;
pub use config::ConfigCommand;
pub use publish::PubCommand;
pub use subscribe::SubCommand;

// Re-export utils for use in commands
pub(crate) use util::*;
