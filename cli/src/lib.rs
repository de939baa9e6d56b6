//! CLI utilities for mqttchat.
//!
//! Broker profiles ("contexts") are stored in `~/.mqttchat/config.yaml`,
//! similar to kubectl's context management.

pub mod config;

pub use config::{Config, Context, load_config, save_config};
