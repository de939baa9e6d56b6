//! Configuration management commands.

use clap::{Args, Subcommand};

use mqttchat_cli::Context as CliContext;

use super::{get_config, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Contexts allow you to manage multiple broker profiles,
/// similar to kubectl's context management.
///
/// Configuration is stored in ~/.mqttchat/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a context
    #[command(name = "add-context")]
    AddContext {
        /// Context name
        name: String,
        /// Broker host
        #[arg(long)]
        host: Option<String>,
        /// Broker port
        #[arg(long)]
        port: Option<u16>,
        /// Connect with TLS
        #[arg(long)]
        tls: bool,
        /// Client id prefix
        #[arg(long)]
        client_id_prefix: Option<String>,
        /// Filter to subscribe to
        #[arg(long)]
        subscribe_topic: Option<String>,
        /// Topic to publish to
        #[arg(long)]
        publish_topic: Option<String>,
        /// QoS level (0, 1 or 2)
        #[arg(long)]
        qos: Option<u8>,
        /// Keep alive in seconds
        #[arg(long)]
        keep_alive: Option<u16>,
        /// Connect timeout in seconds
        #[arg(long)]
        connect_timeout: Option<u64>,
    },
    /// Delete a context
    #[command(name = "delete-context")]
    DeleteContext {
        /// Context name
        name: String,
    },
    /// Set the current context
    #[command(name = "use-context")]
    UseContext {
        /// Context name
        name: String,
    },
    /// Display the current context
    #[command(name = "get-context")]
    GetContext,
    /// List all contexts
    #[command(name = "list-contexts", alias = "get-contexts")]
    ListContexts,
    /// View the current configuration
    View,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddContext {
                name,
                host,
                port,
                tls,
                client_id_prefix,
                subscribe_topic,
                publish_topic,
                qos,
                keep_alive,
                connect_timeout,
            } => {
                let mut cfg = get_config(cli)?;

                let ctx = CliContext {
                    host: host.clone().unwrap_or_default(),
                    port: port.unwrap_or(0),
                    tls: *tls,
                    client_id_prefix: client_id_prefix.clone().unwrap_or_default(),
                    subscribe_topic: subscribe_topic.clone().unwrap_or_default(),
                    publish_topic: publish_topic.clone().unwrap_or_default(),
                    qos: qos.unwrap_or(0),
                    keep_alive: keep_alive.unwrap_or(0),
                    connect_timeout: connect_timeout.unwrap_or(0),
                    ..Default::default()
                };

                cfg.add_context(name, ctx)?;
                print_success(&format!("Context \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::DeleteContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_context(name)?;
                print_success(&format!("Context \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_context(name)?;
                print_success(&format!("Switched to context \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetContext => {
                let cfg = get_config(cli)?;
                if cfg.current_context.is_empty() {
                    println!("No current context set");
                } else {
                    println!("{}", cfg.current_context);
                }
                Ok(())
            }

            ConfigSubcommand::ListContexts => {
                let cfg = get_config(cli)?;

                if cfg.contexts.is_empty() {
                    println!("No contexts configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<30} {}", "CURRENT", "NAME", "BROKER", "TOPICS");

                for (name, ctx) in &cfg.contexts {
                    let current = if name == &cfg.current_context { "*" } else { "" };
                    let broker = format!(
                        "{}:{}{}",
                        ctx.host(),
                        ctx.port(),
                        if ctx.tls { " (tls)" } else { "" }
                    );
                    let topics = format!("{} -> {}", ctx.publish_topic(), ctx.subscribe_topic());
                    println!("{:<8} {:<20} {:<30} {}", current, name, broker, topics);
                }

                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;

                println!("Config file: {}", cfg.path().display());
                println!("Current context: {}", cfg.current_context);
                println!("Contexts: {}", cfg.contexts.len());

                if !cfg.contexts.is_empty() {
                    println!("\nContext details:");

                    for (name, ctx) in &cfg.contexts {
                        println!("\n  {}:", name);
                        println!("    Broker: {}:{}", ctx.host(), ctx.port());
                        println!("    TLS: {}", ctx.tls);
                        println!("    Subscribe: {}", ctx.subscribe_topic());
                        println!("    Publish: {}", ctx.publish_topic());
                        println!("    QoS: {}", ctx.qos());
                        if !ctx.client_id_prefix.is_empty() {
                            println!("    Client ID prefix: {}", ctx.client_id_prefix);
                        }
                        if ctx.keep_alive > 0 {
                            println!("    Keep alive: {}s", ctx.keep_alive);
                        }
                        if ctx.connect_timeout > 0 {
                            println!("    Connect timeout: {}s", ctx.connect_timeout);
                        }
                    }
                }

                Ok(())
            }
        }
    }
}
