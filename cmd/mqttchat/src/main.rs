//! mqttchat - a terminal chat over a single MQTT topic.

use clap::{Parser, Subcommand};

mod commands;

use commands::{ChatCommand, ConfigCommand, PubCommand, SubCommand};

/// mqttchat - a terminal chat over a single MQTT topic.
///
/// Subscribes to a topic filter, publishes each line you type and prints
/// incoming messages as they arrive. Without any configuration it talks to
/// the public HiveMQ broker on messagesFromCroatia.
///
/// Broker profiles are stored in ~/.mqttchat/ and support multiple contexts,
/// similar to kubectl's context management.
#[derive(Parser)]
#[command(name = "mqttchat")]
#[command(about = "MQTT chat CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.mqttchat/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Context name to use
    #[arg(short = 'c', long, global = true)]
    pub context: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Interactive chat: publish stdin lines, print incoming messages
    Chat(ChatCommand),
    /// Publish a single message
    Pub(PubCommand),
    /// Print incoming messages
    Sub(SubCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_logging(cli.verbose);

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Chat(cmd) => cmd.run(&cli).await,
        Commands::Pub(cmd) => cmd.run(&cli).await,
        Commands::Sub(cmd) => cmd.run(&cli).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["mqttchat", "-v", "-c", "local", "sub", "--topic", "x/#"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.context.as_deref(), Some("local"));
        assert!(matches!(cli.command, Commands::Sub(_)));
    }

    #[test]
    fn test_pub_requires_text() {
        assert!(Cli::try_parse_from(["mqttchat", "pub"]).is_err());
        assert!(Cli::try_parse_from(["mqttchat", "pub", "hello"]).is_ok());
    }
}
