//! Single-message publish command.

use clap::Args;

use super::{BrokerArgs, connect, print_success, resolve_context};
use crate::Cli;

/// Publish one message and disconnect.
#[derive(Args)]
pub struct PubCommand {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Message text
    text: String,

    /// Topic to publish to (overrides context)
    #[arg(long)]
    topic: Option<String>,

    /// Ask the broker to retain the message
    #[arg(long)]
    retain: bool,
}

impl PubCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut ctx = resolve_context(cli, &self.broker)?;
        if let Some(topic) = &self.topic {
            ctx.publish_topic = topic.clone();
        }

        let (session, _events) = connect(&ctx).await?;
        let result = session
            .publish(ctx.publish_topic(), self.text.clone(), ctx.qos(), self.retain)
            .await;
        session.disconnect().await?;
        result?;

        print_success(&format!(
            "Published {} bytes to {} ({})",
            self.text.len(),
            ctx.publish_topic(),
            ctx.qos()
        ));
        Ok(())
    }
}
