//! Subscribe-and-print command.

use clap::Args;

use mqttchat_session::{Event, SessionState};

use super::{BrokerArgs, connect, format_message, report_state_change, resolve_context, subscribe};
use crate::Cli;

/// Print incoming messages until interrupted.
#[derive(Args)]
pub struct SubCommand {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Filter to subscribe to (overrides context)
    #[arg(long)]
    topic: Option<String>,

    /// Exit after this many messages
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

impl SubCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut ctx = resolve_context(cli, &self.broker)?;
        if let Some(topic) = &self.topic {
            ctx.subscribe_topic = topic.clone();
        }

        let (session, mut events) = connect(&ctx).await?;
        subscribe(&session, ctx.subscribe_topic(), ctx.qos()).await?;

        let mut received = 0usize;
        loop {
            if self.count.is_some_and(|n| received >= n) {
                break;
            }
            tokio::select! {
                event = events.recv() => match event {
                    Some(Event::Message(msg)) => {
                        println!("{}", format_message(&msg));
                        received += 1;
                    }
                    Some(Event::StateChanged { state: SessionState::Disconnected, event, error }) => {
                        if report_state_change(event, error.as_deref()) {
                            anyhow::bail!("disconnected from broker");
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        session.disconnect().await?;
        Ok(())
    }
}
