//! Interactive chat command.

use std::collections::VecDeque;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use mqttchat_session::{Event, Message, SessionState};

use super::{
    BrokerArgs, connect, format_message, print_info, print_warning, report_state_change,
    resolve_context, subscribe,
};
use crate::Cli;

/// Interactive chat.
///
/// Every line typed on stdin is published to the publish topic; messages
/// arriving on the subscribed filter are printed as they come in.
/// `/log` reprints the message log newest first, `/quit` leaves.
#[derive(Args)]
pub struct ChatCommand {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Filter to subscribe to (overrides context)
    #[arg(long)]
    sub_topic: Option<String>,

    /// Topic to publish to (overrides context)
    #[arg(long)]
    pub_topic: Option<String>,

    /// Number of messages kept for /log
    #[arg(long, default_value_t = 100)]
    history: usize,
}

/// Received messages, newest first.
pub struct MessageLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Prepend a message, dropping the oldest entry when full.
    pub fn push(&mut self, msg: &Message) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(format_message(msg));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ChatCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut ctx = resolve_context(cli, &self.broker)?;
        if let Some(topic) = &self.sub_topic {
            ctx.subscribe_topic = topic.clone();
        }
        if let Some(topic) = &self.pub_topic {
            ctx.publish_topic = topic.clone();
        }

        let qos = ctx.qos();
        let (session, mut events) = connect(&ctx).await?;
        subscribe(&session, ctx.subscribe_topic(), qos).await?;
        print_info(&format!(
            "Publishing to {}. Type a message and press enter; /log shows history, /quit exits.",
            ctx.publish_topic()
        ));

        let mut log = MessageLog::new(self.history);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let text = line.trim();
                    match text {
                        "" => {}
                        "/quit" => break,
                        "/log" => {
                            if log.is_empty() {
                                println!("(no messages yet)");
                            }
                            for entry in log.iter() {
                                println!("  {}", entry);
                            }
                        }
                        _ => {
                            if let Err(e) = session
                                .publish(ctx.publish_topic(), text.to_string(), qos, false)
                                .await
                            {
                                print_warning(&format!("Publish failed: {}", e));
                            }
                        }
                    }
                }
                event = events.recv() => match event {
                    Some(Event::Message(msg)) => {
                        println!("{}", format_message(&msg));
                        log.push(&msg);
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
        print_info(&format!("Disconnected ({} messages received)", log.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_newest_first_and_bounded() {
        let mut log = MessageLog::new(2);
        log.push(&Message::new("t", "one"));
        log.push(&Message::new("t", "two"));
        log.push(&Message::new("t", "three"));

        let entries: Vec<&str> = log.iter().collect();
        assert_eq!(entries, vec!["t: three", "t: two"]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_zero_capacity_log() {
        let mut log = MessageLog::new(0);
        log.push(&Message::new("t", "dropped"));
        assert!(log.is_empty());
    }
}
