//! Utility functions for CLI commands.

use std::sync::Arc;

use clap::Args;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use mqttchat_cli::{Config, Context, load_config};
use mqttchat_session::{ChannelObserver, Event, Message, QoS, Session, SessionEvent};

use crate::Cli;

/// Install the tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// Gets the context to use.
///
/// With no `-c` flag and no current context the built-in defaults apply.
pub fn get_context(cli: &Cli) -> anyhow::Result<Context> {
    let cfg = get_config(cli)?;

    match cfg.resolve_context(cli.context.as_deref()) {
        Some(ctx) => Ok(ctx.clone()),
        None => match cli.context.as_deref() {
            Some(name) if !name.is_empty() => anyhow::bail!("context '{}' not found", name),
            _ => Ok(Context::default()),
        },
    }
}

/// Broker flags shared by the chat, pub and sub commands.
#[derive(Args, Debug, Default, Clone)]
pub struct BrokerArgs {
    /// Broker host (overrides context)
    #[arg(long)]
    pub host: Option<String>,

    /// Broker port (overrides context)
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect with TLS
    #[arg(long)]
    pub tls: bool,

    /// QoS level 0, 1 or 2 (overrides context)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: Option<u8>,

    /// Client id prefix (overrides context)
    #[arg(long)]
    pub client_id_prefix: Option<String>,
}

impl BrokerArgs {
    /// Apply the flags that were given on top of `ctx`.
    pub fn apply(&self, ctx: &mut Context) {
        if let Some(host) = &self.host {
            ctx.host = host.clone();
        }
        if let Some(port) = self.port {
            ctx.port = port;
        }
        if self.tls {
            ctx.tls = true;
        }
        if let Some(qos) = self.qos {
            ctx.qos = qos;
        }
        if let Some(prefix) = &self.client_id_prefix {
            ctx.client_id_prefix = prefix.clone();
        }
    }
}

/// Resolve the context and apply broker flag overrides.
pub fn resolve_context(cli: &Cli, broker: &BrokerArgs) -> anyhow::Result<Context> {
    let mut ctx = get_context(cli)?;
    broker.apply(&mut ctx);
    ctx.validate()?;
    Ok(ctx)
}

/// Connect a session for `ctx`, returning it with its event stream.
pub async fn connect(
    ctx: &Context,
) -> anyhow::Result<(Arc<Session>, mpsc::UnboundedReceiver<Event>)> {
    let config = ctx.connection_config();
    print_info(&format!(
        "Connecting to {}{} as {}",
        config.addr(),
        if config.use_tls { " (tls)" } else { "" },
        config.client_id
    ));

    let (observer, events) = ChannelObserver::new();
    let session = Arc::new(Session::new(config, Arc::new(observer)));
    session.connect().await?;
    print_success("Connected");
    Ok((session, events))
}

/// Subscribe and report the granted QoS.
pub async fn subscribe(session: &Session, filter: &str, qos: QoS) -> anyhow::Result<()> {
    let granted = session.subscribe(filter, qos).await?;
    if granted < qos {
        print_warning(&format!("Subscribed to {} (downgraded to {})", filter, granted));
    } else {
        print_success(&format!("Subscribed to {} ({})", filter, granted));
    }
    Ok(())
}

/// Printable form of a payload: UTF-8 text or a byte count.
pub fn format_payload(msg: &Message) -> String {
    match msg.payload_str() {
        Some(text) => text.to_string(),
        None => format!("<{} bytes of binary data>", msg.payload.len()),
    }
}

/// One log line for an incoming message.
pub fn format_message(msg: &Message) -> String {
    let retained = if msg.retain { " [retained]" } else { "" };
    format!("{}{}: {}", msg.topic, retained, format_payload(msg))
}

/// Report a state change that ended the connection. Returns `true` if the
/// session is gone.
pub fn report_state_change(event: SessionEvent, error: Option<&str>) -> bool {
    let detail = error.unwrap_or("no details");
    match event {
        SessionEvent::ConnectionClosedByBroker => {
            print_error(&format!("Connection closed by broker: {}", detail));
            true
        }
        SessionEvent::ConnectionError => {
            print_error(&format!("Connection error: {}", detail));
            true
        }
        SessionEvent::ProtocolError => {
            print_error(&format!("Protocol error: {}", detail));
            true
        }
        SessionEvent::ConnectionRefused => {
            print_error(&format!("Connection refused: {}", detail));
            true
        }
        SessionEvent::ConnectionClosed => true,
        SessionEvent::Connecting | SessionEvent::Connected => false,
    }
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints error message.
pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m✗\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_args_override_context() {
        let mut ctx = Context {
            host: "from-config".to_string(),
            port: 1884,
            ..Default::default()
        };
        let args = BrokerArgs {
            host: Some("from-flag".to_string()),
            tls: true,
            qos: Some(2),
            ..Default::default()
        };
        args.apply(&mut ctx);

        assert_eq!(ctx.host, "from-flag");
        assert_eq!(ctx.port, 1884);
        assert!(ctx.tls);
        assert_eq!(ctx.qos(), QoS::ExactlyOnce);
    }

    #[test]
    fn test_format_message() {
        let text = Message::new("room/1", "hi there");
        assert_eq!(format_message(&text), "room/1: hi there");

        let binary = Message::new("room/1", vec![0xff, 0x00, 0xfe]).with_retain(true);
        assert_eq!(
            format_message(&binary),
            "room/1 [retained]: <3 bytes of binary data>"
        );
    }

    #[test]
    fn test_report_state_change() {
        assert!(!report_state_change(SessionEvent::Connected, None));
        assert!(report_state_change(SessionEvent::ConnectionClosed, None));
        assert!(report_state_change(
            SessionEvent::ConnectionClosedByBroker,
            Some("eof")
        ));
    }
}
