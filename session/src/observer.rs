//! Session observers.
//!
//! A [`Session`](crate::Session) reports lifecycle changes, inbound messages
//! and subscribe acknowledgements to one [`Observer`]. Callbacks run on the
//! session's tasks and must not block.

use tokio::sync::mpsc;

use crate::types::{Message, QoS, SessionEvent, SessionState};

/// Receives session notifications. All methods default to no-ops.
pub trait Observer: Send + Sync {
    /// Called on every state transition. `error` is set for failure events.
    fn on_state_change(&self, state: SessionState, event: SessionEvent, error: Option<&str>) {
        let _ = (state, event, error);
    }

    /// Called once per inbound PUBLISH, in arrival order.
    fn on_message(&self, message: &Message) {
        let _ = message;
    }

    /// Called when a SUBACK arrives. `granted` is `None` when the broker
    /// rejected the filter.
    fn on_subscribe_ack(&self, filter: &str, granted: Option<QoS>) {
        let _ = (filter, granted);
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Notification forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged {
        state: SessionState,
        event: SessionEvent,
        error: Option<String>,
    },
    Message(Message),
    SubscribeAck {
        filter: String,
        granted: Option<QoS>,
    },
}

/// Observer that forwards every notification into an unbounded channel.
///
/// Sends after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn on_state_change(&self, state: SessionState, event: SessionEvent, error: Option<&str>) {
        let _ = self.tx.send(Event::StateChanged {
            state,
            event,
            error: error.map(str::to_string),
        });
    }

    fn on_message(&self, message: &Message) {
        let _ = self.tx.send(Event::Message(message.clone()));
    }

    fn on_subscribe_ack(&self, filter: &str, granted: Option<QoS>) {
        let _ = self.tx.send(Event::SubscribeAck {
            filter: filter.to_string(),
            granted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_state_change(SessionState::Connected, SessionEvent::Connected, None);
        observer.on_message(&Message::new("t", "hi"));
        observer.on_subscribe_ack("x/#", Some(QoS::AtMostOnce));

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::StateChanged {
                state: SessionState::Connected,
                event: SessionEvent::Connected,
                error: None,
            }
        );
        match rx.try_recv().unwrap() {
            Event::Message(msg) => assert_eq!(msg.payload_str(), Some("hi")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::SubscribeAck {
                filter: "x/#".to_string(),
                granted: Some(QoS::AtMostOnce),
            }
        );
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_message(&Message::new("t", "ignored"));
    }
}
