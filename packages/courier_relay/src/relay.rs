use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use crate::error::RelayError;
use crate::message::{MediaKind, Message, MessageFactory};
use crate::protocol::{ClientFrame, InboundMessage, ServerFrame, parse_subscribe};
use crate::registry::{ConnectionId, ConnectionState, Registry, Subscription};

/// One outbound frame addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: ConnectionId,
    pub frame: String,
}

/// Nickname registry plus message relay, driven by transport events.
///
/// All methods take `&self` and may be called concurrently from any number
/// of connection tasks. Each registry operation holds the lock only for the
/// lookup or update itself; parsing and encoding happen outside it.
#[derive(Debug, Default)]
pub struct Relay {
    registry: Mutex<Registry>,
    factory: MessageFactory,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connection_open(&self, conn: ConnectionId) {
        self.registry().open(conn);
        trace!(%conn, "connection opened");
    }

    /// Drops the connection and any binding it held. Returns the released nickname.
    pub fn on_connection_close(&self, conn: ConnectionId) -> Option<String> {
        let released = self.registry().close(conn);
        debug!(%conn, nickname = ?released, "connection closed");
        released
    }

    /// Handles one inbound frame and returns the frames to send.
    pub fn on_frame(&self, conn: ConnectionId, raw: &[u8]) -> Result<Vec<Delivery>, RelayError> {
        // Nicknames tolerate bad bytes (replaced with U+FFFD); JSON frames do not.
        if let Some(nickname) = parse_subscribe(&String::from_utf8_lossy(raw)) {
            self.subscribe(conn, nickname)?;
            return Ok(Vec::new());
        }
        let text = std::str::from_utf8(raw)?;

        match self.registry().state(conn) {
            ConnectionState::Bound(_) => {}
            ConnectionState::Unbound => return Err(RelayError::UnboundSender(conn)),
            ConnectionState::Closed => return Err(RelayError::UnknownConnection(conn)),
        }

        match serde_json::from_str::<ClientFrame>(text)? {
            ClientFrame::Ping => {
                let frame = ServerFrame::Pong.encode().map_err(RelayError::Encode)?;
                Ok(vec![Delivery { target: conn, frame }])
            }
            ClientFrame::Message { message } => match self.build(message) {
                Some(message) => self.deliver(conn, message),
                None => Ok(Vec::new()),
            },
            ClientFrame::Unsupported => {
                trace!(%conn, "ignoring frame with unsupported type");
                Ok(Vec::new())
            }
        }
    }

    /// Binds `nickname` to `conn`, as a `subscribe:` frame would.
    pub fn subscribe(&self, conn: ConnectionId, nickname: &str) -> Result<Subscription, RelayError> {
        let subscription = self
            .registry()
            .subscribe(conn, nickname)
            .ok_or(RelayError::UnknownConnection(conn))?;
        debug!(%conn, nickname, evicted = ?subscription.evicted, "subscribed");
        Ok(subscription)
    }

    /// Connection currently bound to `nickname`.
    pub fn lookup(&self, nickname: &str) -> Option<ConnectionId> {
        self.registry().lookup(nickname)
    }

    pub fn state(&self, conn: ConnectionId) -> ConnectionState {
        self.registry().state(conn)
    }

    pub fn connection_count(&self) -> usize {
        self.registry().connection_count()
    }

    pub fn bound_count(&self) -> usize {
        self.registry().bound_count()
    }

    fn build(&self, inbound: InboundMessage) -> Option<Message> {
        match inbound {
            InboundMessage::Text(input) => Some(self.factory.new_text_message(input)),
            InboundMessage::Image(input) => {
                Some(self.factory.new_media_message(MediaKind::Image, input))
            }
            InboundMessage::Video(input) => {
                Some(self.factory.new_media_message(MediaKind::Video, input))
            }
            InboundMessage::Unsupported => None,
        }
    }

    /// Echoes to the sender and forwards to the receiver if one is bound.
    fn deliver(&self, origin: ConnectionId, message: Message) -> Result<Vec<Delivery>, RelayError> {
        let receiver = self.lookup(message.receiver());
        let id = message.id;
        let frame = ServerFrame::Message { message }
            .encode()
            .map_err(RelayError::Encode)?;

        let mut deliveries = Vec::with_capacity(2);
        deliveries.push(Delivery {
            target: origin,
            frame: frame.clone(),
        });
        match receiver {
            Some(target) => deliveries.push(Delivery { target, frame }),
            None => debug!(%origin, message_id = %id, "receiver not connected, echoing to sender only"),
        }
        Ok(deliveries)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(relay: &Relay, nickname: &str) -> ConnectionId {
        let conn = ConnectionId::new();
        relay.on_connection_open(conn);
        relay
            .on_frame(conn, format!("subscribe:{nickname}").as_bytes())
            .unwrap();
        conn
    }

    #[test]
    fn subscribe_frame_sends_nothing() {
        let relay = Relay::new();
        let conn = ConnectionId::new();
        relay.on_connection_open(conn);

        let out = relay.on_frame(conn, b"subscribe:alice").unwrap();
        assert!(out.is_empty());
        assert_eq!(relay.lookup("alice"), Some(conn));
    }

    #[test]
    fn subscribe_on_unopened_connection_fails() {
        let relay = Relay::new();
        let conn = ConnectionId::new();

        let err = relay.on_frame(conn, b"subscribe:alice").unwrap_err();
        assert!(matches!(err, RelayError::UnknownConnection(c) if c == conn));
        assert_eq!(relay.lookup("alice"), None);
    }

    #[test]
    fn unbound_frames_are_rejected() {
        let relay = Relay::new();
        let conn = ConnectionId::new();
        relay.on_connection_open(conn);

        let err = relay.on_frame(conn, br#"{"type":"ping"}"#).unwrap_err();
        assert!(matches!(err, RelayError::UnboundSender(_)));
    }

    #[test]
    fn non_utf8_is_malformed() {
        let relay = Relay::new();
        let conn = bound(&relay, "alice");

        let err = relay.on_frame(conn, &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, RelayError::MalformedFrame(_)));
    }

    #[test]
    fn unsupported_frames_produce_nothing() {
        let relay = Relay::new();
        let conn = bound(&relay, "alice");

        assert!(relay.on_frame(conn, br#"{"type":"typing"}"#).unwrap().is_empty());
        assert!(
            relay
                .on_frame(conn, br#"{"type":"message","message":{"type":"audio"}}"#)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn self_addressed_message_is_delivered_twice() {
        let relay = Relay::new();
        let conn = bound(&relay, "alice");

        let out = relay
            .on_frame(
                conn,
                br#"{"type":"message","message":{"type":"text","content":"note","sender":"alice","receiver":"alice"}}"#,
            )
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.target == conn));
        assert_eq!(out[0].frame, out[1].frame);
    }

    #[test]
    fn poisoned_lock_still_serves() {
        let relay = std::sync::Arc::new(Relay::new());
        let conn = bound(&relay, "alice");

        let poisoner = relay.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.registry.lock().unwrap();
            panic!("poison the registry lock");
        })
        .join();

        assert_eq!(relay.lookup("alice"), Some(conn));
    }
}
