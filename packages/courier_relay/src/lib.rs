//! Courier relay - nickname registry and message relay
//!
//! This crate holds the delivery semantics of the courier service and nothing
//! else: it has no socket, HTTP or runtime dependencies. A transport feeds it
//! connection lifecycle events and raw frames, and sends whatever
//! [`Delivery`] values come back.
//!
//! # Example
//!
//! ```
//! use courier_relay::{ConnectionId, Relay};
//!
//! let relay = Relay::new();
//! let alice = ConnectionId::new();
//! let bob = ConnectionId::new();
//! relay.on_connection_open(alice);
//! relay.on_connection_open(bob);
//!
//! relay.on_frame(alice, b"subscribe:alice").unwrap();
//! relay.on_frame(bob, b"subscribe:bob").unwrap();
//!
//! let frame = br#"{"type":"message","message":{"type":"text","content":"hi","sender":"alice","receiver":"bob"}}"#;
//! let deliveries = relay.on_frame(alice, frame).unwrap();
//!
//! let targets: Vec<_> = deliveries.iter().map(|d| d.target).collect();
//! assert_eq!(targets, vec![alice, bob]);
//! ```

mod error;
pub mod message;
pub mod protocol;
pub mod registry;
mod relay;

pub use error::RelayError;
pub use message::{MediaInput, MediaKind, Message, MessageBody, MessageFactory, TextInput};
pub use protocol::{ClientFrame, InboundMessage, ServerFrame};
pub use registry::{ClientBinding, ConnectionId, ConnectionState, Registry, Subscription};
pub use relay::{Delivery, Relay};
