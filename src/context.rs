//! The context object handed to a message handler at dispatch time.

use crate::wire::MessageHeader;

/// Everything a [`Message::receive`](crate::registry::Message::receive) impl
/// needs to know about where its message came from.
///
/// `Owner` is the same cheap, cloneable handle type the embedding
/// application chose for its `MessagingCore<Owner>`; it is cloned once per
/// dispatched message so a handler can reach back into application state
/// without the registry needing to know anything about that state's shape.
#[derive(Debug, Clone)]
pub struct NetworkContext<Owner> {
    /// Handle back into the embedding application's own state.
    pub owner: Owner,
    /// Numeric identity of the peer that sent this message.
    pub sender_id: u64,
    /// Local monotonic timestamp, in seconds, at which this message was
    /// pulled off the incoming message queue.
    pub timestamp: f32,
    /// The wire header this message was framed with.
    pub header: MessageHeader,
}
