//! The boundary contract a `MessagingCore` expects its network layer to
//! fulfil.

use bytes::Bytes;

use crate::error::TransportSendError;
use crate::wire::DeliveryClass;

/// What a `MessagingCore` needs from the network layer underneath it.
///
/// This is the messaging core's only outward-facing dependency; it never
/// assumes anything about sockets, reliability implementation, or framing
/// below the batch boundary. Modeled after the narrow `send`/`flush`
/// surface of `aeronet_channel::server::ChannelServer`'s `ServerTransport`
/// impl, stripped of the event-polling half since inbound bytes arrive
/// through `handle_incoming_data` instead of being polled from here.
pub trait Transport {
    /// Hands a fully framed batch of bytes to the network layer for
    /// delivery to `peer_id` under `delivery_class`'s contract.
    ///
    /// # Errors
    ///
    /// Errors if the underlying network layer rejects the send outright
    /// (e.g. the peer is already gone at the transport level). A dropped
    /// packet due to unreliable delivery is not an error; only hand-off
    /// failures are.
    fn send_batch(
        &mut self,
        peer_id: u64,
        delivery_class: DeliveryClass,
        batch: Bytes,
    ) -> Result<(), TransportSendError>;
}
