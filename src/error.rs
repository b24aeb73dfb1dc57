//! Error types for every fallible operation in the crate.
//!
//! Each error is a plain struct or enum deriving [`derive_more::Display`] and
//! [`derive_more::Error`], matching the style used throughout
//! `aeronet_transport` (see its `limit.rs` and `frag.rs`) rather than
//! `thiserror`, which only shows up in the crate's older `aeronet_channel`
//! generation.

use derive_more::{Display, Error};

/// A write would have pushed a [`BufferWriter`](crate::buffer::BufferWriter)
/// past its ceiling.
#[derive(Debug, Clone, Copy, Display, Error)]
#[display("buffer write of {requested} bytes would exceed remaining capacity of {remaining}")]
pub struct BufferOverflow {
    /// How many bytes the caller tried to reserve.
    pub requested: usize,
    /// How many bytes were actually available.
    pub remaining: usize,
}

/// A read was attempted past the end of a [`BufferReader`](crate::buffer::BufferReader).
#[derive(Debug, Clone, Copy, Display, Error)]
#[display("buffer read of {requested} bytes exceeds remaining {remaining}")]
pub struct ShortRead {
    /// How many bytes the caller tried to read.
    pub requested: usize,
    /// How many bytes were actually available.
    pub remaining: usize,
}

/// Failure to register a message type in a
/// [`MessageRegistryBuilder`](crate::registry::MessageRegistryBuilder).
#[derive(Debug, Clone, Copy, Display, Error)]
pub enum RegistryError {
    /// More than 255 message types were registered against the same owner
    /// type.
    ///
    /// A [`MessageTag`](crate::registry::MessageTag) is a single byte, so the
    /// 256th registration can never be represented on the wire.
    #[display("cannot register more than 255 message types")]
    TooManyMessageTypes,
    /// The message type's [`OwnerBinding`](crate::registry::OwnerBinding)
    /// does not admit this registry's `Owner` type.
    #[display("message type is not bound to this owner type")]
    OwnerNotBound,
}

/// Failure while decoding a single inbound blob of batched wire data.
#[derive(Debug, Clone, Copy, Display, Error)]
pub enum MalformedBatch {
    /// The blob was too short to contain even a [`BatchHeader`](crate::wire::BatchHeader).
    #[display("blob of {len} bytes is too short to contain a batch header")]
    TruncatedBatchHeader {
        /// Length of the blob that was handed in.
        len: usize,
    },
    /// A message header inside the batch claimed a size that runs past the
    /// end of the blob.
    #[display(
        "message header at offset {offset} claims a payload of {claimed} bytes, \
         but only {available} bytes remain"
    )]
    TruncatedMessagePayload {
        /// Byte offset of the message header within the blob.
        offset: usize,
        /// Payload length claimed by the message header.
        claimed: usize,
        /// Bytes actually remaining in the blob.
        available: usize,
    },
    /// A message header referenced a [`MessageTag`](crate::registry::MessageTag)
    /// with no registered handler.
    #[display("message tag {tag} has no registered handler")]
    UnknownMessageTag {
        /// The unrecognised tag value.
        tag: u8,
    },
}

/// Failure while queueing an outbound message for later flushing.
#[derive(Debug, Clone, Copy, Display, Error)]
pub enum SendFault {
    /// The peer this message targeted is not currently connected.
    #[display("peer {peer_id} is not connected")]
    PeerNotConnected {
        /// Numeric identity of the targeted peer.
        peer_id: u64,
    },
    /// The message, once framed with a [`MessageHeader`](crate::wire::MessageHeader),
    /// is larger than the delivery class's maximum single-message size.
    #[display(
        "message of {framed_len} bytes (with header) exceeds the {limit}-byte \
         ceiling for this delivery class"
    )]
    MessageTooLarge {
        /// Size of the message once framed with its header.
        framed_len: usize,
        /// Maximum allowed size for the delivery class used.
        limit: usize,
    },
    /// A registered [`Hook`](crate::hook::Hook) vetoed this send via
    /// `can_send`.
    #[display("send vetoed by a hook")]
    VetoedByHook,
}

/// Failure signalled by a [`Transport`](crate::transport::Transport) while
/// attempting to hand a flushed batch off to the network.
#[derive(Debug, Clone, Display, Error)]
#[display("transport failed to send batch to peer {peer_id}: {reason}")]
pub struct TransportSendError {
    /// Peer the batch was addressed to.
    pub peer_id: u64,
    /// Human-readable description of the underlying transport failure.
    pub reason: String,
}
