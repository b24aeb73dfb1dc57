//! Decodes a transport-delivered blob into individual messages and
//! dispatches each one to its registered handler.
//!
//! Grounded on `aeronet_transport::recv::TransportRecv::poll`'s two-phase
//! shape: bytes arrive and are parsed into discrete messages in one pass
//! (`handle_incoming_data`), then those messages are drained and handed to
//! application code in a second pass (`process_incoming_message_queue`),
//! matching `poll`'s `recv_on` followed by draining `recv_msgs`.

use std::panic::{self, AssertUnwindSafe};

use ahash::AHashMap;
use tracing::{trace, trace_span, warn};

use crate::buffer::BufferReader;
use crate::config::MessagingConfig;
use crate::context::NetworkContext;
use crate::error::MalformedBatch;
use crate::hook::HookList;
use crate::registry::{MessageRegistry, MessageTag};
use crate::wire::{BatchHeader, MessageHeader};

/// A single message pulled out of an inbound batch, not yet decoded into its
/// concrete type.
///
/// Kept as raw bytes plus a tag rather than eagerly decoded, mirroring
/// `aeronet_transport`'s `RecvMessage` holding a `Bytes` payload: decoding
/// (and therefore any decode failure) is deferred to the point the message
/// is actually dispatched to its handler.
pub struct ReceiveQueueEntry {
    /// Numeric identity of the peer this message arrived from.
    pub sender_id: u64,
    /// Local monotonic timestamp, in seconds, at which the containing batch
    /// was parsed.
    pub timestamp: f32,
    /// Wire header this message was framed with.
    pub header: MessageHeader,
    /// Owned copy of the message's payload bytes.
    pub payload: BufferReader<'static>,
}

/// Per-peer FIFO of decoded-but-not-yet-dispatched
/// [`ReceiveQueueEntry`] values.
#[derive(Default)]
pub struct InboundQueues {
    queues: AHashMap<u64, Vec<ReceiveQueueEntry>>,
}

impl InboundQueues {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn drop_peer(&mut self, peer_id: u64) {
        self.queues.remove(&peer_id);
    }

    /// Parses a transport-delivered blob of batched bytes arriving from
    /// `peer_id`, splitting it into individual [`ReceiveQueueEntry`] values
    /// and appending them to that peer's queue.
    ///
    /// Fires [`Hook::on_before_receive_batch`](crate::hook::Hook::on_before_receive_batch)
    /// once the message count is known (immediately after the batch header
    /// is read) and [`Hook::on_after_receive_batch`](crate::hook::Hook::on_after_receive_batch)
    /// once every message has been parsed. Neither fires if the blob never
    /// yields a valid message count, i.e. on a truncated batch header.
    ///
    /// # Errors
    ///
    /// Errors with [`MalformedBatch`] if the blob is structurally invalid: a
    /// truncated header, or a message header whose claimed size runs past
    /// the end of the blob. A structurally valid blob referencing an
    /// unregistered tag is *not* rejected here — that check happens lazily
    /// at dispatch time in [`process_incoming_message_queue`], since the
    /// registry is not threaded through this call.
    pub(crate) fn handle_incoming_data<Owner>(
        &mut self,
        peer_id: u64,
        data: &[u8],
        timestamp: f32,
        config: &MessagingConfig,
        hooks: &mut HookList<Owner>,
    ) -> Result<usize, MalformedBatch> {
        let span = trace_span!("handle_incoming_data", peer_id, len = data.len());
        let _enter = span.enter();

        if data.len() < BatchHeader::ENCODED_LEN {
            return Err(MalformedBatch::TruncatedBatchHeader { len: data.len() });
        }

        let mut reader = BufferReader::borrowed(data);
        let count = reader.read_u16_ne();
        hooks.on_before_receive_batch(peer_id, count, data.len());

        let queue = self.queues.entry(peer_id).or_default();
        let mut parsed = 0usize;
        for _ in 0..count {
            let offset = data.len() - reader.remaining();
            reader
                .try_begin_read(MessageHeader::ENCODED_LEN)
                .map_err(|_| MalformedBatch::TruncatedBatchHeader { len: data.len() })?;
            let message_size = reader.read_u16_ne();
            let message_tag = reader.read_u8();

            reader
                .try_begin_read(usize::from(message_size))
                .map_err(|_| MalformedBatch::TruncatedMessagePayload {
                    offset,
                    claimed: usize::from(message_size),
                    available: reader.remaining(),
                })?;
            let payload = BufferReader::owned_copy(&reader.remaining_slice()[..usize::from(message_size)]);
            reader.advance(usize::from(message_size));

            if let Some(max_depth) = config.max_inbound_queue_depth {
                if queue.len() >= max_depth {
                    warn!(peer_id, max_depth, "inbound queue depth exceeded, dropping message");
                    continue;
                }
            }

            queue.push(ReceiveQueueEntry {
                sender_id: peer_id,
                timestamp,
                header: MessageHeader {
                    message_size,
                    message_tag,
                },
                payload,
            });
            parsed += 1;
        }

        trace!(peer_id, parsed, "batch parsed");
        hooks.on_after_receive_batch(peer_id, count, data.len());
        Ok(parsed)
    }

    /// Drains every peer's inbound queue, decoding and dispatching each
    /// entry through `registry`.
    ///
    /// A handler panic is caught at the single dispatch site via
    /// [`std::panic::catch_unwind`] so that one misbehaving handler can
    /// never tear down the rest of the batch, the caller's call stack, or
    /// any other peer's messages. [`Hook::on_after_receive_message`](crate::hook::Hook::on_after_receive_message)
    /// fires once dispatch has been attempted regardless of its outcome —
    /// success, a decode/dispatch error, or a caught panic — so it always
    /// pairs with the preceding
    /// [`Hook::on_before_receive_message`](crate::hook::Hook::on_before_receive_message)
    /// call.
    pub(crate) fn process_incoming_message_queue<Owner: Clone + 'static>(
        &mut self,
        registry: &MessageRegistry<Owner>,
        owner: &Owner,
        hooks: &mut HookList<Owner>,
    ) {
        for (&peer_id, queue) in &mut self.queues {
            for entry in queue.drain(..) {
                let tag: MessageTag = entry.header.message_tag;

                if !hooks.can_receive(peer_id, tag) {
                    trace!(peer_id, tag, "receive vetoed by hook");
                    continue;
                }

                hooks.on_before_receive_message(peer_id, tag);

                let ctx = NetworkContext {
                    owner: owner.clone(),
                    sender_id: entry.sender_id,
                    timestamp: entry.timestamp,
                    header: entry.header,
                };
                let mut reader = entry.payload;

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    registry.dispatch(tag, &mut reader, &ctx)
                }));

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(peer_id, tag, %err, "failed to dispatch inbound message");
                    }
                    Err(_panic) => {
                        warn!(peer_id, tag, "message handler panicked, recovering");
                    }
                }

                hooks.on_after_receive_message(peer_id, tag);
            }
        }
    }
}
