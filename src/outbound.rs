//! Per-peer outbound batching: appends queued messages into size-bounded
//! batches and flushes them to the transport.
//!
//! Grounded on `aeronet_transport::send::TransportSend`'s `push`/`flush`
//! split: messages are appended cheaply as they're sent, and the actual
//! transport hand-off only happens on an explicit flush call, letting many
//! `send_message` calls in a row amortize into as few batches as possible —
//! the same tail-append policy `TransportSend::push` uses when packing
//! fragments into the lowest-indexed open packet.
//!
//! Per delivery class, a peer's pending batches are kept as a single ordered
//! `Vec<SendBatch>` whose last element is the only append target: rotation
//! pushes a new tail, it never reorders or re-homes an older batch. Draining
//! walks that vector front to back, so the order batches are handed to the
//! transport is exactly the order messages were submitted in.

use ahash::AHashMap;
use bytes::Bytes;
use tracing::trace;

use crate::buffer::BufferWriter;
use crate::config::MessagingConfig;
use crate::error::SendFault;
use crate::hook::HookList;
use crate::registry::{Message, MessageTag};
use crate::transport::Transport;
use crate::wire::{BatchHeader, DeliveryClass, MessageHeader};

/// A batch under construction: a [`BatchHeader`] placeholder followed by
/// zero or more framed messages.
struct SendBatch {
    writer: BufferWriter,
    count: u16,
}

impl SendBatch {
    fn new(config: &MessagingConfig, delivery_class: DeliveryClass) -> Self {
        let ceiling = delivery_class.max_batch_bytes();
        let mut writer = BufferWriter::new(config.initial_batch_capacity.min(ceiling), ceiling);
        writer
            .try_begin_write(BatchHeader::ENCODED_LEN)
            .expect("every delivery class's ceiling comfortably exceeds a bare batch header");
        writer.write_u16_ne(0);
        Self { writer, count: 0 }
    }

    /// Attempts to append a pre-framed message. Returns `false` if the batch
    /// has no room left and the caller must open a new tail batch instead.
    fn try_append(&mut self, tag: MessageTag, payload: &[u8]) -> bool {
        let framed_len = MessageHeader::ENCODED_LEN + payload.len();
        if self.writer.position() + framed_len > self.writer.ceiling() {
            return false;
        }
        self.writer
            .try_begin_write(MessageHeader::ENCODED_LEN)
            .expect("room already checked above");
        self.writer.write_u16_ne(payload.len() as u16);
        self.writer.write_u8(tag);
        self.writer
            .try_begin_write(payload.len())
            .expect("room already checked above");
        self.writer.write_bytes(payload);
        self.count += 1;
        true
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn finish(mut self) -> (u16, Bytes) {
        let count = self.count;
        self.writer.patch_at(0, &count.to_ne_bytes());
        (count, Bytes::from(self.writer.into_vec()))
    }
}

/// The outbound side of a single peer: messages appended via
/// [`PeerSendQueue::send_message`] accumulate here as an ordered run of
/// batches per [`DeliveryClass`], until [`PeerSendQueue::drain_ready`] hands
/// finished batches off for flushing, earliest first.
pub struct PeerSendQueue {
    peer_id: u64,
    batches: AHashMap<DeliveryClass, Vec<SendBatch>>,
}

impl PeerSendQueue {
    pub(crate) fn new(peer_id: u64) -> Self {
        Self {
            peer_id,
            batches: AHashMap::default(),
        }
    }

    /// Encodes `msg` and appends it to this peer's tail batch for
    /// `delivery_class`, opening a fresh tail if the current one has no room
    /// left.
    ///
    /// # Errors
    ///
    /// Errors with [`SendFault::MessageTooLarge`] if `msg`, once framed with
    /// a [`MessageHeader`], would not fit in an otherwise-empty batch for
    /// this delivery class. This is the corrected ceiling check: the scratch
    /// buffer used to serialize `msg` is itself capped at
    /// `delivery_class.max_batch_bytes() - BatchHeader::ENCODED_LEN -
    /// MessageHeader::ENCODED_LEN`, so an oversized message is rejected up
    /// front instead of silently overflowing a later batch.
    pub(crate) fn send_message<Owner, M: Message<Owner>>(
        &mut self,
        msg: &M,
        tag: MessageTag,
        delivery_class: DeliveryClass,
        config: &MessagingConfig,
    ) -> Result<(), SendFault> {
        let scratch_ceiling = delivery_class
            .max_batch_bytes()
            .saturating_sub(BatchHeader::ENCODED_LEN)
            .saturating_sub(MessageHeader::ENCODED_LEN);

        let mut scratch = BufferWriter::new(
            config.scratch_buffer_capacity.min(scratch_ceiling),
            scratch_ceiling,
        );
        let payload_len = msg.encoded_len();
        scratch
            .try_begin_write(payload_len)
            .map_err(|_| SendFault::MessageTooLarge {
                framed_len: MessageHeader::ENCODED_LEN + payload_len,
                limit: delivery_class.max_batch_bytes(),
            })?;
        msg.encode(&mut scratch);
        let payload = scratch.into_vec();

        let run = self.batches.entry(delivery_class).or_default();

        let fits_tail = run
            .last_mut()
            .is_some_and(|tail| tail.try_append(tag, &payload));

        if !fits_tail {
            trace!(peer_id = self.peer_id, ?delivery_class, "opening new tail batch");
            run.push(SendBatch::new(config, delivery_class));
            let tail = run.last_mut().expect("just pushed");
            if !tail.try_append(tag, &payload) {
                return Err(SendFault::MessageTooLarge {
                    framed_len: MessageHeader::ENCODED_LEN + payload_len,
                    limit: delivery_class.max_batch_bytes(),
                });
            }
        }

        Ok(())
    }

    /// Drains every delivery class's run of batches, handing each finished
    /// batch to `sink` in submission order. Runs for different delivery
    /// classes may interleave in an unspecified order relative to each
    /// other, but within a single class the order batches are handed to
    /// `sink` always matches the order their messages were sent in.
    pub(crate) fn drain_ready(&mut self, mut sink: impl FnMut(DeliveryClass, u16, Bytes)) {
        for (class, run) in self.batches.drain() {
            for batch in run {
                if batch.is_empty() {
                    continue;
                }
                let (count, bytes) = batch.finish();
                sink(class, count, bytes);
            }
        }
    }
}

/// Flushes every peer's ready batches to `transport`, in peer-iteration
/// order (unspecified, since peers are stored in a hash map).
pub(crate) fn flush_all<Owner>(
    queues: &mut AHashMap<u64, PeerSendQueue>,
    transport: &mut impl Transport,
    hooks: &mut HookList<Owner>,
) {
    for (&peer_id, queue) in queues.iter_mut() {
        queue.drain_ready(|delivery_class, count, bytes| {
            let total_len = bytes.len();
            hooks.on_before_send_batch(peer_id, count, total_len);
            match transport.send_batch(peer_id, delivery_class, bytes) {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(peer_id, %err, "transport rejected outbound batch");
                }
            }
            hooks.on_after_send_batch(peer_id, count, total_len);
        });
    }
}
