//! Tunable size ceilings and limits for a `MessagingCore`.

/// Configuration for a `MessagingCore`, mirroring the plain
/// `Default`-implementing config structs `aeronet_transport` uses (see its
/// `TransportConfig`) rather than a builder: every field has a sensible
/// default and embedders only override what they need.
#[derive(Debug, Clone, Copy)]
pub struct MessagingConfig {
    /// Initial capacity, in bytes, allocated for a fresh per-peer send
    /// batch. Grows up to the delivery class's `max_batch_bytes` as
    /// messages are appended.
    pub initial_batch_capacity: usize,
    /// Initial capacity, in bytes, allocated for the scratch buffer used to
    /// serialize a single outbound message before it is appended to a
    /// batch.
    pub scratch_buffer_capacity: usize,
    /// Maximum number of entries allowed to sit on a peer's inbound message
    /// queue between calls to `process_incoming_message_queue`. `None`
    /// means unbounded.
    pub max_inbound_queue_depth: Option<usize>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            initial_batch_capacity: 256,
            scratch_buffer_capacity: 256,
            max_inbound_queue_depth: Some(4096),
        }
    }
}
