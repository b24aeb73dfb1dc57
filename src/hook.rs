//! Observer hooks and veto predicates threaded through send/receive.
//!
//! Hooks are plain trait objects invoked synchronously and in registration
//! order, the same shape as the event-collecting pattern in
//! `aeronet_channel::server::ChannelServer::poll_open` (which appends
//! `ServerEvent`s as it walks client state) but pushed forward instead of
//! collected, since hooks here may also veto the operation in progress.
//!
//! Eight callbacks bracket the six points traffic crosses a
//! `MessagingCore`: before and after a batch is received, before and after
//! a single message within it is dispatched, before and after a message is
//! queued for sending, and before and after a batch is flushed to the
//! transport. Two predicates, `can_send` and `can_receive`, may veto traffic
//! before any of those callbacks fire for it.

use crate::registry::MessageTag;

/// Observes and optionally vetoes traffic flowing through a
/// `MessagingCore<Owner>`.
///
/// Every callback has a no-op default so an embedder only overrides the
/// handful it cares about. The `after_*` callbacks fire unconditionally
/// once their corresponding operation has been attempted, whether or not it
/// succeeded — including when a message handler panics — so a hook can
/// reliably pair every `before_*` call with an `after_*` call. Predicates
/// are evaluated first; a veto skips the operation entirely; neither its
/// `before_*` nor its `after_*` callback fires for it.
pub trait Hook<Owner> {
    /// About to parse a batch of `message_count` messages totalling
    /// `total_len` bytes, received from `peer_id`.
    fn on_before_receive_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        let _ = (peer_id, message_count, total_len);
    }

    /// Finished parsing a batch of `message_count` messages totalling
    /// `total_len` bytes, received from `peer_id`.
    fn on_after_receive_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        let _ = (peer_id, message_count, total_len);
    }

    /// About to decode and dispatch a message tagged `tag` from `peer_id`.
    fn on_before_receive_message(&mut self, peer_id: u64, tag: MessageTag) {
        let _ = (peer_id, tag);
    }

    /// Finished attempting to decode and dispatch a message tagged `tag`
    /// from `peer_id`, whether or not dispatch succeeded.
    fn on_after_receive_message(&mut self, peer_id: u64, tag: MessageTag) {
        let _ = (peer_id, tag);
    }

    /// About to encode and queue a message tagged `tag` for `peer_id`.
    fn on_before_send_message(&mut self, peer_id: u64, tag: MessageTag) {
        let _ = (peer_id, tag);
    }

    /// Finished attempting to queue a message tagged `tag` for `peer_id`,
    /// whether or not it was accepted into a batch.
    fn on_after_send_message(&mut self, peer_id: u64, tag: MessageTag) {
        let _ = (peer_id, tag);
    }

    /// About to flush a batch of `message_count` messages totalling
    /// `total_len` bytes to `peer_id`.
    fn on_before_send_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        let _ = (peer_id, message_count, total_len);
    }

    /// Finished flushing a batch of `message_count` messages totalling
    /// `total_len` bytes to `peer_id`, whether or not the transport
    /// accepted it.
    fn on_after_send_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        let _ = (peer_id, message_count, total_len);
    }

    /// Whether a message of this type is currently allowed to be sent to
    /// `peer_id`.
    ///
    /// Evaluated before the message is queued; the first hook to return
    /// `false` vetoes the send and no later hook's predicate runs.
    fn can_send(&self, peer_id: u64, tag: MessageTag) -> bool {
        let _ = (peer_id, tag);
        true
    }

    /// Whether a message of this type is currently allowed to be received
    /// from `peer_id`.
    ///
    /// Evaluated before the message is decoded; the first hook to return
    /// `false` vetoes the receive and no later hook's predicate runs.
    fn can_receive(&self, peer_id: u64, tag: MessageTag) -> bool {
        let _ = (peer_id, tag);
        true
    }
}

/// An ordered list of [`Hook`]s, invoked in registration order.
pub struct HookList<Owner> {
    hooks: Vec<Box<dyn Hook<Owner>>>,
}

impl<Owner> Default for HookList<Owner> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<Owner> HookList<Owner> {
    /// Creates an empty hook list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook to the end of the list.
    pub fn push(&mut self, hook: Box<dyn Hook<Owner>>) {
        self.hooks.push(hook);
    }

    pub(crate) fn on_before_receive_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        for hook in &mut self.hooks {
            hook.on_before_receive_batch(peer_id, message_count, total_len);
        }
    }

    pub(crate) fn on_after_receive_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        for hook in &mut self.hooks {
            hook.on_after_receive_batch(peer_id, message_count, total_len);
        }
    }

    pub(crate) fn on_before_receive_message(&mut self, peer_id: u64, tag: MessageTag) {
        for hook in &mut self.hooks {
            hook.on_before_receive_message(peer_id, tag);
        }
    }

    pub(crate) fn on_after_receive_message(&mut self, peer_id: u64, tag: MessageTag) {
        for hook in &mut self.hooks {
            hook.on_after_receive_message(peer_id, tag);
        }
    }

    pub(crate) fn on_before_send_message(&mut self, peer_id: u64, tag: MessageTag) {
        for hook in &mut self.hooks {
            hook.on_before_send_message(peer_id, tag);
        }
    }

    pub(crate) fn on_after_send_message(&mut self, peer_id: u64, tag: MessageTag) {
        for hook in &mut self.hooks {
            hook.on_after_send_message(peer_id, tag);
        }
    }

    pub(crate) fn on_before_send_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        for hook in &mut self.hooks {
            hook.on_before_send_batch(peer_id, message_count, total_len);
        }
    }

    pub(crate) fn on_after_send_batch(&mut self, peer_id: u64, message_count: u16, total_len: usize) {
        for hook in &mut self.hooks {
            hook.on_after_send_batch(peer_id, message_count, total_len);
        }
    }

    /// Runs every hook's `can_send` predicate in order, short-circuiting and
    /// returning `false` on the first veto.
    pub(crate) fn can_send(&self, peer_id: u64, tag: MessageTag) -> bool {
        self.hooks.iter().all(|hook| hook.can_send(peer_id, tag))
    }

    /// Runs every hook's `can_receive` predicate in order, short-circuiting
    /// and returning `false` on the first veto.
    pub(crate) fn can_receive(&self, peer_id: u64, tag: MessageTag) -> bool {
        self.hooks
            .iter()
            .all(|hook| hook.can_receive(peer_id, tag))
    }
}
