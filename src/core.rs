//! `MessagingCore`: the single object embedding applications drive.

use ahash::AHashMap;
use tracing::{trace, trace_span};

use crate::config::MessagingConfig;
use crate::error::{MalformedBatch, RegistryError, SendFault};
use crate::hook::{Hook, HookList};
use crate::inbound::InboundQueues;
use crate::outbound::{self, PeerSendQueue};
use crate::peer::PeerRegistry;
use crate::registry::{Message, MessageRegistry, MessageRegistryBuilder};
use crate::transport::Transport;
use crate::wire::DeliveryClass;

/// Ties together message registration, peer lifecycle, inbound dispatch,
/// and outbound batching into the one object an embedding application
/// drives each tick.
///
/// `Owner` is a cheap, cloneable handle the application defines for its own
/// purposes (commonly `()`, or a lightweight id/reference type); it is
/// cloned once per dispatched message into that message's
/// [`NetworkContext`](crate::context::NetworkContext). `MessagingCore`
/// itself holds no application state beyond that handle.
///
/// Not thread-safe and not reentrant: every method that mutates state takes
/// `&mut self`, so the compiler rejects any attempt to call back into a
/// `MessagingCore` from within a message handler while a
/// `process_incoming_message_queue` call is already running.
pub struct MessagingCore<Owner: Clone + 'static> {
    owner: Owner,
    config: MessagingConfig,
    registry: MessageRegistry<Owner>,
    peers: PeerRegistry,
    send_queues: AHashMap<u64, PeerSendQueue>,
    inbound: InboundQueues,
    hooks: HookList<Owner>,
}

impl<Owner: Clone + 'static> MessagingCore<Owner> {
    /// Creates a new core from a frozen registry and configuration.
    #[must_use]
    pub fn new(owner: Owner, registry: MessageRegistry<Owner>, config: MessagingConfig) -> Self {
        Self {
            owner,
            config,
            registry,
            peers: PeerRegistry::new(),
            send_queues: AHashMap::default(),
            inbound: InboundQueues::new(),
            hooks: HookList::new(),
        }
    }

    /// Registers a hook to observe and potentially veto traffic.
    pub fn add_hook(&mut self, hook: Box<dyn Hook<Owner>>) {
        self.hooks.push(hook);
    }

    /// Marks `peer_id` as connected, allowing messages to be sent to and
    /// received from it.
    pub fn client_connected(&mut self, peer_id: u64) {
        if self.peers.client_connected(peer_id) {
            self.send_queues.insert(peer_id, PeerSendQueue::new(peer_id));
            trace!(peer_id, "peer connected");
        }
    }

    /// Marks `peer_id` as disconnected, dropping any unflushed send batches
    /// and undispatched inbound messages still associated with it.
    pub fn client_disconnected(&mut self, peer_id: u64) {
        if self.peers.client_disconnected(peer_id) {
            self.send_queues.remove(&peer_id);
            self.inbound.drop_peer(peer_id);
            trace!(peer_id, "peer disconnected");
        }
    }

    /// Returns `true` if `peer_id` is currently connected.
    #[must_use]
    pub fn is_connected(&self, peer_id: u64) -> bool {
        self.peers.is_connected(peer_id)
    }

    /// Iterates over every currently connected peer.
    pub fn connected_peers(&self) -> impl Iterator<Item = u64> + '_ {
        self.peers.iter()
    }

    /// Queues `msg` for delivery to `peer_id` under `delivery_class`.
    ///
    /// The message is appended to that peer's in-progress batch for this
    /// delivery class; nothing reaches the transport until
    /// [`MessagingCore::process_send_queues`] is called.
    ///
    /// # Errors
    ///
    /// Errors with [`SendFault::PeerNotConnected`] if `peer_id` is not
    /// currently connected, with [`SendFault::VetoedByHook`] if a
    /// registered hook's `can_send` predicate rejects the message, or with
    /// [`SendFault::MessageTooLarge`] if the message cannot fit in any batch
    /// for this delivery class.
    pub fn send_message<M: Message<Owner>>(
        &mut self,
        peer_id: u64,
        msg: &M,
        delivery_class: DeliveryClass,
    ) -> Result<(), SendFault> {
        if !self.peers.is_connected(peer_id) {
            return Err(SendFault::PeerNotConnected { peer_id });
        }
        let tag = self
            .registry
            .tag_of::<M>()
            .expect("message type M was not registered against this MessagingCore's Owner");

        if !self.hooks.can_send(peer_id, tag) {
            return Err(SendFault::VetoedByHook);
        }

        self.hooks.on_before_send_message(peer_id, tag);
        let queue = self
            .send_queues
            .get_mut(&peer_id)
            .expect("connected peers always have a send queue");
        let result = queue.send_message(msg, tag, delivery_class, &self.config);
        self.hooks.on_after_send_message(peer_id, tag);
        result
    }

    /// Flushes every peer's ready batches to `transport`.
    pub fn process_send_queues(&mut self, transport: &mut impl Transport) {
        let span = trace_span!("process_send_queues");
        let _enter = span.enter();
        outbound::flush_all(&mut self.send_queues, transport, &mut self.hooks);
    }

    /// Parses a blob of batched bytes received from `peer_id`, splitting it
    /// into individual messages queued for later dispatch.
    ///
    /// # Errors
    ///
    /// Errors with [`MalformedBatch`] if `data` is not a structurally valid
    /// batch. A malformed blob from one peer never affects any other peer's
    /// queue.
    pub fn handle_incoming_data(
        &mut self,
        peer_id: u64,
        data: &[u8],
        timestamp: f32,
    ) -> Result<usize, MalformedBatch> {
        self.inbound
            .handle_incoming_data(peer_id, data, timestamp, &self.config, &mut self.hooks)
    }

    /// Drains every peer's inbound message queue, decoding and dispatching
    /// each entry. A handler panic is caught internally rather than
    /// propagating; [`Hook::on_after_receive_message`] still fires for the
    /// panicking message, same as for any other outcome.
    pub fn process_incoming_message_queue(&mut self) {
        let span = trace_span!("process_incoming_message_queue");
        let _enter = span.enter();
        self.inbound
            .process_incoming_message_queue(&self.registry, &self.owner, &mut self.hooks);
    }
}

/// Convenience re-export so embedders only need one builder type in scope
/// when constructing a [`MessagingCore`].
pub type Builder<Owner> = MessageRegistryBuilder<Owner>;

/// Convenience constructor bundling registry building and core construction,
/// for embedders that have no use for holding the builder or registry
/// separately.
///
/// # Errors
///
/// Propagates any [`RegistryError`] raised while `build_registry` registers
/// message types.
pub fn build<Owner: Clone + 'static>(
    owner: Owner,
    config: MessagingConfig,
    build_registry: impl FnOnce(&mut MessageRegistryBuilder<Owner>) -> Result<(), RegistryError>,
) -> Result<MessagingCore<Owner>, RegistryError> {
    let mut builder = MessageRegistryBuilder::new();
    build_registry(&mut builder)?;
    Ok(MessagingCore::new(owner, builder.build(), config))
}
