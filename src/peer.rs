//! Tracks which peers are currently connected.
//!
//! Grounded on `aeronet_channel::server::ChannelServer`'s client state
//! machine: connecting a peer is an idempotent insert, and disconnecting one
//! immediately removes it so any queued-but-unflushed state tied to that
//! peer is dropped rather than lingering.

use ahash::AHashSet;
use tracing::trace;

/// The set of peers a `MessagingCore` currently considers connected.
///
/// This is deliberately just a set, not a richer state machine: unlike
/// `ChannelServer`, the messaging core does not model a `Connecting` phase
/// of its own — by the time `client_connected` is called, the transport has
/// already established the connection.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    connected: AHashSet<u64>,
}

impl PeerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `peer_id` as connected.
    ///
    /// Idempotent: connecting an already-connected peer is a no-op and
    /// returns `false`.
    pub fn client_connected(&mut self, peer_id: u64) -> bool {
        let inserted = self.connected.insert(peer_id);
        if inserted {
            trace!(peer_id, "peer connected");
        }
        inserted
    }

    /// Marks `peer_id` as disconnected.
    ///
    /// Idempotent: disconnecting a peer that was never connected, or was
    /// already disconnected, is a no-op and returns `false`. Any send or
    /// receive queues tied to this peer must be drained by the caller before
    /// or after this call; the registry itself holds no per-peer payload
    /// state.
    pub fn client_disconnected(&mut self, peer_id: u64) -> bool {
        let removed = self.connected.remove(&peer_id);
        if removed {
            trace!(peer_id, "peer disconnected");
        }
        removed
    }

    /// Returns `true` if `peer_id` is currently connected.
    #[must_use]
    pub fn is_connected(&self, peer_id: u64) -> bool {
        self.connected.contains(&peer_id)
    }

    /// Iterates over every currently connected peer, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.connected.iter().copied()
    }

    /// Number of currently connected peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connected.len()
    }

    /// Returns `true` if no peers are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }
}
