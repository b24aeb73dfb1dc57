//! Message-type registry, hook pipeline, and batching transport core for a
//! game-networking runtime.
//!
//! A [`MessagingCore`](core::MessagingCore) owns nothing about sockets or
//! wire transport beyond the narrow [`Transport`](transport::Transport)
//! trait it is driven through. Applications register their message types
//! up front against a [`MessageRegistryBuilder`](registry::MessageRegistryBuilder),
//! then each tick:
//!
//! 1. feed newly arrived bytes per peer through
//!    [`MessagingCore::handle_incoming_data`](core::MessagingCore::handle_incoming_data),
//! 2. dispatch queued inbound messages to their handlers via
//!    [`MessagingCore::process_incoming_message_queue`](core::MessagingCore::process_incoming_message_queue),
//! 3. queue outbound messages via
//!    [`MessagingCore::send_message`](core::MessagingCore::send_message),
//! 4. flush queued batches to the transport via
//!    [`MessagingCore::process_send_queues`](core::MessagingCore::process_send_queues).
//!
//! None of this is thread-safe or reentrant by design: every mutating call
//! takes `&mut self`, so the compiler — not a runtime guard — rejects
//! reentrant use.

pub mod buffer;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod hook;
pub mod inbound;
pub mod outbound;
pub mod peer;
pub mod registry;
pub mod transport;
pub mod wire;

pub use config::MessagingConfig;
pub use context::NetworkContext;
pub use core::MessagingCore;
pub use error::{MalformedBatch, RegistryError, SendFault, TransportSendError};
pub use hook::{Hook, HookList};
pub use registry::{Message, MessageRegistry, MessageRegistryBuilder, MessageTag, OwnerBinding};
pub use transport::Transport;
pub use wire::{BatchHeader, DeliveryClass, MessageHeader};
