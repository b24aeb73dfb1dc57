//! Message-type registration: dense tag assignment and dispatch tables.
//!
//! There is no runtime type reflection available, so registration happens
//! through an explicit builder that assigns each message type a dense
//! [`MessageTag`] in the order it is registered, the same way
//! `aeronet_transport`'s `LaneIndex`/`MinSize` types assign dense indices at
//! construction time rather than discovering them from wire data.

use std::any::TypeId;

use ahash::AHashMap;

use crate::buffer::{BufferReader, BufferWriter};
use crate::context::NetworkContext;
use crate::error::{MalformedBatch, RegistryError};

/// Dense, per-registry identifier for a registered message type.
///
/// Assigned in registration order starting at 0; a registry may hold at most
/// 256 message types since a tag must fit in a single wire byte.
pub type MessageTag = u8;

/// Which `Owner` type parameters a message type is allowed to be registered
/// against.
///
/// A message type's [`Message::owner_binding`] is checked against the
/// concrete `Owner` a [`MessageRegistryBuilder<Owner>`] is being built for;
/// this is the compile-time-adjacent analogue of a runtime "can this owner
/// send/receive this message" permission check.
#[derive(Debug, Clone, Copy)]
pub enum OwnerBinding {
    /// May be registered against any `Owner`.
    Unbound,
    /// May only be registered against one of these specific `Owner` types,
    /// identified by [`TypeId`]. `()` is the canonical admissible default
    /// owner used by tests and simple embeddings.
    BoundTo(&'static [TypeId]),
}

impl OwnerBinding {
    fn admits(&self, owner: TypeId) -> bool {
        match self {
            Self::Unbound => true,
            Self::BoundTo(allowed) => allowed.contains(&owner),
        }
    }
}

/// A single application message type that can be framed, sent, and
/// dispatched by a `MessagingCore<Owner>`.
///
/// Implementors provide their own encode/decode logic; the registry never
/// inspects a message's fields, only its encoded bytes and its
/// [`MessageTag`].
pub trait Message<Owner>: Sized + 'static {
    /// Restricts which `Owner` types this message may be registered against.
    /// Defaults to [`OwnerBinding::Unbound`].
    fn owner_binding() -> OwnerBinding {
        OwnerBinding::Unbound
    }

    /// Number of bytes [`Message::encode`] will write for this value.
    ///
    /// Used to reserve exactly enough space in the destination
    /// [`BufferWriter`] before encoding, the way `octs`-style
    /// `FixedEncodeLenHint` impls do in the teacher crate.
    fn encoded_len(&self) -> usize;

    /// Serializes this message's fields into `writer`.
    ///
    /// The caller has already reserved `self.encoded_len()` bytes and
    /// written the [`MessageHeader`](crate::wire::MessageHeader); this only
    /// writes the payload.
    fn encode(&self, writer: &mut BufferWriter);

    /// Deserializes a value of this type from `reader`.
    ///
    /// Returns `None` if the bytes are structurally invalid for this type;
    /// callers treat that as a [`MalformedBatch`] at the batch level.
    fn decode(reader: &mut BufferReader<'_>) -> Option<Self>;

    /// Handles a successfully decoded value of this type.
    fn receive(self, ctx: &NetworkContext<Owner>);
}

type DispatchFn<Owner> =
    Box<dyn Fn(&mut BufferReader<'_>, &NetworkContext<Owner>) -> Option<()> + Send + Sync>;

struct RegistryEntry<Owner> {
    dispatch: DispatchFn<Owner>,
}

/// Builds a [`MessageRegistry<Owner>`] by registering message types in a
/// fixed order, which becomes their [`MessageTag`] assignment.
pub struct MessageRegistryBuilder<Owner> {
    entries: Vec<RegistryEntry<Owner>>,
    tag_of: AHashMap<TypeId, MessageTag>,
}

impl<Owner: 'static> Default for MessageRegistryBuilder<Owner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Owner: 'static> MessageRegistryBuilder<Owner> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            tag_of: AHashMap::default(),
        }
    }

    /// Registers message type `M`, assigning it the next free
    /// [`MessageTag`].
    ///
    /// # Errors
    ///
    /// Errors with [`RegistryError::TooManyMessageTypes`] if 256 message
    /// types are already registered. Errors with
    /// [`RegistryError::OwnerNotBound`] if `M::owner_binding()` excludes this
    /// builder's `Owner` type.
    pub fn register<M: Message<Owner>>(&mut self) -> Result<&mut Self, RegistryError> {
        if self.entries.len() >= usize::from(MessageTag::MAX) + 1 {
            return Err(RegistryError::TooManyMessageTypes);
        }
        if !M::owner_binding().admits(TypeId::of::<Owner>()) {
            return Err(RegistryError::OwnerNotBound);
        }

        let type_id = TypeId::of::<M>();
        let tag = self.entries.len() as MessageTag;
        let dispatch: DispatchFn<Owner> = Box::new(|reader, ctx| {
            let msg = M::decode(reader)?;
            msg.receive(ctx);
            Some(())
        });
        self.entries.push(RegistryEntry { dispatch });
        self.tag_of.insert(type_id, tag);
        Ok(self)
    }

    /// Freezes this builder into an immutable [`MessageRegistry<Owner>`].
    #[must_use]
    pub fn build(self) -> MessageRegistry<Owner> {
        MessageRegistry {
            entries: self.entries,
            tag_of: self.tag_of,
        }
    }
}

/// Frozen table mapping [`MessageTag`]s to dispatch logic, and message types
/// to their assigned tags.
pub struct MessageRegistry<Owner> {
    entries: Vec<RegistryEntry<Owner>>,
    tag_of: AHashMap<TypeId, MessageTag>,
}

impl<Owner: 'static> MessageRegistry<Owner> {
    /// Looks up the [`MessageTag`] assigned to message type `M`.
    ///
    /// Returns `None` if `M` was never registered; callers treat this as a
    /// programmer error rather than a recoverable fault, since the set of
    /// message types sent by an application is fixed at startup.
    #[must_use]
    pub fn tag_of<M: Message<Owner>>(&self) -> Option<MessageTag> {
        self.tag_of.get(&TypeId::of::<M>()).copied()
    }

    /// Number of registered message types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no message types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes and dispatches a single message payload tagged with `tag`.
    ///
    /// # Errors
    ///
    /// Errors with [`MalformedBatch::UnknownMessageTag`] if `tag` has no
    /// registered handler, or propagates a decode failure as
    /// [`MalformedBatch::UnknownMessageTag`] as well, since from the caller's
    /// perspective both are "this payload could not be dispatched".
    pub fn dispatch(
        &self,
        tag: MessageTag,
        reader: &mut BufferReader<'_>,
        ctx: &NetworkContext<Owner>,
    ) -> Result<(), MalformedBatch> {
        let entry = self
            .entries
            .get(usize::from(tag))
            .ok_or(MalformedBatch::UnknownMessageTag { tag })?;
        (entry.dispatch)(reader, ctx).ok_or(MalformedBatch::UnknownMessageTag { tag })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Ping(u32);

    thread_local! {
        static RECEIVED: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
    }

    impl Message<()> for Ping {
        fn encoded_len(&self) -> usize {
            4
        }

        fn encode(&self, writer: &mut BufferWriter) {
            writer.try_begin_write(4).unwrap();
            writer.write_u16_ne(self.0 as u16);
            writer.write_u16_ne((self.0 >> 16) as u16);
        }

        fn decode(reader: &mut BufferReader<'_>) -> Option<Self> {
            reader.try_begin_read(4).ok()?;
            let lo = u32::from(reader.read_u16_ne());
            let hi = u32::from(reader.read_u16_ne());
            Some(Self(lo | (hi << 16)))
        }

        fn receive(self, _ctx: &NetworkContext<()>) {
            RECEIVED.with_borrow_mut(|v| v.push(self.0));
        }
    }

    #[test]
    fn register_and_dispatch_round_trips() {
        let mut builder = MessageRegistryBuilder::<()>::new();
        builder.register::<Ping>().unwrap();
        let registry = builder.build();
        let tag = registry.tag_of::<Ping>().unwrap();
        assert_eq!(0, tag);

        let mut w = BufferWriter::new(4, 4);
        Ping(42).encode(&mut w);
        let bytes = w.into_vec();
        let mut r = BufferReader::borrowed(&bytes);
        let ctx = NetworkContext {
            owner: (),
            sender_id: 1,
            timestamp: 0.0,
            header: crate::wire::MessageHeader {
                message_size: 4,
                message_tag: tag,
            },
        };
        registry.dispatch(tag, &mut r, &ctx).unwrap();
        RECEIVED.with_borrow(|v| assert_eq!(&[42], v.as_slice()));
    }

    #[test]
    fn dispatch_unknown_tag_errors() {
        let registry = MessageRegistryBuilder::<()>::new().build();
        let mut r = BufferReader::borrowed(&[]);
        let ctx = NetworkContext {
            owner: (),
            sender_id: 1,
            timestamp: 0.0,
            header: crate::wire::MessageHeader {
                message_size: 0,
                message_tag: 0,
            },
        };
        assert!(registry.dispatch(0, &mut r, &ctx).is_err());
    }
}
