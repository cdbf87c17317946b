//! The type-indexed registry of encoder functions.
//!
//! A [`Registry`] maps a [`TypeId`] to an erased encoder function that
//! turns a value of that type into a natively encodable [`Value`].
//! Lookup walks the value's declared type chain from most specific to
//! least, so the most specific registered ancestor always wins,
//! regardless of registration order.
//!
//! One process-wide registry exists behind [`Registry::global`]; code
//! that needs isolation (tests, embedded use) constructs a private
//! `Registry` and hands it to an [`Encoder`](crate::Encoder) explicitly.

use std::{
    any::{self, Any, TypeId},
    collections::HashMap,
    fmt::{self, Debug},
};

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::{
    encode::EncodeError,
    value::{Encodable, Foreign, Value},
};

/// An erased encoder function as stored in the registry.
///
/// Receives the value already upcast to the registered type and returns
/// a natively encodable [`Value`] (which may itself contain foreign
/// leaves, expanded recursively).
pub type EncodeFn =
    Box<dyn Fn(&dyn Any) -> Result<Value, EncodeError> + Send + Sync>;

struct RegisteredEncoder {
    encode_fn: EncodeFn,
    type_name: &'static str,
}

/// A mapping from registered types to their encoder functions.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<TypeId, RegisteredEncoder>,
}

lazy_static! {
    static ref GLOBAL: RwLock<Registry> = RwLock::new(Registry::new());
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The process-wide default registry.
    ///
    /// Registration takes the write lock and is expected to happen at
    /// startup; encoding takes the read lock for each foreign leaf. The
    /// lock provides no further synchronization guarantees: a writer
    /// racing against in-flight encodes simply waits its turn.
    pub fn global() -> &'static RwLock<Self> { &GLOBAL }

    /// Associates `encoder` with `T`.
    ///
    /// Re-registering a type silently replaces the previous entry; every
    /// later encode of a `T`, anywhere in the process when done on
    /// [`Registry::global`], observes the new encoder. There is no
    /// scoping or undo.
    ///
    /// The encoder function is not validated here; if it misbehaves,
    /// that surfaces only when a value of its type is encoded.
    pub fn register<T, F>(&mut self, encoder: F)
    where
        T: Encodable,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.insert::<T>(Box::new(move |value| {
            let value = value
                .downcast_ref::<T>()
                .expect("registry entries are keyed by type id");

            Ok(encoder(value))
        }));
    }

    /// Registers `T` through its existing [`serde::Serialize`]
    /// implementation.
    ///
    /// A conversion failure surfaces lazily, at encode time, as the
    /// native error it is.
    pub fn register_serialize<T>(&mut self)
    where
        T: Encodable + serde::Serialize,
    {
        fn encode_fn<T: Encodable + serde::Serialize>(
            value: &dyn Any,
        ) -> Result<Value, EncodeError> {
            let value = value
                .downcast_ref::<T>()
                .expect("registry entries are keyed by type id");

            Ok(serde_json::to_value(value)?.into())
        }

        self.insert::<T>(Box::new(encode_fn::<T>));
    }

    /// Finds the encoder for the most specific registered type in
    /// `value`'s type chain.
    ///
    /// `None` is a normal outcome, not an error; the caller falls
    /// through to the unserializable-type failure of the native
    /// machinery.
    #[must_use]
    pub fn resolve(&self, value: &Foreign) -> Option<ResolvedEncoder<'_>> {
        let resolved = value.type_chain().into_iter().find_map(|type_id| {
            self.entries
                .get(&type_id)
                .map(|entry| ResolvedEncoder { type_id, entry })
        });

        if resolved.is_none() {
            log::trace!(
                "no JSON encoder registered for `{}`",
                value.type_name()
            );
        }

        resolved
    }

    fn insert<T: Encodable>(&mut self, encode_fn: EncodeFn) {
        let type_name = any::type_name::<T>();
        let entry = RegisteredEncoder { encode_fn, type_name };

        if self.entries.insert(TypeId::of::<T>(), entry).is_some() {
            log::debug!("replaced JSON encoder for `{type_name}`");
        } else {
            log::trace!("registered JSON encoder for `{type_name}`");
        }
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "types",
                &self
                    .entries
                    .values()
                    .map(|entry| entry.type_name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An encoder selected by [`Registry::resolve`], bound to the type id it
/// matched so the value can be upcast before invocation.
#[derive(Clone, Copy)]
pub struct ResolvedEncoder<'a> {
    type_id: TypeId,
    entry: &'a RegisteredEncoder,
}

impl ResolvedEncoder<'_> {
    /// Invokes the encoder on `value`, upcast to the matched type.
    ///
    /// Fails with [`EncodeError::Unserializable`] if the value cannot
    /// produce a view of the matched type, which only happens when a
    /// [`Encodable::type_chain`] lists an id its
    /// [`Encodable::as_type`] does not honor.
    pub fn encode(&self, value: &Foreign) -> Result<Value, EncodeError> {
        let view = value
            .as_type(self.type_id)
            .ok_or(EncodeError::Unserializable(value.type_name()))?;

        (self.entry.encode_fn)(view)
    }
}

impl Debug for ResolvedEncoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedEncoder")
            .field("type_name", &self.entry.type_name)
            .finish()
    }
}
