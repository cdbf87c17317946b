//! The encoding facade.
//!
//! An [`Encoder`] binds an [`EncodeConfig`] to a dispatch mode deciding
//! what happens at [`Value::Foreign`] leaves: consult the process-wide
//! registry (the default), consult a private registry, call a
//! caller-supplied fallback handler, or fail natively (the escape
//! hatch). Everything else — grammar, escaping, number formatting — is
//! serde_json's job: the facade walks the [`Value`] tree through a
//! [`serde::Serialize`] adapter into a serde_json serializer.

use std::{
    cell::RefCell,
    collections::HashSet,
    fmt::{self, Debug},
    io,
    rc::Rc,
};

use derive_new::new;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize,
};
use thiserror::Error;

use crate::{
    format::TextFormatter,
    registry::Registry,
    value::{Array, Foreign, Key, Object, Value},
};

/// An error raised while encoding a [`Value`] tree.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value has no native JSON representation and no registered
    /// encoder matched its type chain.
    #[error("value of type `{0}` is not JSON serializable")]
    Unserializable(&'static str),

    /// A reference cycle was found while `check_circular` is enabled.
    /// Cycles introduced by a custom encoder's returned structure are
    /// reported the same way.
    #[error("circular reference detected")]
    CircularReference,

    /// NaN or an infinity was found while `allow_nan` is disabled.
    #[error("non-finite float values are not allowed")]
    NonFiniteFloat,

    /// An object key of a user type was found while `skip_foreign_keys`
    /// is disabled.
    #[error("object keys must be strings, found `{0}`")]
    InvalidKey(&'static str),

    /// An error of the native JSON machinery, unwrapped.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Per-call encoding options.
///
/// The defaults follow the native collaborator (serde_json): compact
/// `,`/`:` separators, UTF-8 output, unsorted keys — with cycle checking
/// on and non-finite floats permitted.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeConfig {
    /// Escape every non-ASCII character as `\uXXXX` (surrogate pairs
    /// beyond the basic plane), producing pure-ASCII output.
    pub ensure_ascii: bool,

    /// Write object entries sorted by coerced key instead of insertion
    /// order.
    pub sort_keys: bool,

    /// Indentation unit; `None` writes compact output.
    pub indent: Option<String>,

    /// `(item, key)` separator overrides. `None` uses `,`/`:` for
    /// compact output and `,`/`: ` when indented.
    pub separators: Option<(String, String)>,

    /// Detect reference cycles and fail with
    /// [`EncodeError::CircularReference`]. Disabling this makes a
    /// genuinely cyclic value recurse without bound; shared acyclic
    /// nodes merely encode once per occurrence either way.
    pub check_circular: bool,

    /// Permit NaN and infinities, which then serialize as `null` (the
    /// native serde_json behavior for non-finite floats). When disabled
    /// they fail with [`EncodeError::NonFiniteFloat`].
    pub allow_nan: bool,

    /// Silently drop object entries with foreign keys instead of
    /// failing with [`EncodeError::InvalidKey`].
    pub skip_foreign_keys: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            ensure_ascii: false,
            sort_keys: false,
            indent: None,
            separators: None,
            check_circular: true,
            allow_nan: true,
            skip_foreign_keys: false,
        }
    }
}

impl EncodeConfig {
    /// Whether serde_json's stock compact formatter already produces
    /// this configuration's text.
    pub(crate) fn is_native_format(&self) -> bool {
        !self.ensure_ascii
            && self.indent.is_none()
            && self.separators.is_none()
    }
}

/// A caller-supplied handler invoked for foreign leaves in place of any
/// registry lookup.
pub type FallbackFn =
    dyn Fn(&Foreign) -> Result<Value, EncodeError> + Send + Sync;

enum Dispatch<'a> {
    Global,
    Local(&'a Registry),
    Fallback(&'a FallbackFn),
    Native,
}

impl Debug for Dispatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "Global",
            Self::Local(_) => "Local",
            Self::Fallback(_) => "Fallback",
            Self::Native => "Native",
        })
    }
}

/// Binds an [`EncodeConfig`] to a foreign-value dispatch mode.
///
/// Constructed per call for non-default options; the crate-level
/// [`to_string`](crate::to_string) / [`to_writer`](crate::to_writer)
/// functions reuse one shared default instance instead.
#[derive(Debug)]
pub struct Encoder<'a> {
    config: EncodeConfig,
    dispatch: Dispatch<'a>,
}

impl Default for Encoder<'_> {
    fn default() -> Self { Self::new() }
}

impl<'a> Encoder<'a> {
    /// Default options, dispatching through the process-wide registry.
    #[must_use]
    pub fn new() -> Self { Self::with_config(EncodeConfig::default()) }

    /// Custom options, dispatching through the process-wide registry.
    #[must_use]
    pub fn with_config(config: EncodeConfig) -> Self {
        Self { config, dispatch: Dispatch::Global }
    }

    /// Dispatches foreign leaves through `registry` instead of the
    /// process-wide one.
    #[must_use]
    pub fn registry(mut self, registry: &'a Registry) -> Self {
        self.dispatch = Dispatch::Local(registry);
        self
    }

    /// Replaces registry consultation entirely with `fallback`, the
    /// analog of handing the native machinery a custom "unencodable
    /// value" hook.
    #[must_use]
    pub fn fallback(mut self, fallback: &'a FallbackFn) -> Self {
        self.dispatch = Dispatch::Fallback(fallback);
        self
    }

    /// The escape hatch: no registry, no fallback. Every foreign leaf
    /// fails with [`EncodeError::Unserializable`], yielding pure native
    /// behavior. Formatting options still apply.
    #[must_use]
    pub fn native(mut self) -> Self {
        self.dispatch = Dispatch::Native;
        self
    }

    /// Encodes `value` to a JSON string.
    pub fn encode(&self, value: &Value) -> Result<String, EncodeError> {
        let mut buffer = Vec::with_capacity(128);
        self.encode_to_writer(&mut buffer, value)?;

        Ok(String::from_utf8(buffer)
            .expect("the JSON serializer emits valid UTF-8"))
    }

    /// Encodes `value` as JSON text written incrementally to `writer`,
    /// in the same byte order [`Encoder::encode`] would produce.
    pub fn encode_to_writer<W: io::Write>(
        &self,
        writer: W,
        value: &Value,
    ) -> Result<(), EncodeError> {
        let context = Context::new(&self.config, &self.dispatch);
        let node = Node::new(value, &context);

        let result = if self.config.is_native_format() {
            serde_json::to_writer(writer, &node)
        } else {
            let mut serializer = serde_json::Serializer::with_formatter(
                writer,
                TextFormatter::from_config(&self.config),
            );

            node.serialize(&mut serializer)
        };

        result.map_err(|error| {
            context
                .failure
                .borrow_mut()
                .take()
                .unwrap_or(EncodeError::Json(error))
        })
    }
}

/// Shared state of one encode call.
///
/// Typed failures cannot cross the [`serde::Serializer`] boundary, so
/// they are recorded in `failure` and preferred over the generic
/// serde_json error once the walk unwinds.
#[derive(new)]
struct Context<'a> {
    config: &'a EncodeConfig,
    dispatch: &'a Dispatch<'a>,

    #[new(default)]
    active: RefCell<HashSet<*const ()>>,

    #[new(default)]
    failure: RefCell<Option<EncodeError>>,
}

impl Context<'_> {
    fn fail<E: serde::ser::Error>(&self, error: EncodeError) -> E {
        let message = error.to_string();
        *self.failure.borrow_mut() = Some(error);

        E::custom(message)
    }

    /// Marks `address` as being encoded; the guard unmarks it, so
    /// acyclic sharing passes while genuine cycles trip the check.
    fn enter<E: serde::ser::Error>(
        &self,
        address: *const (),
    ) -> Result<Option<CycleGuard<'_>>, E> {
        if !self.config.check_circular {
            return Ok(None);
        }

        if !self.active.borrow_mut().insert(address) {
            return Err(self.fail(EncodeError::CircularReference));
        }

        Ok(Some(CycleGuard { context: self, address }))
    }
}

struct CycleGuard<'a> {
    context: &'a Context<'a>,
    address: *const (),
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.context.active.borrow_mut().remove(&self.address);
    }
}

/// One [`Value`] node viewed through the encode context; the
/// [`Serialize`] impl is where the tree walk happens.
#[derive(new)]
struct Node<'a> {
    value: &'a Value,
    context: &'a Context<'a>,
}

impl Serialize for Node<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => self.serialize_float(*value, serializer),
            Value::Str(value) => serializer.serialize_str(value),
            Value::Array(array) => self.serialize_array(array, serializer),
            Value::Object(object) => self.serialize_object(object, serializer),
            Value::Foreign(foreign) => {
                self.serialize_foreign(foreign, serializer)
            }
        }
    }
}

impl Node<'_> {
    fn serialize_float<S: serde::Serializer>(
        &self,
        value: f64,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if self.context.config.allow_nan {
            // serde_json's own rendering of non-finite floats
            serializer.serialize_unit()
        } else {
            Err(self.context.fail(EncodeError::NonFiniteFloat))
        }
    }

    fn serialize_array<S: serde::Serializer>(
        &self,
        array: &Array,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let _guard =
            self.context.enter::<S::Error>(Rc::as_ptr(array).cast::<()>())?;
        let items = array.borrow();

        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(&Node::new(item, self.context))?;
        }

        seq.end()
    }

    fn serialize_object<S: serde::Serializer>(
        &self,
        object: &Object,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let _guard =
            self.context.enter::<S::Error>(Rc::as_ptr(object).cast::<()>())?;
        let entries = object.borrow();

        let mut resolved = Vec::with_capacity(entries.len());
        for (key, value) in entries.iter() {
            match key {
                Key::Foreign(_) if self.context.config.skip_foreign_keys => {}
                Key::Foreign(foreign) => {
                    return Err(self
                        .context
                        .fail(EncodeError::InvalidKey(foreign.type_name())));
                }
                _ => {
                    let text = key
                        .as_text()
                        .expect("non-foreign keys coerce to text");

                    resolved.push((text, value));
                }
            }
        }

        if self.context.config.sort_keys {
            resolved.sort_by(|left, right| left.0.cmp(&right.0));
        }

        let mut map = serializer.serialize_map(Some(resolved.len()))?;
        for (key, value) in resolved {
            map.serialize_entry(&key, &Node::new(value, self.context))?;
        }

        map.end()
    }

    fn serialize_foreign<S: serde::Serializer>(
        &self,
        foreign: &Foreign,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let expanded = self
            .expand(foreign)
            .map_err(|error| self.context.fail::<S::Error>(error))?;

        // the foreign node joins the active set before its expansion is
        // walked, so an encoder returning a structure that reaches back
        // to an ancestor trips the circular check
        let _guard = self.context.enter::<S::Error>(foreign.address())?;

        Node::new(&expanded, self.context).serialize(serializer)
    }

    fn expand(&self, foreign: &Foreign) -> Result<Value, EncodeError> {
        match self.context.dispatch {
            Dispatch::Native => {
                Err(EncodeError::Unserializable(foreign.type_name()))
            }
            Dispatch::Fallback(fallback) => fallback(foreign),
            Dispatch::Local(registry) => Self::expand_with(registry, foreign),
            Dispatch::Global => {
                // recursive reads stay safe against a queued writer
                Self::expand_with(&Registry::global().read_recursive(), foreign)
            }
        }
    }

    fn expand_with(
        registry: &Registry,
        foreign: &Foreign,
    ) -> Result<Value, EncodeError> {
        registry
            .resolve(foreign)
            .ok_or(EncodeError::Unserializable(foreign.type_name()))?
            .encode(foreign)
    }
}

#[cfg(test)]
mod test;
