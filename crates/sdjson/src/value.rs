//! The dynamic document model accepted by the encoding facade.
//!
//! [`Value`] is a JSON-like tree extended with [`Value::Foreign`] leaves:
//! type-erased values of user types that the native encoder cannot
//! represent and that are expanded through the
//! [`Registry`](crate::Registry) during encoding. Arrays and objects are
//! shared, mutable containers so that a tree can alias (and even cycle
//! through) its own nodes, which is what circular-reference checking
//! inspects.

use std::{
    any::{self, Any, TypeId},
    borrow::Cow,
    cell::RefCell,
    fmt::{self, Debug},
    rc::Rc,
};

/// The shared storage behind a [`Value::Array`].
pub type Array = Rc<RefCell<Vec<Value>>>;

/// The shared storage behind a [`Value::Object`]. Entries keep insertion
/// order.
pub type Object = Rc<RefCell<Vec<(Key, Value)>>>;

/// A dynamically typed value to be encoded as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The JSON `null`.
    Null,

    /// A boolean.
    Bool(bool),

    /// An integer.
    Int(i64),

    /// A floating point number. Non-finite values are subject to the
    /// `allow_nan` encoding option.
    Float(f64),

    /// A string.
    Str(String),

    /// An ordered sequence, shared and mutable.
    Array(Array),

    /// An insertion-ordered mapping, shared and mutable.
    Object(Object),

    /// A value of a user type with no native JSON representation; the
    /// encoding facade expands it through a registered encoder function.
    Foreign(Foreign),
}

impl Value {
    /// Creates an array value sharing ownership of `items`.
    #[must_use]
    pub fn array(items: Vec<Self>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates an object value from insertion-ordered `entries`.
    #[must_use]
    pub fn object(entries: Vec<(Key, Self)>) -> Self {
        Self::Object(Rc::new(RefCell::new(entries)))
    }

    /// Erases `value` into a [`Value::Foreign`] leaf.
    #[must_use]
    pub fn foreign<T: Encodable>(value: T) -> Self {
        Self::Foreign(Foreign::new(value))
    }

    /// Returns the shared array storage if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        if let Self::Array(array) = self {
            Some(array)
        } else {
            None
        }
    }

    /// Returns the shared object storage if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        if let Self::Object(object) = self {
            Some(object)
        } else {
            None
        }
    }

    /// Returns the foreign leaf if this is one.
    #[must_use]
    pub fn as_foreign(&self) -> Option<&Foreign> {
        if let Self::Foreign(foreign) = self {
            Some(foreign)
        } else {
            None
        }
    }
}

/// An object key.
///
/// String and integer keys coerce to JSON text keys; a [`Key::Foreign`]
/// key has no JSON representation and is either skipped or rejected
/// depending on the `skip_foreign_keys` encoding option.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// A string key, written as-is.
    Str(String),

    /// An integer key, coerced to its decimal representation.
    Int(i64),

    /// A key of a user type, not representable in JSON text.
    Foreign(Foreign),
}

impl Key {
    /// The JSON text this key coerces to; `None` for foreign keys.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Str(text) => Some(Cow::Borrowed(text)),
            Self::Int(number) => Some(Cow::Owned(number.to_string())),
            Self::Foreign(_) => None,
        }
    }
}

/// A user type storable in [`Value::Foreign`] leaves.
///
/// A bare `impl Encodable for MyType {}` suffices for exact-type registry
/// matches. A type that should also match an *ancestor's* registered
/// encoder overrides both methods, typically delegating to an embedded
/// base value:
///
/// ``` rust
/// use std::any::{Any, TypeId};
///
/// use sdjson::Encodable;
///
/// struct Celsius(f64);
/// impl Encodable for Celsius {}
///
/// struct Oven {
///     temperature: Celsius,
/// }
///
/// impl Encodable for Oven {
///     fn type_chain() -> Vec<TypeId> {
///         vec![TypeId::of::<Oven>(), TypeId::of::<Celsius>()]
///     }
///
///     fn as_type(&self, type_id: TypeId) -> Option<&dyn Any> {
///         if type_id == TypeId::of::<Oven>() {
///             Some(self)
///         } else {
///             self.temperature.as_type(type_id)
///         }
///     }
/// }
/// ```
pub trait Encodable: Any {
    /// The type ids consulted during registry lookup, most specific
    /// first. Defaults to the type's own id.
    #[must_use]
    fn type_chain() -> Vec<TypeId>
    where
        Self: Sized,
    {
        vec![TypeId::of::<Self>()]
    }

    /// Returns a view of `self` as the type identified by `type_id`.
    ///
    /// Must return `Some` for every id in [`Encodable::type_chain`]; the
    /// default covers the type's own id only.
    fn as_type(&self, type_id: TypeId) -> Option<&dyn Any>
    where
        Self: Sized,
    {
        (type_id == TypeId::of::<Self>()).then_some(self as &dyn Any)
    }
}

/// A type-erased, shared value of a user type.
///
/// Captures the metadata the registry needs (type chain, upcasts, type
/// name) as monomorphized function pointers at construction.
#[derive(Clone)]
pub struct Foreign {
    value: Rc<dyn Any>,
    upcast_fn: fn(&dyn Any, TypeId) -> Option<&dyn Any>,
    chain_fn: fn() -> Vec<TypeId>,
    type_name: &'static str,
}

impl Foreign {
    pub(crate) fn new<T: Encodable>(value: T) -> Self {
        fn upcast<T: Encodable>(
            value: &dyn Any,
            type_id: TypeId,
        ) -> Option<&dyn Any> {
            value.downcast_ref::<T>().and_then(|value| value.as_type(type_id))
        }

        Self {
            value: Rc::new(value),
            upcast_fn: upcast::<T>,
            chain_fn: T::type_chain,
            type_name: any::type_name::<T>(),
        }
    }

    /// The name of the erased type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str { self.type_name }

    /// Downcasts to the concrete erased type.
    #[must_use]
    pub fn downcast_ref<T: Encodable>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// The type ids to try during registry lookup, most specific first.
    #[must_use]
    pub fn type_chain(&self) -> Vec<TypeId> { (self.chain_fn)() }

    /// Returns a view of the erased value as a type in its chain.
    #[must_use]
    pub fn as_type(&self, type_id: TypeId) -> Option<&dyn Any> {
        (self.upcast_fn)(self.value.as_ref(), type_id)
    }

    /// Stable address of the shared allocation, used as the identity for
    /// circular-reference checking.
    pub(crate) fn address(&self) -> *const () {
        Rc::as_ptr(&self.value).cast::<()>()
    }
}

impl Debug for Foreign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Foreign({})", self.type_name)
    }
}

/// Foreign values compare by identity of the shared allocation.
impl PartialEq for Foreign {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self { Self::Null }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int(value.into()) }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self { Self::Int(value.into()) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::Str(value.to_owned()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::Str(value) }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self { Self::array(value) }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || number.as_f64().map_or(Self::Null, Self::Float),
                Self::Int,
            ),
            serde_json::Value::String(value) => Self::Str(value),
            serde_json::Value::Array(items) => {
                Self::array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::object(
                entries
                    .into_iter()
                    .map(|(key, value)| (Key::Str(key), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self { Self::Str(value.to_owned()) }
}

impl From<String> for Key {
    fn from(value: String) -> Self { Self::Str(value) }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self { Self::Int(value) }
}
