//! JSON serialization for values the native machinery (serde_json)
//! cannot handle on its own, via per-type encoder functions selected by
//! the runtime type of the value being encoded.
//!
//! Encoder functions live in a process-wide [`Registry`]; the encoding
//! facade expands every [`Value::Foreign`] leaf through the most
//! specific registered encoder and keeps walking the returned
//! structure. Parsing, text grammar, escaping, and number formatting
//! all remain serde_json's responsibility.
//!
//! # Example
//!
//! ``` rust
//! use sdjson::{Key, Value};
//!
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! impl sdjson::Encodable for Point {}
//!
//! sdjson::register::<Point, _>(|point| {
//!     Value::object(vec![
//!         (Key::from("x"), Value::from(point.x)),
//!         (Key::from("y"), Value::from(point.y)),
//!     ])
//! });
//!
//! let text = sdjson::to_string(&Value::foreign(Point { x: 1, y: 2 }))
//!     .unwrap();
//! assert_eq!(text, r#"{"x":1,"y":2}"#);
//!
//! let parsed = sdjson::from_str(&text).unwrap();
//! assert_eq!(parsed, sdjson::from_str(r#"{"x": 1, "y": 2}"#).unwrap());
//! ```
//!
//! Non-default options (indentation, key sorting, ASCII-only output,
//! private registries, the native escape hatch) go through [`Encoder`].

use std::io;

use lazy_static::lazy_static;

pub mod decode;
pub mod encode;
mod format;
pub mod registry;
pub mod value;

pub use decode::{from_reader, from_str};
pub use encode::{EncodeConfig, EncodeError, Encoder, FallbackFn};
pub use registry::{EncodeFn, Registry, ResolvedEncoder};
pub use value::{Array, Encodable, Foreign, Key, Object, Value};

pub use serde_json;
pub use serde_json::{Deserializer, Error as JsonError, Serializer};

lazy_static! {
    // one shared instance for the all-defaults path; an optimization,
    // not a correctness requirement
    static ref DEFAULT_ENCODER: Encoder<'static> = Encoder::new();
}

/// Serializes `value` to a JSON string with default options, expanding
/// foreign leaves through the process-wide registry.
pub fn to_string(value: &Value) -> Result<String, EncodeError> {
    DEFAULT_ENCODER.encode(value)
}

/// Serializes `value` as JSON text written incrementally to `writer`,
/// byte-for-byte equal to what [`to_string`] produces.
pub fn to_writer<W: io::Write>(
    writer: W,
    value: &Value,
) -> Result<(), EncodeError> {
    DEFAULT_ENCODER.encode_to_writer(writer, value)
}

/// Registers `encoder` for `T` in the process-wide registry.
///
/// Takes effect immediately and globally: every subsequent encode of a
/// `T` anywhere in the process uses `encoder`. Re-registering a type
/// silently replaces the previous encoder.
pub fn register<T, F>(encoder: F)
where
    T: Encodable,
    F: Fn(&T) -> Value + Send + Sync + 'static,
{
    Registry::global().write().register::<T, F>(encoder);
}

/// Registers `T` in the process-wide registry through its existing
/// [`serde::Serialize`] implementation.
pub fn register_serialize<T>()
where
    T: Encodable + serde::Serialize,
{
    Registry::global().write().register_serialize::<T>();
}
