//! Parse passthroughs to the native JSON machinery.
//!
//! Decoding has no custom-type extension point; these functions delegate
//! to serde_json and convert the parsed tree into a [`Value`]. Errors are
//! serde_json's own decode errors, unwrapped, with their line/column
//! position information intact.

use std::io;

use crate::value::Value;

/// Parses JSON text into a [`Value`].
pub fn from_str(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str::<serde_json::Value>(text).map(Value::from)
}

/// Parses JSON read from `reader` into a [`Value`].
pub fn from_reader<R: io::Read>(
    reader: R,
) -> Result<Value, serde_json::Error> {
    serde_json::from_reader::<_, serde_json::Value>(reader).map(Value::from)
}
