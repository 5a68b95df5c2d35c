//! Helpers for reading untyped msgpack values.
//!
//! Every accessor names the field it is reading so decode failures say
//! what was wrong with the payload.

use rmpv::Value;

use crate::error::DriverError;

/// Reads an integer.
pub fn as_i64(value: &Value, what: &str) -> Result<i64, DriverError> {
    value
        .as_i64()
        .ok_or_else(|| DriverError::decode(format!("{} must be an integer, got {}", what, value)))
}

/// Reads a string. Older engines send strings as binary, so both are accepted.
pub fn as_string(value: &Value, what: &str) -> Result<String, DriverError> {
    match value {
        Value::String(s) => Ok(s
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(s.as_bytes()).into_owned())),
        Value::Binary(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(DriverError::decode(format!(
            "{} must be a string, got {}",
            what, value
        ))),
    }
}

/// Reads an object handle (buffer, window, tabpage).
///
/// The engine sends handles as msgpack ext values wrapping an integer;
/// plain integers are accepted as well.
pub fn as_handle(value: &Value, what: &str) -> Result<i64, DriverError> {
    match value {
        Value::Ext(_, data) => {
            let inner = rmpv::decode::read_value(&mut data.as_slice()).map_err(|e| {
                DriverError::decode(format!("{} has an invalid handle: {}", what, e))
            })?;
            as_i64(&inner, what)
        }
        other => as_i64(other, what),
    }
}

/// Reads an array.
pub fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], DriverError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DriverError::decode(format!("{} must be an array, got {}", what, value)))
}

/// Reads the element at `index` of a positional argument list.
pub fn arg<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a Value, DriverError> {
    args.get(index).ok_or_else(|| {
        DriverError::decode(format!(
            "missing argument {} ({}), got {} argument(s)",
            index,
            what,
            args.len()
        ))
    })
}

/// Looks up a string key in a map. Returns `None` for non-maps.
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_map()?.iter().find_map(|(k, v)| match k {
        Value::String(s) if s.as_str() == Some(key) => Some(v),
        Value::Binary(b) if b.as_slice() == key.as_bytes() => Some(v),
        _ => None,
    })
}

/// Reads a boolean map entry, treating absent or non-boolean as `false`.
pub fn map_flag(value: &Value, key: &str) -> bool {
    map_get(value, key).and_then(Value::as_bool).unwrap_or(false)
}

/// Reads a string map entry, treating absent or non-string as empty.
pub fn map_string(value: &Value, key: &str) -> String {
    map_get(value, key)
        .and_then(|v| as_string(v, key).ok())
        .unwrap_or_default()
}

/// Builds a msgpack map from string keys.
pub fn string_map<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::from(k.into()), v))
            .collect(),
    )
}

/// Renders an engine error value (`[type, message]`) as text.
pub fn error_message(value: &Value) -> String {
    match value {
        Value::Array(parts) => parts
            .get(1)
            .and_then(|m| as_string(m, "error message").ok())
            .unwrap_or_else(|| value.to_string()),
        other => as_string(other, "error message").unwrap_or_else(|_| other.to_string()),
    }
}
