//! Bridge between JSON values and the MessagePack wire form
//!
//! Payloads are handled as `serde_json::Value` everywhere above this crate.
//! On the wire floats are always single precision, map keys may be integers,
//! and binary blobs may appear in responses.

use rmpv::Value as Msg;
use serde_json::{Map, Number, Value};

use crate::error::{CryptoError, Result};

/// Serialize a JSON value to MessagePack bytes
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let msg = to_msgpack(value);
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &msg).map_err(|e| CryptoError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Deserialize exactly one MessagePack value from `bytes`
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let mut cursor = bytes;
    let msg = rmpv::decode::read_value(&mut cursor).map_err(|e| CryptoError::Decode(e.to_string()))?;
    if !cursor.is_empty() {
        return Err(CryptoError::TrailingBytes(cursor.len()));
    }
    from_msgpack(msg)
}

fn to_msgpack(value: &Value) -> Msg {
    match value {
        Value::Null => Msg::Nil,
        Value::Bool(b) => Msg::Boolean(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Msg::from(u)
            } else if let Some(i) = n.as_i64() {
                Msg::from(i)
            } else {
                #[allow(clippy::cast_possible_truncation)]
                Msg::F32(n.as_f64().unwrap_or_default() as f32)
            }
        }
        Value::String(s) => Msg::from(s.as_str()),
        Value::Array(items) => Msg::Array(items.iter().map(to_msgpack).collect()),
        Value::Object(map) => Msg::Map(
            map.iter()
                .map(|(k, v)| (Msg::from(k.as_str()), to_msgpack(v)))
                .collect(),
        ),
    }
}

fn from_msgpack(msg: Msg) -> Result<Value> {
    Ok(match msg {
        Msg::Nil => Value::Null,
        Msg::Boolean(b) => Value::Bool(b),
        Msg::Integer(i) => {
            if let Some(u) = i.as_u64() {
                Value::from(u)
            } else if let Some(s) = i.as_i64() {
                Value::from(s)
            } else {
                return Err(CryptoError::Unsupported("integer out of range"));
            }
        }
        Msg::F32(f) => float(f64::from(f)),
        Msg::F64(f) => float(f),
        Msg::String(s) => Value::String(
            s.into_str()
                .ok_or(CryptoError::Unsupported("non UTF-8 string"))?,
        ),
        Msg::Binary(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        Msg::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_msgpack)
                .collect::<Result<Vec<_>>>()?,
        ),
        Msg::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(map_key(k)?, from_msgpack(v)?);
            }
            Value::Object(map)
        }
        Msg::Ext(..) => return Err(CryptoError::Unsupported("extension type")),
    })
}

// JSON has no NaN or infinity
fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn map_key(key: Msg) -> Result<String> {
    match key {
        Msg::String(s) => s
            .into_str()
            .ok_or(CryptoError::Unsupported("non UTF-8 map key")),
        Msg::Integer(i) => Ok(i.to_string()),
        Msg::Boolean(b) => Ok(b.to_string()),
        _ => Err(CryptoError::Unsupported("map key type")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_floats_are_single_precision() {
        let bytes = encode(&json!(1.5)).unwrap();
        // 0xca marks float 32
        assert_eq!(bytes[0], 0xca);
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn test_integers_keep_sign() {
        assert_eq!(decode(&encode(&json!(-42)).unwrap()).unwrap(), json!(-42));
        assert_eq!(
            decode(&encode(&json!(u64::MAX)).unwrap()).unwrap(),
            json!(u64::MAX)
        );
    }

    #[test]
    fn test_nested_value() {
        let value = json!({
            "userId": 123456789,
            "name": "mizuki",
            "tags": ["a", null, true],
            "nested": {"rate": 0.25}
        });
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_integer_map_keys_become_strings() {
        let msg = Msg::Map(vec![(Msg::from(7), Msg::from("seven"))]);
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &msg).unwrap();
        assert_eq!(decode(&buf).unwrap(), json!({"7": "seven"}));
    }

    #[test]
    fn test_binary_becomes_byte_array() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Msg::Binary(vec![1, 2, 255])).unwrap();
        assert_eq!(decode(&buf).unwrap(), json!([1, 2, 255]));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&json!(1)).unwrap();
        bytes.push(0xc0);
        assert!(matches!(decode(&bytes), Err(CryptoError::TrailingBytes(1))));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let bytes = encode(&json!({"key": "value"})).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 2]),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_ext_rejected() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Msg::Ext(1, vec![0])).unwrap();
        assert!(matches!(decode(&buf), Err(CryptoError::Unsupported(_))));
    }
}
