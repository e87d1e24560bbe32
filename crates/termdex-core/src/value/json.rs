use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    value::{Decimal128, Document, Value},
};
use serde_json::{Map, Value as Json};
use thiserror::Error as ThisError;

///
/// JsonValueError
///

#[derive(Debug, ThisError)]
pub enum JsonValueError {
    #[error("invalid json: {0}")]
    Parse(String),

    #[error("invalid extended json for {key}: {found}")]
    InvalidExtended { key: &'static str, found: String },
}

impl From<JsonValueError> for InternalError {
    fn from(err: JsonValueError) -> Self {
        Self::new(ErrorClass::Encoding, ErrorOrigin::Value, err.to_string())
    }
}

impl Value {
    /// Parse relaxed extended JSON text.
    pub fn parse_json(text: &str) -> Result<Self, JsonValueError> {
        let json: Json =
            serde_json::from_str(text).map_err(|err| JsonValueError::Parse(err.to_string()))?;

        Self::from_json(&json)
    }

    /// Convert relaxed extended JSON. Integers that fit `i32` become Int32,
    /// larger ones Int64; other numbers become Double.
    pub fn from_json(json: &Json) -> Result<Self, JsonValueError> {
        let value = match json {
            Json::Null => Self::Null,
            Json::Bool(v) => Self::Bool(*v),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map_or(Self::Int64(i), Self::Int32)
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::Text(s.clone()),
            Json::Array(items) => Self::Array(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(map) => match extended(map)? {
                Some(value) => value,
                None => Self::Document(object_fields(map)?),
            },
        };

        Ok(value)
    }
}

fn object_fields(map: &Map<String, Json>) -> Result<Document, JsonValueError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
        .collect()
}

fn invalid(key: &'static str, found: &Json) -> JsonValueError {
    JsonValueError::InvalidExtended {
        key,
        found: found.to_string(),
    }
}

// Recognise `{"$kind": ...}` wrappers. Returns None for plain documents.
#[allow(clippy::too_many_lines)]
fn extended(map: &Map<String, Json>) -> Result<Option<Value>, JsonValueError> {
    let Some((first, payload)) = map.iter().next() else {
        return Ok(None);
    };
    if !first.starts_with('$') {
        return Ok(None);
    }

    let value = match (first.as_str(), map.len()) {
        ("$minKey", 1) => Value::MinKey,
        ("$maxKey", 1) => Value::MaxKey,
        ("$undefined", 1) => Value::Undefined,
        ("$numberDecimal", 1) => {
            let text = payload.as_str().ok_or_else(|| invalid("$numberDecimal", payload))?;
            Value::Decimal128(
                Decimal128::parse(text).ok_or_else(|| invalid("$numberDecimal", payload))?,
            )
        }
        ("$numberLong", 1) => Value::Int64(parse_int(payload, "$numberLong")?),
        ("$numberInt", 1) => {
            let v = parse_int(payload, "$numberInt")?;
            Value::Int32(i32::try_from(v).map_err(|_| invalid("$numberInt", payload))?)
        }
        ("$numberDouble", 1) => {
            let text = payload.as_str().ok_or_else(|| invalid("$numberDouble", payload))?;
            let v = match text {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => other
                    .parse::<f64>()
                    .map_err(|_| invalid("$numberDouble", payload))?,
            };
            Value::Double(v)
        }
        ("$oid", 1) => {
            let text = payload.as_str().ok_or_else(|| invalid("$oid", payload))?;
            let bytes = decode_hex(text).ok_or_else(|| invalid("$oid", payload))?;
            Value::ObjectId(bytes.try_into().map_err(|_| invalid("$oid", payload))?)
        }
        ("$date", 1) => match payload {
            Json::Object(inner) => match extended(inner)? {
                Some(Value::Int64(ms)) => Value::DateTime(ms),
                _ => return Err(invalid("$date", payload)),
            },
            other => Value::DateTime(other.as_i64().ok_or_else(|| invalid("$date", payload))?),
        },
        ("$timestamp", 1) => {
            let field = |name: &str| {
                payload
                    .get(name)
                    .and_then(Json::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| invalid("$timestamp", payload))
            };
            Value::Timestamp {
                time: field("t")?,
                increment: field("i")?,
            }
        }
        ("$binary", 1) => {
            let hex = payload
                .get("hex")
                .and_then(Json::as_str)
                .and_then(decode_hex)
                .ok_or_else(|| invalid("$binary", payload))?;
            let subtype = payload
                .get("subType")
                .and_then(Json::as_str)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| invalid("$binary", payload))?;
            Value::Binary {
                subtype,
                bytes: hex,
            }
        }
        ("$symbol", 1) => Value::Symbol(
            payload
                .as_str()
                .ok_or_else(|| invalid("$symbol", payload))?
                .to_string(),
        ),
        ("$code", 1) => Value::Code(
            payload
                .as_str()
                .ok_or_else(|| invalid("$code", payload))?
                .to_string(),
        ),
        ("$code", 2) => {
            let code = payload.as_str().ok_or_else(|| invalid("$code", payload))?;
            let scope = match map.get("$scope") {
                Some(Json::Object(scope)) => object_fields(scope)?,
                _ => return Err(invalid("$code", payload)),
            };
            Value::CodeWithScope {
                code: code.to_string(),
                scope,
            }
        }
        ("$regex", 1 | 2) => {
            let pattern = payload.as_str().ok_or_else(|| invalid("$regex", payload))?;
            let options = match map.get("$options") {
                Some(Json::String(o)) => o.clone(),
                None if map.len() == 1 => String::new(),
                _ => return Ok(None),
            };
            Value::Regex {
                pattern: pattern.to_string(),
                options,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(value))
}

fn parse_int(payload: &Json, key: &'static str) -> Result<i64, JsonValueError> {
    match payload {
        Json::String(s) => s.parse().map_err(|_| invalid(key, payload)),
        other => other.as_i64().ok_or_else(|| invalid(key, payload)),
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }

    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
