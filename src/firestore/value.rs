//! Conversion between plain serde data and Firestore's typed field maps.

use super::models::{ArrayValue, Document, GeoPoint, MapValue, Value, ValueType};
use super::FirestoreError;
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

fn invalid(msg: String) -> FirestoreError {
    FirestoreError::SerializationError(serde_json::Error::custom(msg))
}

impl TryFrom<JsonValue> for Value {
    type Error = FirestoreError;

    /// Integers become `integerValue`, other numbers `doubleValue`, objects `mapValue`.
    fn try_from(json: JsonValue) -> Result<Self, Self::Error> {
        let value_type = match json {
            JsonValue::Null => ValueType::NullValue(()),
            JsonValue::Bool(b) => ValueType::BooleanValue(b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ValueType::IntegerValue(i.to_string()),
                (None, Some(f)) => ValueType::DoubleValue(f),
                _ => return Err(invalid(format!("Unsupported number type: {}", n))),
            },
            JsonValue::String(s) => ValueType::StringValue(s),
            JsonValue::Array(items) => ValueType::ArrayValue(ArrayValue {
                values: items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            }),
            JsonValue::Object(map) => ValueType::MapValue(MapValue {
                fields: map
                    .into_iter()
                    .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                    .collect::<Result<_, FirestoreError>>()?,
            }),
        };
        Ok(Value { value_type })
    }
}

impl TryFrom<Value> for JsonValue {
    type Error = FirestoreError;

    /// Timestamps, bytes and references come back as their wire strings.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value.value_type {
            ValueType::StringValue(s)
            | ValueType::TimestampValue(s)
            | ValueType::BytesValue(s)
            | ValueType::ReferenceValue(s) => JsonValue::String(s),
            ValueType::IntegerValue(s) => {
                let i: i64 = s
                    .parse()
                    .map_err(|e| invalid(format!("Failed to parse integer string '{}': {}", s, e)))?;
                JsonValue::from(i)
            }
            ValueType::DoubleValue(d) => serde_json::Number::from_f64(d)
                .map(JsonValue::Number)
                .ok_or_else(|| invalid(format!("Invalid f64 value: {}", d)))?,
            ValueType::BooleanValue(b) => JsonValue::Bool(b),
            ValueType::NullValue(()) => JsonValue::Null,
            ValueType::MapValue(map) => fields_to_json(map.fields)?,
            ValueType::ArrayValue(array) => JsonValue::Array(
                array
                    .values
                    .into_iter()
                    .map(JsonValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            ValueType::GeoPointValue(GeoPoint { latitude, longitude }) => {
                serde_json::json!({ "latitude": latitude, "longitude": longitude })
            }
        })
    }
}

fn fields_to_json(fields: HashMap<String, Value>) -> Result<JsonValue, FirestoreError> {
    fields
        .into_iter()
        .map(|(k, v)| Ok((k, JsonValue::try_from(v)?)))
        .collect::<Result<serde_json::Map<_, _>, FirestoreError>>()
        .map(JsonValue::Object)
}

impl Document {
    /// Builds a document body from any serializable struct or map.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, FirestoreError> {
        match Value::try_from(serde_json::to_value(value)?)?.value_type {
            ValueType::MapValue(map) => Ok(Document {
                fields: map.fields,
                ..Default::default()
            }),
            _ => Err(invalid("Can only set objects as documents".to_string())),
        }
    }

    /// Reads the document's fields into a deserializable type.
    pub fn to_deserializable<T: DeserializeOwned>(&self) -> Result<T, FirestoreError> {
        Ok(serde_json::from_value(fields_to_json(self.fields.clone())?)?)
    }

    /// The last segment of the document's resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}
