use serde_json::{Map, Number, Value as Json};

use super::{CodecError, PropertyMap, Value, MAX_DEPTH};

impl Value {
    /// Converts a decoded JSON value. Nested arrays and objects pass through
    /// as lists and maps; integers outside `i64` become floats.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(v) => Value::Int(v),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(properties_from_json(map)),
        }
    }

    /// Converts to JSON for document output.
    pub fn to_json(&self) -> Result<Json, CodecError> {
        to_json_at(self, 0)
    }
}

/// Converts a JSON object into a property bag.
pub fn properties_from_json(map: Map<String, Json>) -> PropertyMap {
    map.into_iter()
        .map(|(key, value)| (key, Value::from_json(value)))
        .collect()
}

/// Converts a property bag into a JSON object.
pub fn properties_to_json(props: &PropertyMap) -> Result<Map<String, Json>, CodecError> {
    props_to_json_at(props, 0)
}

fn to_json_at(value: &Value, depth: usize) -> Result<Json, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(MAX_DEPTH));
    }
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(v) => Json::Number((*v).into()),
        Value::Float(f) => Json::Number(Number::from_f64(*f).ok_or(CodecError::NonFinite(*f))?),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(map) => Json::Object(props_to_json_at(map, depth)?),
    })
}

fn props_to_json_at(props: &PropertyMap, depth: usize) -> Result<Map<String, Json>, CodecError> {
    let mut out = Map::with_capacity(props.len());
    for (key, value) in props {
        out.insert(key.clone(), to_json_at(value, depth + 1)?);
    }
    Ok(out)
}
