//! Structured property values and their external encodings.
//!
//! A [`Value`] is the engine-wide representation of a property: scalars,
//! lists and maps, nested arbitrarily. It converts to and from three
//! encodings:
//!
//! * the store's property-literal syntax ([`encode_literal`] /
//!   [`parse_literal`]),
//! * structured documents (JSON, see [`Value::from_json`]),
//! * flat tabular cells ([`Value::from_cell`] / [`Value::to_cell`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod document;
mod literal;

pub use document::{properties_from_json, properties_to_json};
pub use literal::{
    encode_literal, encode_properties, integer_syntax, parse_literal, parse_properties,
    MAX_DEPTH,
};

/// Property bag of a vertex or edge; keys are unique and iterate sorted.
pub type PropertyMap = BTreeMap<String, Value>;

/// Errors raised while rendering or parsing values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// NaN and infinities have no literal or document form.
    #[error("cannot encode non-finite float {0}")]
    NonFinite(f64),
    /// Input text is not a valid literal.
    #[error("invalid literal at byte {offset}: {reason}")]
    Parse {
        /// Byte offset of the offending token.
        offset: usize,
        /// What the parser expected or found.
        reason: String,
    },
    /// Containers nest deeper than [`MAX_DEPTH`].
    #[error("value nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// A recursively structured property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or explicit null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested string-keyed map.
    Map(PropertyMap),
}

/// How flat tabular cells are turned back into values.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellPolicy {
    /// Cells become scalars only: booleans, numbers, or strings.
    #[default]
    Scalars,
    /// Cells holding literal syntax (`[1, 2]`, `{a: 1}`, `'x'`) are
    /// reinterpreted as that value. Strings that happen to look like literals
    /// will not round-trip unchanged.
    Reinterpret,
}

impl Value {
    /// True for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for lists and maps.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Short name of the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Normalized lookup key for an external identifier.
    ///
    /// `1` and `"1"` map to the same key so that ids read from CSV (strings or
    /// numbers) and from JSON (numbers) resolve identically. Null and
    /// containers cannot identify a vertex.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Float(f) if f.is_finite() => Some(render_float(*f)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Float(_) | Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Whether this value forces its label onto the document encoding.
    ///
    /// Lists and maps always do. A string only does under
    /// [`CellPolicy::Reinterpret`], and only when it parses as a container.
    pub fn looks_structured(&self, policy: CellPolicy) -> bool {
        match self {
            Value::List(_) | Value::Map(_) => true,
            Value::String(s) if policy == CellPolicy::Reinterpret => {
                matches!(parse_literal(s), Ok(Value::List(_) | Value::Map(_)))
            }
            _ => false,
        }
    }

    /// Decodes a tabular cell. Empty and null cells are absent (`None`).
    pub fn from_cell(raw: &str, policy: CellPolicy) -> Option<Value> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if policy == CellPolicy::Reinterpret {
            if let Ok(value) = parse_literal(raw) {
                return (!value.is_null()).then_some(value);
            }
        }
        let value = scalar_from_cell(raw);
        (!value.is_null()).then_some(value)
    }

    /// Renders the value as a tabular cell.
    ///
    /// Null is the empty cell; strings are written verbatim; floats always
    /// carry a fraction or exponent. Containers fall back to literal syntax.
    pub fn to_cell(&self) -> Result<String, CodecError> {
        match self {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(f) if f.is_finite() => Ok(render_float(*f)),
            Value::Float(f) => Err(CodecError::NonFinite(*f)),
            Value::String(s) => Ok(s.clone()),
            Value::List(_) | Value::Map(_) => encode_literal(self),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<PropertyMap> for Value {
    fn from(value: PropertyMap) -> Self {
        Value::Map(value)
    }
}

/// Finite floats in a form that never reads back as an integer.
pub(crate) fn render_float(f: f64) -> String {
    format!("{f:?}")
}

fn scalar_from_cell(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    match parse_literal(raw) {
        Ok(number @ (Value::Int(_) | Value::Float(_))) => number,
        _ => Value::String(raw.to_string()),
    }
}
