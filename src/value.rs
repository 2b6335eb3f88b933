//! Configuration values as the host framework hands them to us.
//!
//! [`Value`] is the typed, four-state field used on every configuration model.
//! [`Dynamic`] is the loosely-typed value nested blocks arrive as; the
//! [`convert`](crate::convert) module decomposes it into typed sub-models.

use std::collections::BTreeMap;

/// A single configuration attribute.
///
/// `Absent` means the user never set the attribute, `Null` means it is
/// explicitly null (which is also what a mapper writes when the API does not
/// return a field), `Unknown` means it resolves only after apply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value<T> {
    /// Not set by the user.
    #[default]
    Absent,
    /// Explicitly null.
    Null,
    /// Resolved only after apply.
    Unknown,
    /// A concrete value.
    Known(T),
}

impl<T> Value<T> {
    /// Build a value from an optional wire field: `None` becomes [`Value::Null`].
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }

    /// Whether the value is concrete.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Whether the value is absent or explicitly null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Absent | Self::Null)
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether the value is absent, null or unknown.
    pub fn is_null_or_unknown(&self) -> bool {
        !self.is_known()
    }

    /// Borrow the concrete value.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Take the concrete value.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the inner value, keeping the state.
    pub fn as_ref(&self) -> Value<&T> {
        match self {
            Self::Absent => Value::Absent,
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(v),
        }
    }

    /// Map the concrete value, keeping the state otherwise.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Self::Absent => Value::Absent,
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(f(v)),
        }
    }
}

impl<T: Clone> Value<T> {
    /// The concrete value, cloned, or `None`.
    pub fn known_cloned(&self) -> Option<T> {
        self.as_known().cloned()
    }
}

impl<T> From<Option<T>> for Value<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}

impl From<&str> for Value<String> {
    fn from(value: &str) -> Self {
        Self::Known(value.to_string())
    }
}

/// A string-keyed group of dynamic attributes (a nested block or a map).
pub type ObjectValue = BTreeMap<String, Dynamic>;

/// The framework's loosely-typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Null.
    Null,
    /// Resolved only after apply.
    Unknown,
    /// A boolean.
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A number with a fractional part, or one outside the `i64` range.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<Dynamic>),
    /// A map or object.
    Map(ObjectValue),
}

impl Dynamic {
    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int64",
            Self::Float(_) => "float64",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Decode a JSON value; numbers that fit `i64` become [`Dynamic::Int`].
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            },
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Encode as JSON. Unknown values and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Unknown => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Dynamic {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Dynamic>> From<Vec<T>> for Dynamic {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Dynamic>> From<BTreeMap<String, T>> for Dynamic {
    fn from(value: BTreeMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Dynamic>> From<Value<T>> for Dynamic {
    fn from(value: Value<T>) -> Self {
        match value {
            Value::Absent | Value::Null => Self::Null,
            Value::Unknown => Self::Unknown,
            Value::Known(v) => v.into(),
        }
    }
}
