use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use num_traits::ToPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value of a feature attribute or of an evaluated expression.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
}

impl Value {
    /// Numeric representation of the value. Strings are parsed, booleans are `0` or `1`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Integer(v) => v.to_f64(),
            Value::Float(v) => Some(*v),
            Value::String(v) => v.trim().parse().ok(),
        }
    }

    /// Truthiness of the value: non-zero numbers, non-empty strings and `true` are true.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Integer(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::String(v) => !v.is_empty(),
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_) | Value::Bool(_))
    }

    /// Compares two values.
    ///
    /// If either side is a number the comparison is numeric, provided the other side converts to a
    /// number. Otherwise the string representations are compared. Null is only equal to null.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() || b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(a.to_string().cmp(&b.to_string())),
            },
            (a, b) => Some(a.to_string().cmp(&b.to_string())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
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

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
