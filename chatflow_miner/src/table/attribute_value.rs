use chrono::{DateTime, FixedOffset};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use super::timestamp_utils::parse_timestamp;

///
/// Possible cell values of an [`EventTable`](super::EventTable)
///
/// Tip: If you know the expected `AttributeValue` type, make use of the `try_as_xxx` functions (e.g., [`AttributeValue::try_as_string`])
///
/// ```rust
/// use chatflow_miner::table::AttributeValue;
/// let v = AttributeValue::Float(42.0);
///
/// let f = v.try_as_float().unwrap();
/// assert_eq!(*f,42.0);
/// ````
///
/// [`AttributeValue`] implements [`Display`] and thus `to_string()`.
/// Dates are rendered in RFC 3339 and missing values as the empty String.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content")]
pub enum AttributeValue {
    /// String values
    String(String),
    /// `DateTime` values
    Date(DateTime<FixedOffset>),
    /// Integer values
    Int(i64),
    /// Float values
    Float(f64),
    /// Boolean values
    Boolean(bool),
    /// Used to represent missing or invalid values (e.g., `DateTime` which could not be parsed)
    None(),
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Date(date_time) => write!(f, "{}", date_time.to_rfc3339()),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Boolean(b) => write!(f, "{b}"),
            AttributeValue::None() => Ok(()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T> From<DateTime<T>> for AttributeValue
where
    T: chrono::TimeZone,
{
    fn from(value: DateTime<T>) -> Self {
        Self::Date(value.fixed_offset())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T> From<Option<T>> for AttributeValue
where
    T: Into<AttributeValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::None(),
        }
    }
}

///
/// [`Hash`] trait implementation for [`AttributeValue`]
///
/// Allows using values (e.g., case identifiers) as keys of hash maps.
impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttributeValue::String(value) => value.hash(state),
            AttributeValue::Date(value) => value.hash(state),
            AttributeValue::Int(value) => value.hash(state),
            AttributeValue::Float(value) => OrderedFloat::from(*value).hash(state),
            AttributeValue::Boolean(value) => value.hash(state),
            AttributeValue::None() => {}
        }
    }
}

///
/// [`Eq`] trait implementation for [`AttributeValue`]
///
impl Eq for AttributeValue {}

impl AttributeValue {
    /// Returns `true` for missing values ([`AttributeValue::None`])
    pub fn is_none(&self) -> bool {
        matches!(self, AttributeValue::None())
    }

    ///
    /// Try to get attribute value as String
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::String`] and `None` otherwise
    ///
    pub fn try_as_string(&self) -> Option<&String> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }
    ///
    /// Try to get attribute value as date
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::Date`] and `None` otherwise
    ///
    pub fn try_as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            AttributeValue::Date(v) => Some(v),
            _ => None,
        }
    }
    ///
    /// Try to get attribute value as int
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::Int`] and `None` otherwise
    ///
    pub fn try_as_int(&self) -> Option<&i64> {
        match self {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }

    ///
    /// Try to get attribute value as float
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::Float`] and `None` otherwise
    ///
    pub fn try_as_float(&self) -> Option<&f64> {
        match self {
            AttributeValue::Float(v) => Some(v),
            _ => None,
        }
    }
    ///
    /// Try to get attribute value as bool
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::Boolean`] and `None` otherwise
    ///
    pub fn try_as_bool(&self) -> Option<&bool> {
        match self {
            AttributeValue::Boolean(v) => Some(v),
            _ => None,
        }
    }

    ///
    /// Best-effort conversion to a timestamp
    ///
    /// Dates are returned as-is, Strings are parsed using [`parse_timestamp`].
    /// All other values (and unparseable Strings) yield `None`.
    ///
    pub fn to_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            AttributeValue::Date(v) => Some(*v),
            AttributeValue::String(s) => parse_timestamp(s.trim(), None, false).ok(),
            _ => None,
        }
    }

    ///
    /// Best-effort conversion to a float (used for ordering event identifiers)
    ///
    pub fn to_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) if !f.is_nan() => Some(*f),
            AttributeValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    ///
    /// Lowercase String representation, as used for case-insensitive label comparisons
    ///
    pub fn to_lowercase_label(&self) -> String {
        self.to_string().trim().to_lowercase()
    }
}
