//! Device attributes — typed values, references and comparison operators.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A single typed attribute value as reported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

/// Numeric view of an attribute value used by ordered comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl AttributeValue {
    fn as_number(&self) -> Option<Number> {
        match self {
            Self::Int(v) => Some(Number::Int(*v)),
            Self::Float(v) => Some(Number::Float(*v)),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::Int)
                    .or_else(|_| s.parse::<f64>().map(Number::Float))
                    .ok()
            }
            Self::Bool(_) | Self::Json(_) => None,
        }
    }

    /// Order two values numerically, coercing both to a common numeric type.
    ///
    /// Returns `None` when either side cannot be read as a number.
    #[must_use]
    pub fn numeric_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.as_number()?, other.as_number()?) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            #[allow(clippy::cast_precision_loss)]
            (Number::Int(a), Number::Float(b)) => (a as f64).partial_cmp(&b),
            #[allow(clippy::cast_precision_loss)]
            (Number::Float(a), Number::Int(b)) => a.partial_cmp(&(b as f64)),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
        }
    }

    /// Loose equality: numbers compare by value (`1 == 1.0`), everything
    /// else compares structurally.
    #[must_use]
    pub fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.numeric_cmp(other) == Some(Ordering::Equal)
            }
            _ => self == other,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Comparison operator of a device-status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl Operator {
    /// Compare the device's `current` value against the condition's `target`.
    ///
    /// Ordered comparisons between values that cannot be coerced to numbers
    /// are simply not satisfied.
    #[must_use]
    pub fn compare(self, current: &AttributeValue, target: &AttributeValue) -> bool {
        match self {
            Self::Eq => current.loosely_equals(target),
            Self::Gt => current.numeric_cmp(target) == Some(Ordering::Greater),
            Self::Lt => current.numeric_cmp(target) == Some(Ordering::Less),
        }
    }

    /// Symbol used in persisted conditions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points at one attribute of one instance inside a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    /// Instance inside the device (a multi-gang switch has several).
    #[serde(default)]
    pub instance_id: u32,
    /// Attribute name, e.g. `"power"`, `"brightness"`, `"temperature"`.
    pub attribute: String,
}

impl AttributeRef {
    #[must_use]
    pub fn new(instance_id: u32, attribute: impl Into<String>) -> Self {
        Self {
            instance_id,
            attribute: attribute.into(),
        }
    }
}

impl std::fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.attribute, self.instance_id)
    }
}

/// A single "set attribute to value" instruction sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCommand {
    #[serde(flatten)]
    pub target: AttributeRef,
    pub value: AttributeValue,
}

impl AttributeCommand {
    #[must_use]
    pub fn new(target: AttributeRef, value: AttributeValue) -> Self {
        Self { target, value }
    }
}
