//! Runtime values of the reference interpreter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ir::Literal;

/// A value held by a variable during interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// 64-bit floating point.
    Float(f64),
}

impl Value {
    /// Attempts to extract an integer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tacopt::emulation::Value;
    ///
    /// assert_eq!(Value::Int(42).as_int(), Some(42));
    /// assert_eq!(Value::Bool(true).as_int(), None);
    /// ```
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to extract a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to extract a float.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the name of the value's type, as used in instruction type annotations.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.17}"),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(v) => Value::Bool(v),
            Literal::Int(v) => Value::Int(v),
            Literal::Float(v) => Value::Float(v),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Float(0.5).to_string(), "0.50000000000000000");
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(Value::from(Literal::Int(7)), Value::Int(7));
        assert_eq!(Value::from(Literal::Bool(true)).as_bool(), Some(true));
        assert_eq!(Value::from(Literal::Float(1.5)).as_float(), Some(1.5));
        assert_eq!(Value::Float(1.5).type_name(), "float");
    }
}
