//! A small scalar parameter type for the opaque command string the
//! fluent query facade hands to the provider's executor (spec §4.B,
//! §14). Expression trees and predicates stay external; this is just
//! enough to carry bound values across the port boundary.

use derive_more::Display;

///
/// Param
///

#[derive(Clone, Debug, Display, PartialEq)]
pub enum Param {
    #[display("{_0}")]
    Int(i64),
    #[display("{_0}")]
    Text(String),
    #[display("{_0}")]
    Bool(bool),
    #[display("null")]
    Null,
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
