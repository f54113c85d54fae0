//! Single-comparison conditions
//!
//! A condition compares one named variable against one literal. The
//! variable's current value is obtained through a caller-supplied lookup;
//! a variable the lookup does not know makes the condition false.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Source of variable values for condition evaluation
pub trait VariableLookup: Send + Sync {
    /// Current value of `name`, or `None` if the variable is unknown
    fn lookup(&self, name: &str) -> Option<String>;
}

impl VariableLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl VariableLookup for HashMap<String, serde_json::Value> {
    fn lookup(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
}

impl Comparator {
    /// Textual operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
        }
    }

    /// Parse a textual operator
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Comparator::Equal),
            "!=" => Some(Comparator::NotEqual),
            ">" => Some(Comparator::GreaterThan),
            "<" => Some(Comparator::LessThan),
            ">=" => Some(Comparator::GreaterOrEqual),
            "<=" => Some(Comparator::LessOrEqual),
            _ => None,
        }
    }

    /// Compare an actual value against the expected literal
    pub fn compare(&self, actual: &str, expected: &str) -> bool {
        match self {
            Comparator::Equal => values_equal(actual, expected),
            Comparator::NotEqual => !values_equal(actual, expected),
            Comparator::GreaterThan => compare_numbers(actual, expected, |a, b| a > b),
            Comparator::LessThan => compare_numbers(actual, expected, |a, b| a < b),
            Comparator::GreaterOrEqual => compare_numbers(actual, expected, |a, b| a >= b),
            Comparator::LessOrEqual => compare_numbers(actual, expected, |a, b| a <= b),
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

fn compare_numbers(actual: &str, expected: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    match (parse_number(actual), parse_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

// Identical text is always equal; otherwise "5" and "5.0" match as finite numbers.
fn values_equal(actual: &str, expected: &str) -> bool {
    if actual == expected {
        return true;
    }
    match (parse_number(actual), parse_number(expected)) {
        (Some(a), Some(b)) => a.is_finite() && b.is_finite() && a == b,
        _ => false,
    }
}

/// A single comparison of a named variable against a literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    variable: String,
    comparator: Comparator,
    value: String,
}

impl Condition {
    /// Create a condition; the variable name must not be blank
    pub fn new(
        variable: impl Into<String>,
        comparator: Comparator,
        value: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let variable = variable.into();
        if variable.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Condition variable name cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            variable,
            comparator,
            value: value.into(),
        })
    }

    /// Shorthand for an `==` condition
    pub fn equals(variable: impl Into<String>, value: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(variable, Comparator::Equal, value)
    }

    /// Parse the textual form `<variable> <op> <literal>`
    ///
    /// The literal may be wrapped in single or double quotes.
    pub fn parse(expression: &str) -> Result<Self, CoreError> {
        let (index, symbol) = find_operator(expression).ok_or_else(|| {
            CoreError::ValidationError(format!("No comparison operator in condition: {}", expression))
        })?;

        let comparator = Comparator::from_symbol(symbol).ok_or_else(|| {
            CoreError::ValidationError(format!("Unknown operator: {}", symbol))
        })?;

        let variable = expression[..index].trim();
        let literal = strip_quotes(expression[index + symbol.len()..].trim());

        Self::new(variable, comparator, literal)
    }

    /// Variable name
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Comparison operator
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Literal the variable is compared against
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Evaluate against a variable lookup
    pub fn evaluate(&self, lookup: &dyn VariableLookup) -> bool {
        self.evaluate_with(|name| lookup.lookup(name))
    }

    /// Evaluate against any lookup function
    pub fn evaluate_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.variable) {
            Some(actual) => self.comparator.compare(&actual, &self.value),
            None => {
                tracing::trace!(variable = %self.variable, "Variable missing, condition is false");
                false
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if parse_number(&self.value).is_some() {
            write!(f, "{} {} {}", self.variable, self.comparator.symbol(), self.value)
        } else {
            write!(f, "{} {} \"{}\"", self.variable, self.comparator.symbol(), self.value)
        }
    }
}

fn find_operator(expression: &str) -> Option<(usize, &str)> {
    let bytes = expression.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if !matches!(b, b'=' | b'!' | b'<' | b'>') {
            continue;
        }
        if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
            return Some((i, &expression[i..i + 2]));
        }
        return Some((i, &expression[i..i + 1]));
    }
    None
}

fn strip_quotes(literal: &str) -> &str {
    for quote in ['"', '\''] {
        if literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote) {
            return &literal[1..literal.len() - 1];
        }
    }
    literal
}
