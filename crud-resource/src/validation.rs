//! Declarative request validation
//!
//! A [`Rules`] set maps field names to a [`Rule`]: whether the field is
//! required plus a list of [`Check`]s. [`validate`] runs every rule and
//! collects every failure instead of stopping at the first.
//!
//! Query-string values arrive as text, so with [`Source::Query`] a value is
//! coerced to the kind named by the rule's [`Check::Type`] before the other
//! checks run. Body values are checked as the JSON they already are.
//!
//! # Example
//!
//! ```rust
//! use crud_resource::validation::{validate, Check, Rule, Rules, Source, ValueKind};
//! use serde_json::json;
//!
//! let rules = Rules::new()
//!     .field("attribute1", Rule::required().check(Check::Type(ValueKind::String)))
//!     .field("quantity", Rule::optional().check(Check::Type(ValueKind::Integer)).check(Check::Min(0.0)));
//!
//! assert!(validate(Source::Body, &json!({"attribute1": "x"}), &rules).is_ok());
//!
//! let err = validate(Source::Body, &json!({"quantity": -1}), &rules).unwrap_err();
//! assert_eq!(err.errors.len(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON value kinds a field can be required to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any string
    String,
    /// Whole number
    Integer,
    /// Any number, whole or not
    Float,
    /// `true` or `false`
    Boolean,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Parse query-string text into this kind
    fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::from),
            Self::Boolean => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Array | Self::Object => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|value| self.matches(value)),
        }
    }
}

/// A single constraint on a field value
#[derive(Debug, Clone)]
pub enum Check {
    /// Value must be of this kind
    Type(ValueKind),
    /// Minimum length of a string (in characters) or array
    MinLength(usize),
    /// Maximum length of a string (in characters) or array
    MaxLength(usize),
    /// Inclusive numeric lower bound
    Min(f64),
    /// Inclusive numeric upper bound
    Max(f64),
    /// Value must equal one of these
    OneOf(Vec<Value>),
    /// String must match this regular expression
    Pattern(Regex),
}

/// Constraints for one field
#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// Missing or null values fail
    pub required: bool,
    /// Checks applied in order when a value is present
    pub checks: Vec<Check>,
}

impl Rule {
    /// A field that must be present
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            checks: Vec::new(),
        }
    }

    /// A field that is checked only when present
    #[must_use]
    pub fn optional() -> Self {
        Self::default()
    }

    /// Append a check
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    fn kind(&self) -> Option<ValueKind> {
        self.checks.iter().find_map(|check| match check {
            Check::Type(kind) => Some(*kind),
            _ => None,
        })
    }
}

/// Rule set keyed by field name
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: BTreeMap<String, Rule>,
}

impl Rules {
    /// An empty rule set; everything passes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// True when no field has a rule
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields and their rules, in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }
}

/// Where the parameters being validated came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// URL query string; values are text
    Query,
    /// JSON request body
    Body,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// Field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error code (e.g., "REQUIRED", "INVALID_TYPE", "TOO_SHORT")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One or more fields failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summary(.errors))]
pub struct ValidationError {
    /// Every failure found, in field order
    pub errors: Vec<FieldError>,
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// A failure on a single field
    pub fn single(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            errors: vec![FieldError::new(field, code, message)],
        }
    }
}

/// Check `params` against `rules`
///
/// `params` must be a JSON object; with [`Source::Query`] its values are
/// expected to be strings.
pub fn validate(source: Source, params: &Value, rules: &Rules) -> Result<(), ValidationError> {
    let Some(params) = params.as_object() else {
        return Err(ValidationError::single(
            source.to_string(),
            "INVALID_BODY",
            format!("{} must be a JSON object", source),
        ));
    };

    let mut errors = Vec::new();
    for (field, rule) in rules.iter() {
        let value = match params.get(field) {
            None | Some(Value::Null) => {
                if rule.required {
                    errors.push(FieldError::new(field, "REQUIRED", "field is required"));
                }
                continue;
            }
            Some(value) => value,
        };

        let value = match (source, value, rule.kind()) {
            (Source::Query, Value::String(raw), Some(kind)) => match kind.coerce(raw) {
                Some(coerced) => coerced,
                None => {
                    errors.push(type_error(field, kind));
                    continue;
                }
            },
            _ => value.clone(),
        };

        check_field(source, field, &value, rule, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn type_error(field: &str, kind: ValueKind) -> FieldError {
    FieldError::new(field, "INVALID_TYPE", format!("must be of type {}", kind))
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn number(source: Source, value: &Value) -> Option<f64> {
    match (source, value) {
        (_, Value::Number(n)) => n.as_f64(),
        (Source::Query, Value::String(raw)) => raw.parse::<f64>().ok(),
        _ => None,
    }
}

fn check_field(source: Source, field: &str, value: &Value, rule: &Rule, errors: &mut Vec<FieldError>) {
    for check in &rule.checks {
        match check {
            Check::Type(kind) => {
                if !kind.matches(value) {
                    errors.push(type_error(field, *kind));
                    // Remaining checks assume the declared kind
                    return;
                }
            }
            Check::MinLength(min) => {
                if length(value).is_some_and(|len| len < *min) {
                    errors.push(FieldError::new(
                        field,
                        "TOO_SHORT",
                        format!("must have at least {} characters or items", min),
                    ));
                }
            }
            Check::MaxLength(max) => {
                if length(value).is_some_and(|len| len > *max) {
                    errors.push(FieldError::new(
                        field,
                        "TOO_LONG",
                        format!("must have at most {} characters or items", max),
                    ));
                }
            }
            Check::Min(min) => match number(source, value) {
                Some(n) if n < *min => errors.push(FieldError::new(
                    field,
                    "TOO_SMALL",
                    format!("must be at least {}", min),
                )),
                Some(_) => {}
                None => errors.push(type_error(field, ValueKind::Float)),
            },
            Check::Max(max) => match number(source, value) {
                Some(n) if n > *max => errors.push(FieldError::new(
                    field,
                    "TOO_LARGE",
                    format!("must be at most {}", max),
                )),
                Some(_) => {}
                None => errors.push(type_error(field, ValueKind::Float)),
            },
            Check::OneOf(allowed) => {
                let found = allowed.iter().any(|candidate| {
                    candidate == value
                        || matches!((source, value), (Source::Query, Value::String(raw))
                            if candidate.as_str().map_or(candidate.to_string() == *raw, |s| s == raw.as_str()))
                });
                if !found {
                    let options = allowed
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    errors.push(FieldError::new(
                        field,
                        "NOT_ALLOWED",
                        format!("must be one of: {}", options),
                    ));
                }
            }
            Check::Pattern(pattern) => match value.as_str() {
                Some(s) if pattern.is_match(s) => {}
                Some(_) => errors.push(FieldError::new(
                    field,
                    "INVALID_FORMAT",
                    format!("must match pattern {}", pattern.as_str()),
                )),
                None => errors.push(type_error(field, ValueKind::String)),
            },
        }
    }
}
