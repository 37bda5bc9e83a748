//! Filter expressions for index requests
//!
//! The `filter` query parameter holds comma-separated clauses of the form
//! `field:op:value`, or `field:op` for `null` and `notnull`. Clauses are
//! combined with AND.
//!
//! | op | meaning |
//! |---|---|
//! | `eq`, `ne` | equal, not equal |
//! | `gt`, `gte`, `lt`, `lte` | ordered comparison |
//! | `like` | SQL pattern with `%` and `_` |
//! | `in` | any of the `\|`-separated values |
//! | `null`, `notnull` | presence check |
//!
//! Values are read as booleans, integers or floats when they parse as one,
//! and as strings otherwise. `like` patterns always stay strings.

use crate::model::Model;
use crate::repository::{FilterCondition, FilterOperator, FilterValue, Query};
use crate::validation::{FieldError, ValidationError};

/// Query parameter holding the filter expression
pub const FILTER_PARAM: &str = "filter";

/// Parsed filter clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    /// Conditions combined with AND
    pub conditions: Vec<FilterCondition>,
}

fn parse_operator(raw: &str) -> Option<FilterOperator> {
    Some(match raw {
        "eq" => FilterOperator::Equal,
        "ne" => FilterOperator::NotEqual,
        "gt" => FilterOperator::GreaterThan,
        "gte" => FilterOperator::GreaterThanOrEqual,
        "lt" => FilterOperator::LessThan,
        "lte" => FilterOperator::LessThanOrEqual,
        "like" => FilterOperator::Like,
        "in" => FilterOperator::In,
        "null" => FilterOperator::IsNull,
        "notnull" => FilterOperator::IsNotNull,
        _ => return None,
    })
}

/// Read a literal as the narrowest type it parses as
pub fn coerce(raw: &str) -> FilterValue {
    match raw {
        "true" => return FilterValue::Boolean(true),
        "false" => return FilterValue::Boolean(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return FilterValue::Integer(n);
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => FilterValue::Float(n),
        _ => FilterValue::String(raw.to_string()),
    }
}

fn error(code: &str, message: String) -> FieldError {
    FieldError::new(FILTER_PARAM, code, message)
}

impl FilterExpression {
    /// Parse a filter expression against the columns of `M`
    ///
    /// An empty expression yields no conditions. Every malformed clause is
    /// reported.
    pub fn parse<M: Model>(expression: &str) -> Result<Self, ValidationError> {
        let mut conditions = Vec::new();
        let mut errors = Vec::new();

        if expression.trim().is_empty() {
            return Ok(Self::default());
        }

        for clause in expression.split(',') {
            let clause = clause.trim();
            let mut parts = clause.splitn(3, ':');
            let field = parts.next().unwrap_or_default().trim();
            let op = parts.next().map(str::trim);
            let value = parts.next();

            if field.is_empty() {
                errors.push(error("INVALID_FORMAT", format!("malformed clause '{}'", clause)));
                continue;
            }
            if !M::has_column(field) {
                errors.push(error(
                    "UNKNOWN_FIELD",
                    format!("cannot filter by unknown field '{}'", field),
                ));
                continue;
            }
            let Some(op) = op else {
                errors.push(error(
                    "INVALID_FORMAT",
                    format!("clause '{}' has no operator", clause),
                ));
                continue;
            };
            let Some(operator) = parse_operator(op) else {
                errors.push(error(
                    "UNKNOWN_OPERATOR",
                    format!("unknown filter operator '{}'", op),
                ));
                continue;
            };

            let condition = match (operator, value) {
                (FilterOperator::IsNull, None) => FilterCondition::is_null(field),
                (FilterOperator::IsNotNull, None) => FilterCondition::is_not_null(field),
                (FilterOperator::IsNull | FilterOperator::IsNotNull, Some(_)) => {
                    errors.push(error(
                        "UNEXPECTED_VALUE",
                        format!("operator '{}' takes no value", op),
                    ));
                    continue;
                }
                (_, None) => {
                    errors.push(error(
                        "MISSING_VALUE",
                        format!("operator '{}' on '{}' needs a value", op, field),
                    ));
                    continue;
                }
                (FilterOperator::Like, Some(pattern)) => FilterCondition::like(field, pattern),
                (FilterOperator::In, Some(values)) => {
                    FilterCondition::is_in(field, values.split('|').map(coerce).collect())
                }
                (operator, Some(value)) => FilterCondition::new(field, operator, coerce(value)),
            };
            conditions.push(condition);
        }

        if errors.is_empty() {
            Ok(Self { conditions })
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Narrow `query` by every condition
    #[must_use]
    pub fn apply(self, query: Query) -> Query {
        self.conditions.into_iter().fold(query, Query::filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Item;

    #[test]
    fn test_coerce() {
        assert_eq!(coerce("true"), FilterValue::Boolean(true));
        assert_eq!(coerce("12"), FilterValue::Integer(12));
        assert_eq!(coerce("-3"), FilterValue::Integer(-3));
        assert_eq!(coerce("1.5"), FilterValue::Float(1.5));
        assert_eq!(coerce("abc"), FilterValue::String("abc".to_string()));
        assert_eq!(coerce("inf"), FilterValue::String("inf".to_string()));
        assert_eq!(coerce(""), FilterValue::String(String::new()));
    }

    #[test]
    fn test_empty_expression() {
        let expr = FilterExpression::parse::<Item>("  ").unwrap();
        assert!(expr.conditions.is_empty());
    }

    #[test]
    fn test_parse_clauses() {
        let expr = FilterExpression::parse::<Item>(
            "quantity:gte:2,attribute1:like:a%,active:eq:true,id:in:1|2|3,attribute1:notnull",
        )
        .unwrap();
        assert_eq!(
            expr.conditions,
            vec![
                FilterCondition::gte("quantity", 2),
                FilterCondition::like("attribute1", "a%"),
                FilterCondition::eq("active", true),
                FilterCondition::is_in(
                    "id",
                    vec![
                        FilterValue::Integer(1),
                        FilterValue::Integer(2),
                        FilterValue::Integer(3)
                    ]
                ),
                FilterCondition::is_not_null("attribute1"),
            ]
        );
    }

    #[test]
    fn test_value_may_contain_colons() {
        let expr = FilterExpression::parse::<Item>("attribute1:eq:10:30").unwrap();
        assert_eq!(expr.conditions[0].value, FilterValue::String("10:30".to_string()));
    }

    #[test]
    fn test_like_keeps_numeric_pattern_as_string() {
        let expr = FilterExpression::parse::<Item>("attribute1:like:12").unwrap();
        assert_eq!(expr.conditions[0].value, FilterValue::String("12".to_string()));
    }

    #[test]
    fn test_reports_every_bad_clause() {
        let err = FilterExpression::parse::<Item>(
            "secret:eq:1,quantity:between:1,quantity:gt,active:null:x,quantity",
        )
        .unwrap_err();
        let codes: Vec<_> = err.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "UNKNOWN_FIELD",
                "UNKNOWN_OPERATOR",
                "MISSING_VALUE",
                "UNEXPECTED_VALUE",
                "INVALID_FORMAT"
            ]
        );
        assert!(err.errors.iter().all(|e| e.field == "filter"));
    }

    #[test]
    fn test_apply_narrows_query() {
        let query = FilterExpression::parse::<Item>("quantity:lt:5")
            .unwrap()
            .apply(Query::new());
        assert_eq!(query.filters, vec![FilterCondition::lt("quantity", 5)]);
    }
}
