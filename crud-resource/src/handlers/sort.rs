//! Sort directives for index requests
//!
//! `sort` lists fields separated by commas; a leading `-` sorts that field
//! descending and a leading `+` ascending. `order` (`asc` or `desc`) sets
//! the direction of fields without a prefix.
//!
//! ```rust
//! use crud_resource::handlers::{QueryParams, SortSpec};
//! use crud_resource::repository::{OrderDirection, Query};
//! # use crud_resource::model::Model;
//! # #[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
//! # struct Item { id: Option<i64>, attribute1: String, quantity: i64 }
//! # impl Model for Item {
//! #     const NAME: &'static str = "Item";
//! #     const TABLE: &'static str = "items";
//! #     const COLUMNS: &'static [&'static str] = &["id", "attribute1", "quantity"];
//! # }
//!
//! let mut params = QueryParams::new();
//! params.insert("sort".into(), "-quantity,attribute1".into());
//!
//! let spec = SortSpec::from_params::<Item>(&params).unwrap();
//! let query = spec.apply::<Item>(Query::new());
//! assert_eq!(query.order_by[0], ("quantity".to_string(), OrderDirection::Descending));
//! assert_eq!(query.order_by[1], ("attribute1".to_string(), OrderDirection::Ascending));
//! ```

use super::traits::QueryParams;
use crate::model::Model;
use crate::repository::{OrderDirection, Query};
use crate::validation::{FieldError, ValidationError};

/// Query parameter naming the sort fields
pub const SORT_PARAM: &str = "sort";

/// Query parameter naming the default direction
pub const ORDER_PARAM: &str = "order";

/// Parsed sort keys, most significant first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    /// Field and direction pairs
    pub keys: Vec<(String, OrderDirection)>,
}

fn parse_order(raw: &str) -> Option<OrderDirection> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asc" => Some(OrderDirection::Ascending),
        "desc" => Some(OrderDirection::Descending),
        _ => None,
    }
}

impl SortSpec {
    /// Validate and parse the `sort` and `order` parameters
    ///
    /// Every field must be a column of `M`. All problems are reported
    /// together.
    pub fn from_params<M: Model>(params: &QueryParams) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();

        let default_direction = match params.get(ORDER_PARAM) {
            None => OrderDirection::Ascending,
            Some(raw) => parse_order(raw).unwrap_or_else(|| {
                errors.push(FieldError::new(
                    ORDER_PARAM,
                    "NOT_ALLOWED",
                    format!("order must be 'asc' or 'desc', got '{}'", raw),
                ));
                OrderDirection::Ascending
            }),
        };

        let mut keys = Vec::new();
        if let Some(raw) = params.get(SORT_PARAM) {
            for segment in raw.split(',') {
                let segment = segment.trim();
                let (field, direction) = if let Some(field) = segment.strip_prefix('-') {
                    (field, OrderDirection::Descending)
                } else if let Some(field) = segment.strip_prefix('+') {
                    (field, OrderDirection::Ascending)
                } else {
                    (segment, default_direction)
                };

                if field.is_empty() {
                    errors.push(FieldError::new(
                        SORT_PARAM,
                        "INVALID_FORMAT",
                        "sort contains an empty field",
                    ));
                } else if !M::has_column(field) {
                    errors.push(FieldError::new(
                        SORT_PARAM,
                        "UNKNOWN_FIELD",
                        format!("cannot sort by unknown field '{}'", field),
                    ));
                } else {
                    keys.push((field.to_string(), direction));
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { keys })
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Append the sort keys to `query`
    ///
    /// With no keys the query is ordered by primary key so pages are stable.
    #[must_use]
    pub fn apply<M: Model>(self, query: Query) -> Query {
        if self.keys.is_empty() {
            return query.order_by(M::ID_FIELD, OrderDirection::Ascending);
        }
        self.keys
            .into_iter()
            .fold(query, |query, (field, direction)| query.order_by(field, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Item;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_sort_orders_by_id() {
        let spec = SortSpec::from_params::<Item>(&QueryParams::new()).unwrap();
        assert!(spec.keys.is_empty());
        let query = spec.apply::<Item>(Query::new());
        assert_eq!(query.order_by, vec![("id".to_string(), OrderDirection::Ascending)]);
    }

    #[test]
    fn test_order_sets_default_direction() {
        let spec =
            SortSpec::from_params::<Item>(&params(&[("sort", "quantity,+id"), ("order", "desc")]))
                .unwrap();
        assert_eq!(
            spec.keys,
            vec![
                ("quantity".to_string(), OrderDirection::Descending),
                ("id".to_string(), OrderDirection::Ascending),
            ]
        );
    }

    #[test]
    fn test_order_is_case_insensitive() {
        let spec = SortSpec::from_params::<Item>(&params(&[("sort", "id"), ("order", "DESC")]))
            .unwrap();
        assert_eq!(spec.keys[0].1, OrderDirection::Descending);
    }

    #[test]
    fn test_rejects_unknown_field_and_bad_order() {
        let err = SortSpec::from_params::<Item>(&params(&[
            ("sort", "password,attribute1"),
            ("order", "sideways"),
        ]))
        .unwrap_err();
        let codes: Vec<_> = err.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["NOT_ALLOWED", "UNKNOWN_FIELD"]);
    }

    #[test]
    fn test_rejects_empty_segment() {
        let err = SortSpec::from_params::<Item>(&params(&[("sort", "id,,quantity")])).unwrap_err();
        assert_eq!(err.errors[0].code, "INVALID_FORMAT");

        let err = SortSpec::from_params::<Item>(&params(&[("sort", "-")])).unwrap_err();
        assert_eq!(err.errors[0].code, "INVALID_FORMAT");
    }
}
