//! Query description handed to a session
//!
//! A [`Query`] starts unfiltered and is narrowed by the filterer, ordered by
//! the sorter and windowed by the paginator before a session runs it.
//!
//! # Example
//!
//! ```rust
//! use crud_resource::repository::{FilterCondition, OrderDirection, Pagination, Query};
//!
//! let query = Query::new()
//!     .filter(FilterCondition::eq("status", "active"))
//!     .filter(FilterCondition::gte("age", 18))
//!     .order_by("created_at", OrderDirection::Descending)
//!     .paginate(Pagination::page(2, 20));
//!
//! assert_eq!(query.filters.len(), 2);
//! assert_eq!(query.pagination, Some(Pagination::new(20, 20)));
//! ```

use std::fmt;

use serde_json::Value;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

impl OrderDirection {
    /// SQL keyword for this direction
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Offset/limit window over a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Create pagination for a specific page number (1-indexed)
    ///
    /// ```rust
    /// use crud_resource::repository::Pagination;
    ///
    /// let page3 = Pagination::page(3, 20);
    /// assert_eq!(page3.offset, 40);
    /// assert_eq!(page3.limit, 20);
    /// ```
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1) * page_size;
        Self {
            offset,
            limit: page_size,
        }
    }
}

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE) with `%` and `_` wildcards
    Like,
    /// Value is in a list (IN)
    In,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::In => write!(f, "IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A value that can be used in filter conditions
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// List of values (for IN operator)
    List(Vec<FilterValue>),
    /// Null value (for IS NULL / IS NOT NULL)
    Null,
}

impl FilterValue {
    /// JSON form of the value, as stored in an entity record
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Float(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::List(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            Self::Null => Value::Null,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Create a pattern filter (field LIKE pattern)
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Like, FilterValue::String(pattern.into()))
    }

    /// Create a membership filter (field IN values)
    pub fn is_in(field: impl Into<String>, values: Vec<FilterValue>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::List(values))
    }

    /// Create a null check (field IS NULL)
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Create a not-null check (field IS NOT NULL)
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }
}

/// Filters, ordering and window for a fetch or count
///
/// `count` ignores `order_by` and `pagination`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conditions combined with AND
    pub filters: Vec<FilterCondition>,
    /// Sort keys, most significant first
    pub order_by: Vec<(String, OrderDirection)>,
    /// Result window
    pub pagination: Option<Pagination>,
}

impl Query {
    /// The unfiltered query for a model
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow the query with one more condition
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Append a sort key
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    /// Restrict the result window
    #[must_use]
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// True when no filter narrows the query
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_direction_display() {
        assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
        assert_eq!(format!("{}", OrderDirection::Descending), "desc");
        assert_eq!(OrderDirection::Descending.as_sql(), "DESC");
    }

    #[test]
    fn test_pagination_page() {
        assert_eq!(Pagination::page(1, 20), Pagination::new(0, 20));
        assert_eq!(Pagination::page(3, 20), Pagination::new(40, 20));
        // Page 0 is treated as page 1
        assert_eq!(Pagination::page(0, 20).offset, 0);
    }

    #[test]
    fn test_filter_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Equal), "=");
        assert_eq!(format!("{}", FilterOperator::NotEqual), "!=");
        assert_eq!(format!("{}", FilterOperator::GreaterThanOrEqual), ">=");
        assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
        assert_eq!(format!("{}", FilterOperator::In), "IN");
        assert_eq!(format!("{}", FilterOperator::IsNotNull), "IS NOT NULL");
    }

    #[test]
    fn test_filter_value_conversions() {
        assert_eq!(FilterValue::from("a"), FilterValue::String("a".to_string()));
        assert_eq!(FilterValue::from(42_i32), FilterValue::Integer(42));
        assert_eq!(FilterValue::from(true), FilterValue::Boolean(true));
        assert_eq!(
            FilterValue::from(vec![1_i64, 2]),
            FilterValue::List(vec![FilterValue::Integer(1), FilterValue::Integer(2)])
        );
    }

    #[test]
    fn test_filter_value_to_json() {
        assert_eq!(FilterValue::from("x").to_json(), json!("x"));
        assert_eq!(FilterValue::Integer(3).to_json(), json!(3));
        assert_eq!(FilterValue::Float(1.5).to_json(), json!(1.5));
        assert_eq!(FilterValue::Null.to_json(), json!(null));
        assert_eq!(FilterValue::from(vec!["a", "b"]).to_json(), json!(["a", "b"]));
    }

    #[test]
    fn test_filter_condition_helpers() {
        let cond = FilterCondition::gte("age", 18);
        assert_eq!(cond.field, "age");
        assert_eq!(cond.operator, FilterOperator::GreaterThanOrEqual);
        assert_eq!(cond.value, FilterValue::Integer(18));

        let cond = FilterCondition::is_null("deleted_at");
        assert_eq!(cond.operator, FilterOperator::IsNull);
        assert_eq!(cond.value, FilterValue::Null);
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new();
        assert!(query.is_unfiltered());

        let query = query
            .filter(FilterCondition::eq("active", true))
            .order_by("name", OrderDirection::Ascending)
            .paginate(Pagination::new(0, 10));
        assert!(!query.is_unfiltered());
        assert_eq!(query.order_by, vec![("name".to_string(), OrderDirection::Ascending)]);
        assert_eq!(query.pagination, Some(Pagination::new(0, 10)));
    }
}
