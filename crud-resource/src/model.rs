//! Model binding for resources
//!
//! A [`Model`] names its table, primary key and the explicit list of columns
//! a payload may touch. Entities are moved in and out of their [`Record`]
//! form through serde, so serialized field names must match column names.
//!
//! ```rust
//! use crud_resource::model::{self, Model};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Item {
//!     id: Option<i64>,
//!     attribute1: String,
//! }
//!
//! impl Model for Item {
//!     const NAME: &'static str = "Item";
//!     const TABLE: &'static str = "items";
//!     const COLUMNS: &'static [&'static str] = &["id", "attribute1"];
//! }
//!
//! let payload = json!({"id": 99, "attribute1": "x", "unknown": true});
//! let item = model::assign_fields(Item::default(), payload.as_object().unwrap()).unwrap();
//! assert_eq!(item.attribute1, "x");
//! assert_eq!(item.id, None);
//! ```

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON-object view of an entity, keyed by column name
pub type Record = Map<String, Value>;

/// A persisted record type a resource can be bound to
pub trait Model: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Entity name used in errors and logs
    const NAME: &'static str;

    /// Backing table
    const TABLE: &'static str;

    /// Primary key column; never settable from a payload
    const ID_FIELD: &'static str = "id";

    /// Every column of the table, primary key included
    const COLUMNS: &'static [&'static str];

    /// Whether `name` is a column of this model
    fn has_column(name: &str) -> bool {
        Self::COLUMNS.contains(&name)
    }

    /// Columns a payload may write
    fn writable_columns() -> impl Iterator<Item = &'static str> {
        Self::COLUMNS
            .iter()
            .copied()
            .filter(|column| *column != Self::ID_FIELD)
    }
}

/// Errors moving an entity to or from its record
#[derive(Debug, Error)]
pub enum ModelError {
    /// The entity did not serialize to a JSON object
    #[error("{0} does not serialize to an object")]
    NotAnObject(&'static str),

    /// A field value does not fit the model
    #[error("invalid value for field '{field}': {source}")]
    InvalidField {
        /// Offending column
        field: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed outright
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serialize an entity into its record
pub fn to_record<M: Model>(entity: &M) -> Result<Record, ModelError> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        _ => Err(ModelError::NotAnObject(M::NAME)),
    }
}

/// Rebuild an entity from a record
pub fn from_record<M: Model>(record: Record) -> Result<M, ModelError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Primary key of an entity, if it has been assigned one
pub fn primary_key<M: Model>(entity: &M) -> Option<i64> {
    to_record(entity)
        .ok()
        .and_then(|record| record.get(M::ID_FIELD).and_then(Value::as_i64))
}

/// Return the entity with its primary key set
pub fn with_primary_key<M: Model>(entity: M, id: i64) -> Result<M, ModelError> {
    let mut record = to_record(&entity)?;
    record.insert(M::ID_FIELD.to_string(), Value::from(id));
    from_record(record)
}

/// Set a single column, bypassing payload rules
pub fn set_field<M: Model>(entity: M, field: &str, value: Value) -> Result<M, ModelError> {
    let mut record = to_record(&entity)?;
    record.insert(field.to_string(), value);
    from_record(record).map_err(|err| match err {
        ModelError::Serde(source) => ModelError::InvalidField {
            field: field.to_string(),
            source,
        },
        other => other,
    })
}

/// Copy payload values onto an entity
///
/// Only keys that are columns of `M` are copied, and the primary key is
/// skipped. Keys outside the column list are ignored.
pub fn assign_fields<M: Model>(entity: M, payload: &Map<String, Value>) -> Result<M, ModelError> {
    let original = to_record(&entity)?;
    let mut record = original.clone();
    let mut assigned = Vec::new();

    for (key, value) in payload {
        if key != M::ID_FIELD && M::has_column(key) {
            record.insert(key.clone(), value.clone());
            assigned.push(key.as_str());
        }
    }

    match from_record(record) {
        Ok(entity) => Ok(entity),
        Err(ModelError::Serde(source)) => {
            // Pin the failure on the first field that breaks on its own
            let field = assigned.into_iter().find(|key| {
                let mut candidate = original.clone();
                candidate.insert((*key).to_string(), payload[*key].clone());
                from_record::<M>(candidate).is_err()
            });
            match field {
                Some(field) => Err(ModelError::InvalidField {
                    field: field.to_string(),
                    source,
                }),
                None => Err(ModelError::Serde(source)),
            }
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Item {
        pub id: Option<i64>,
        pub attribute1: String,
        pub quantity: i64,
        pub active: bool,
    }

    impl Model for Item {
        const NAME: &'static str = "Item";
        const TABLE: &'static str = "items";
        const COLUMNS: &'static [&'static str] = &["id", "attribute1", "quantity", "active"];
    }

    /// A model without an active flag, so deletes are physical
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Note {
        pub id: Option<i64>,
        pub attribute1: String,
    }

    impl Model for Note {
        const NAME: &'static str = "Note";
        const TABLE: &'static str = "notes";
        const COLUMNS: &'static [&'static str] = &["id", "attribute1"];
    }

    #[test]
    fn test_has_column() {
        assert!(Item::has_column("attribute1"));
        assert!(Item::has_column("id"));
        assert!(!Item::has_column("secret"));
    }

    #[test]
    fn test_writable_columns_skip_id() {
        let columns: Vec<_> = Item::writable_columns().collect();
        assert_eq!(columns, vec!["attribute1", "quantity", "active"]);
    }

    #[test]
    fn test_record_roundtrip_keeps_columns() {
        let item = Item {
            id: Some(4),
            attribute1: "x".to_string(),
            quantity: 2,
            active: true,
        };
        let record = to_record(&item).unwrap();
        assert_eq!(record.get("attribute1"), Some(&json!("x")));
        assert_eq!(from_record::<Item>(record).unwrap(), item);
    }

    #[test]
    fn test_primary_key() {
        assert_eq!(primary_key(&Item::default()), None);
        let item = with_primary_key(Item::default(), 12).unwrap();
        assert_eq!(primary_key(&item), Some(12));
    }

    #[test]
    fn test_assign_fields_ignores_id_and_unknown_keys() {
        let existing = Item {
            id: Some(1),
            ..Item::default()
        };
        let payload = json!({"id": 500, "attribute1": "new", "bogus": 1});
        let item = assign_fields(existing, payload.as_object().unwrap()).unwrap();
        assert_eq!(item.id, Some(1));
        assert_eq!(item.attribute1, "new");
    }

    #[test]
    fn test_assign_fields_leaves_missing_fields_untouched() {
        let existing = Item {
            id: Some(1),
            attribute1: "keep".to_string(),
            quantity: 9,
            active: true,
        };
        let payload = json!({"quantity": 3});
        let item = assign_fields(existing, payload.as_object().unwrap()).unwrap();
        assert_eq!(item.attribute1, "keep");
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn test_assign_fields_reports_offending_field() {
        let payload = json!({"attribute1": "ok", "quantity": "many"});
        let err = assign_fields(Item::default(), payload.as_object().unwrap()).unwrap_err();
        match err {
            ModelError::InvalidField { field, .. } => assert_eq!(field, "quantity"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_set_field() {
        let item = set_field(Item::default(), "active", json!(true)).unwrap();
        assert!(item.active);
        assert!(set_field(Item::default(), "active", json!("yes")).is_err());
    }
}
