//! Output schemas
//!
//! A [`Schema`] turns an entity into the JSON a client sees. [`SerdeSchema`]
//! emits the entity's serde form unchanged; [`FieldSchema`] restricts or
//! hides columns.

use serde_json::Value;

use crate::handlers::ApiError;
use crate::model::{self, Model};

/// Serializes entities of `M` for responses
pub trait Schema<M: Model>: Send + Sync + 'static {
    /// Dump one entity
    fn dump(&self, entity: &M) -> Result<Value, ApiError>;

    /// Dump a result set, preserving order
    fn dump_many(&self, entities: &[M]) -> Result<Vec<Value>, ApiError> {
        entities.iter().map(|entity| self.dump(entity)).collect()
    }
}

fn dump_failed<M: Model>(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(entity = M::NAME, error = %err, "failed to serialize entity");
    ApiError::internal(format!("Failed to serialize {}", M::NAME))
}

/// Dumps every serialized field
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeSchema;

impl<M: Model> Schema<M> for SerdeSchema {
    fn dump(&self, entity: &M) -> Result<Value, ApiError> {
        serde_json::to_value(entity).map_err(dump_failed::<M>)
    }
}

/// Dumps a chosen subset of fields
///
/// ```rust
/// use crud_resource::schema::FieldSchema;
///
/// // Everything except the flag
/// let schema = FieldSchema::new().exclude(["active"]);
/// // Only these, in the entity's own field order
/// let compact = FieldSchema::new().only(["id", "attribute1"]);
/// # let _ = (schema, compact);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    only: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl FieldSchema {
    /// Schema that keeps every field
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only these fields
    #[must_use]
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Drop these fields
    #[must_use]
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    fn keeps(&self, field: &str) -> bool {
        let listed = self
            .only
            .as_ref()
            .map_or(true, |only| only.iter().any(|f| f == field));
        listed && !self.exclude.iter().any(|f| f == field)
    }
}

impl<M: Model> Schema<M> for FieldSchema {
    fn dump(&self, entity: &M) -> Result<Value, ApiError> {
        let mut record = model::to_record(entity).map_err(dump_failed::<M>)?;
        record.retain(|field, _| self.keeps(field));
        Ok(Value::Object(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Item;
    use serde_json::json;

    fn item() -> Item {
        Item {
            id: Some(3),
            attribute1: "x".to_string(),
            quantity: 7,
            active: true,
        }
    }

    #[test]
    fn test_serde_schema_dumps_all_fields() {
        let value = SerdeSchema.dump(&item()).unwrap();
        assert_eq!(
            value,
            json!({"id": 3, "attribute1": "x", "quantity": 7, "active": true})
        );
    }

    #[test]
    fn test_field_schema_only() {
        let schema = FieldSchema::new().only(["id", "attribute1"]);
        let value = Schema::<Item>::dump(&schema, &item()).unwrap();
        assert_eq!(value, json!({"id": 3, "attribute1": "x"}));
    }

    #[test]
    fn test_field_schema_exclude_wins_over_only() {
        let schema = FieldSchema::new().only(["id", "active"]).exclude(["active"]);
        let value = Schema::<Item>::dump(&schema, &item()).unwrap();
        assert_eq!(value, json!({"id": 3}));
    }

    #[test]
    fn test_dump_many_keeps_order() {
        let mut second = item();
        second.id = Some(4);
        let values = SerdeSchema.dump_many(&[item(), second]).unwrap();
        assert_eq!(values[0]["id"], 3);
        assert_eq!(values[1]["id"], 4);
    }
}
