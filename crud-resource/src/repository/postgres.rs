//! PostgreSQL engine
//!
//! Entities travel as JSON: rows are read with `row_to_json` and written
//! through `json_populate_record`, so column types are resolved by the
//! database from the model's table. Each session owns one transaction.

use std::marker::PhantomData;

use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::query::{FilterCondition, FilterOperator, FilterValue, Query};
use super::traits::{Engine, RepositoryResult, Session};
use crate::model::{self, Model, Record};

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(
                RepositoryOperation::Fetch,
                RepositoryErrorKind::NotFound,
                "Row not found",
            ),
            E::PoolTimedOut => Self::timeout(RepositoryOperation::Begin, "Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::WorkerCrashed => Self::connection_failed("Database worker crashed"),
            E::Io(e) => Self::connection_failed(e.to_string()),
            E::Tls(e) => Self::connection_failed(format!("TLS error: {}", e)),
            E::ColumnDecode { index, source } => Self::serialization_error(
                RepositoryOperation::Fetch,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::serialization_error(RepositoryOperation::Fetch, e.to_string()),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    RepositoryErrorKind::ConstraintViolation
                } else {
                    RepositoryErrorKind::DatabaseError
                };
                Self::new(RepositoryOperation::Fetch, kind, db_err.to_string())
            }
            other => Self::new(
                RepositoryOperation::Fetch,
                RepositoryErrorKind::Other,
                other.to_string(),
            ),
        }
    }
}

fn failed(operation: RepositoryOperation) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |err| RepositoryError::from(err).with_operation(operation)
}

/// Quote an identifier, schema-qualified names included
fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn decode<M: Model>(value: Value, operation: RepositoryOperation) -> RepositoryResult<M> {
    let record = match value {
        Value::Object(record) => record,
        other => {
            return Err(RepositoryError::serialization_error(
                operation,
                format!("expected a row object, got {}", other),
            ))
        }
    };
    model::from_record(record)
        .map_err(|e| RepositoryError::serialization_error(operation, e.to_string()))
}

fn encode<M: Model>(entity: &M, operation: RepositoryOperation) -> RepositoryResult<Record> {
    model::to_record(entity)
        .map_err(|e| RepositoryError::serialization_error(operation, e.to_string()))
}

/// Engine over a PostgreSQL pool
pub struct PgEngine<M> {
    pool: PgPool,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for PgEngine<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> PgEngine<M> {
    /// Bind a model to a pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _model: PhantomData,
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl<M: Model> Engine<M> for PgEngine<M> {
    type Session = PgSession<M>;

    async fn begin(&self) -> RepositoryResult<Self::Session> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(failed(RepositoryOperation::Begin))?;
        Ok(PgSession {
            tx: Some(tx),
            _model: PhantomData,
        })
    }
}

/// Session holding one open transaction
///
/// Dropping the session before commit rolls the transaction back.
pub struct PgSession<M> {
    tx: Option<Transaction<'static, Postgres>>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> PgSession<M> {
    fn tx(
        &mut self,
        operation: RepositoryOperation,
    ) -> RepositoryResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| {
            RepositoryError::invalid_state(operation, "session already committed or rolled back")
        })
    }

    fn push_filters(
        builder: &mut QueryBuilder<'static, Postgres>,
        filters: &[FilterCondition],
        operation: RepositoryOperation,
    ) -> RepositoryResult<()> {
        for (index, condition) in filters.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            push_condition::<M>(builder, condition, operation)?;
        }
        Ok(())
    }
}

/// Bind `value` cast to the type of column `field`
fn push_typed<M: Model>(builder: &mut QueryBuilder<'static, Postgres>, field: &str, value: &FilterValue) {
    let mut record = serde_json::Map::new();
    record.insert(field.to_string(), value.to_json());
    builder.push(format!("(json_populate_record(NULL::{}, ", quote_ident(M::TABLE)));
    builder.push_bind(Value::Object(record));
    builder.push(format!("::json)).{}", quote_ident(field)));
}

fn push_condition<M: Model>(
    builder: &mut QueryBuilder<'static, Postgres>,
    condition: &FilterCondition,
    operation: RepositoryOperation,
) -> RepositoryResult<()> {
    if !M::has_column(&condition.field) {
        return Err(RepositoryError::new(
            operation,
            RepositoryErrorKind::Other,
            format!("unknown column '{}'", condition.field),
        ));
    }

    let column = format!("t.{}", quote_ident(&condition.field));
    match (condition.operator, &condition.value) {
        (FilterOperator::IsNull, _) => {
            builder.push(format!("{} IS NULL", column));
        }
        (FilterOperator::IsNotNull, _) => {
            builder.push(format!("{} IS NOT NULL", column));
        }
        (FilterOperator::Like, value) => {
            builder.push(format!("{}::text LIKE ", column));
            let pattern = match value {
                FilterValue::String(s) => s.clone(),
                other => other.to_json().to_string(),
            };
            builder.push_bind(pattern);
        }
        (FilterOperator::In, FilterValue::List(values)) => {
            if values.is_empty() {
                builder.push("FALSE");
            } else {
                builder.push(format!("{} IN (", column));
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        builder.push(", ");
                    }
                    push_typed::<M>(builder, &condition.field, value);
                }
                builder.push(")");
            }
        }
        (FilterOperator::In, single) => {
            builder.push(format!("{} = ", column));
            push_typed::<M>(builder, &condition.field, single);
        }
        (operator, value) => {
            builder.push(format!("{} {} ", column, operator));
            push_typed::<M>(builder, &condition.field, value);
        }
    }
    Ok(())
}

impl<M: Model> Session<M> for PgSession<M> {
    async fn get(&mut self, id: i64) -> RepositoryResult<Option<M>> {
        let sql = format!(
            "SELECT row_to_json(t) FROM {} t WHERE t.{} = $1",
            quote_ident(M::TABLE),
            quote_ident(M::ID_FIELD)
        );
        let tx = self.tx(RepositoryOperation::Get)?;
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(failed(RepositoryOperation::Get))?;
        row.map(|value| decode(value, RepositoryOperation::Get))
            .transpose()
    }

    async fn fetch(&mut self, query: &Query) -> RepositoryResult<Vec<M>> {
        let operation = RepositoryOperation::Fetch;
        let mut builder = QueryBuilder::new(format!(
            "SELECT row_to_json(t) FROM {} t",
            quote_ident(M::TABLE)
        ));
        Self::push_filters(&mut builder, &query.filters, operation)?;

        for (index, (field, direction)) in query.order_by.iter().enumerate() {
            if !M::has_column(field) {
                return Err(RepositoryError::new(
                    operation,
                    RepositoryErrorKind::Other,
                    format!("unknown column '{}'", field),
                ));
            }
            builder.push(if index == 0 { " ORDER BY " } else { ", " });
            builder.push(format!("t.{} {}", quote_ident(field), direction.as_sql()));
        }

        if let Some(window) = query.pagination {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(window.limit).unwrap_or(i64::MAX));
            builder.push(" OFFSET ");
            builder.push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
        }

        let tx = self.tx(operation)?;
        let rows: Vec<Value> = builder
            .build_query_scalar::<Value>()
            .fetch_all(&mut **tx)
            .await
            .map_err(failed(operation))?;
        rows.into_iter().map(|value| decode(value, operation)).collect()
    }

    async fn count(&mut self, query: &Query) -> RepositoryResult<u64> {
        let operation = RepositoryOperation::Count;
        let mut builder =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {} t", quote_ident(M::TABLE)));
        Self::push_filters(&mut builder, &query.filters, operation)?;

        let tx = self.tx(operation)?;
        let total: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&mut **tx)
            .await
            .map_err(failed(operation))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn add(&mut self, entity: M) -> RepositoryResult<M> {
        let operation = RepositoryOperation::Add;
        let record = encode(&entity, operation)?;
        let columns = M::writable_columns()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let table = quote_ident(M::TABLE);
        let sql = format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM json_populate_record(NULL::{table}, $1::json) \
             RETURNING row_to_json(t)"
        );

        let tx = self.tx(operation)?;
        let row: Value = sqlx::query_scalar(&sql)
            .bind(Value::Object(record))
            .fetch_one(&mut **tx)
            .await
            .map_err(failed(operation))?;
        decode(row, operation)
    }

    async fn merge(&mut self, entity: M) -> RepositoryResult<M> {
        let operation = RepositoryOperation::Merge;
        let id = model::primary_key(&entity).ok_or_else(|| {
            RepositoryError::invalid_state(operation, "entity has no primary key")
                .with_entity(M::NAME, "unassigned")
        })?;
        let record = encode(&entity, operation)?;
        let assignments = M::writable_columns()
            .map(|column| {
                let column = quote_ident(column);
                format!("{column} = s.{column}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let table = quote_ident(M::TABLE);
        let sql = format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM json_populate_record(NULL::{table}, $1::json) AS s \
             WHERE t.{} = $2 RETURNING row_to_json(t)",
            quote_ident(M::ID_FIELD)
        );

        let tx = self.tx(operation)?;
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(Value::Object(record))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(failed(operation))?;
        match row {
            Some(row) => decode(row, operation),
            None => Err(RepositoryError::not_found(M::NAME, id.to_string()).with_operation(operation)),
        }
    }

    async fn delete(&mut self, entity: &M) -> RepositoryResult<()> {
        let operation = RepositoryOperation::Delete;
        let id = model::primary_key(entity).ok_or_else(|| {
            RepositoryError::invalid_state(operation, "entity has no primary key")
                .with_entity(M::NAME, "unassigned")
        })?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote_ident(M::TABLE),
            quote_ident(M::ID_FIELD)
        );

        let tx = self.tx(operation)?;
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(failed(operation))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(M::NAME, id.to_string()).with_operation(operation));
        }
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            RepositoryError::invalid_state(
                RepositoryOperation::Commit,
                "session already committed or rolled back",
            )
        })?;
        tx.commit().await.map_err(failed(RepositoryOperation::Commit))
    }

    async fn rollback(&mut self) -> RepositoryResult<()> {
        // A failed commit already consumed the transaction
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(failed(RepositoryOperation::Rollback)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Item;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("items"), "\"items\"");
        assert_eq!(quote_ident("public.items"), "\"public\".\"items\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_filter_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM \"items\" t");
        let filters = vec![
            FilterCondition::gt("quantity", 3),
            FilterCondition::is_null("attribute1"),
            FilterCondition::is_in("quantity", vec![]),
        ];
        PgSession::<Item>::push_filters(&mut builder, &filters, RepositoryOperation::Fetch).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM \"items\" t WHERE t.\"quantity\" > \
             (json_populate_record(NULL::\"items\", $1::json)).\"quantity\" \
             AND t.\"attribute1\" IS NULL AND FALSE"
        );
    }

    #[test]
    fn test_filter_rejects_unknown_column() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1");
        let filters = vec![FilterCondition::eq("password", "x")];
        let err = PgSession::<Item>::push_filters(&mut builder, &filters, RepositoryOperation::Count)
            .unwrap_err();
        assert_eq!(err.operation, RepositoryOperation::Count);
    }

    #[test]
    fn test_sqlx_error_mapping() {
        let err = RepositoryError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, RepositoryErrorKind::Timeout);
        assert!(err.is_retriable());

        let err = RepositoryError::from(sqlx::Error::RowNotFound).with_operation(RepositoryOperation::Get);
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.operation, RepositoryOperation::Get);
    }
}
