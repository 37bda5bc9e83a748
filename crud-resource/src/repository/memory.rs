//! In-process engine
//!
//! Keeps entities in a map keyed by primary key. Sessions stage changes in a
//! local log and apply them under the store lock on commit, so other sessions
//! never observe uncommitted work. Primary keys are handed out from a
//! counter at `add` time and are not reused after a rollback.
//!
//! Updates and removals name rows that must still exist when the session
//! commits; a row removed by another session in the meantime fails the
//! whole commit with `NotFound` and nothing is applied.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::error::{RepositoryError, RepositoryOperation};
use super::query::{FilterCondition, FilterOperator, FilterValue, OrderDirection, Query};
use super::traits::{Engine, RepositoryResult, Session};
use crate::model::{self, Model, Record};

struct Store<M> {
    rows: Mutex<BTreeMap<i64, M>>,
    next_id: AtomicI64,
    fail_next_commit: AtomicBool,
}

/// Engine backed by process memory
pub struct MemoryEngine<M> {
    store: Arc<Store<M>>,
}

impl<M> Clone for MemoryEngine<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<M: Model> Default for MemoryEngine<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> MemoryEngine<M> {
    /// Create an empty store; the first primary key handed out is 1
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store {
                rows: Mutex::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                fail_next_commit: AtomicBool::new(false),
            }),
        }
    }

    /// Make the next commit on any session of this engine fail
    ///
    /// The failing session keeps its staged changes until it is rolled back.
    pub fn fail_next_commit(&self) {
        self.store.fail_next_commit.store(true, AtomicOrdering::SeqCst);
    }

    /// Number of committed entities
    pub async fn len(&self) -> usize {
        self.store.rows.lock().await.len()
    }

    /// Whether the store holds no committed entities
    pub async fn is_empty(&self) -> bool {
        self.store.rows.lock().await.is_empty()
    }

    /// Committed state of one entity, bypassing sessions
    pub async fn snapshot(&self, id: i64) -> Option<M> {
        self.store.rows.lock().await.get(&id).cloned()
    }
}

impl<M: Model> Engine<M> for MemoryEngine<M> {
    type Session = MemorySession<M>;

    async fn begin(&self) -> RepositoryResult<Self::Session> {
        Ok(MemorySession {
            store: Arc::clone(&self.store),
            pending: Vec::new(),
        })
    }
}

enum Change<M> {
    Insert(i64, M),
    Update(i64, M),
    Remove(i64),
}

/// Session over a [`MemoryEngine`]
pub struct MemorySession<M> {
    store: Arc<Store<M>>,
    pending: Vec<Change<M>>,
}

impl<M: Model> MemorySession<M> {
    /// Committed rows with this session's staged changes applied
    async fn view(&self) -> BTreeMap<i64, M> {
        let mut rows = self.store.rows.lock().await.clone();
        for change in &self.pending {
            match change {
                Change::Insert(id, entity) | Change::Update(id, entity) => {
                    rows.insert(*id, entity.clone());
                }
                Change::Remove(id) => {
                    rows.remove(id);
                }
            }
        }
        rows
    }

    /// Fail unless the row is visible to this session
    async fn require_row(&mut self, id: i64, operation: RepositoryOperation) -> RepositoryResult<()> {
        match self.get(id).await? {
            Some(_) => Ok(()),
            None => Err(RepositoryError::not_found(M::NAME, id.to_string()).with_operation(operation)),
        }
    }

    fn require_key(entity: &M, operation: RepositoryOperation) -> RepositoryResult<i64> {
        model::primary_key(entity).ok_or_else(|| {
            RepositoryError::invalid_state(operation, "entity has no primary key")
                .with_entity(M::NAME, "unassigned")
        })
    }

    fn matching(rows: BTreeMap<i64, M>, query: &Query) -> RepositoryResult<Vec<(Record, M)>> {
        let mut matched = Vec::new();
        for entity in rows.into_values() {
            let record = model::to_record(&entity).map_err(|e| {
                RepositoryError::serialization_error(RepositoryOperation::Fetch, e.to_string())
            })?;
            if query.filters.iter().all(|cond| matches(&record, cond)) {
                matched.push((record, entity));
            }
        }
        Ok(matched)
    }
}

impl<M: Model> Session<M> for MemorySession<M> {
    async fn get(&mut self, id: i64) -> RepositoryResult<Option<M>> {
        for change in self.pending.iter().rev() {
            match change {
                Change::Insert(key, entity) | Change::Update(key, entity) if *key == id => {
                    return Ok(Some(entity.clone()))
                }
                Change::Remove(key) if *key == id => return Ok(None),
                _ => {}
            }
        }
        Ok(self.store.rows.lock().await.get(&id).cloned())
    }

    async fn fetch(&mut self, query: &Query) -> RepositoryResult<Vec<M>> {
        let mut matched = Self::matching(self.view().await, query)?;

        // Stable sort keeps primary key order among equal keys
        matched.sort_by(|(a, _), (b, _)| {
            query
                .order_by
                .iter()
                .map(|(field, direction)| {
                    let ordering = compare_for_sort(a.get(field), b.get(field));
                    match direction {
                        OrderDirection::Ascending => ordering,
                        OrderDirection::Descending => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let entities = matched.into_iter().map(|(_, entity)| entity);
        Ok(match query.pagination {
            Some(window) => entities
                .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
                .collect(),
            None => entities.collect(),
        })
    }

    async fn count(&mut self, query: &Query) -> RepositoryResult<u64> {
        let matched = Self::matching(self.view().await, query)?;
        Ok(matched.len() as u64)
    }

    async fn add(&mut self, entity: M) -> RepositoryResult<M> {
        let id = self.store.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        let entity = model::with_primary_key(entity, id).map_err(|e| {
            RepositoryError::serialization_error(RepositoryOperation::Add, e.to_string())
        })?;
        tracing::debug!(entity = M::NAME, id, "staged insert");
        self.pending.push(Change::Insert(id, entity.clone()));
        Ok(entity)
    }

    async fn merge(&mut self, entity: M) -> RepositoryResult<M> {
        let id = Self::require_key(&entity, RepositoryOperation::Merge)?;
        self.require_row(id, RepositoryOperation::Merge).await?;
        tracing::debug!(entity = M::NAME, id, "staged update");
        self.pending.push(Change::Update(id, entity.clone()));
        Ok(entity)
    }

    async fn delete(&mut self, entity: &M) -> RepositoryResult<()> {
        let id = Self::require_key(entity, RepositoryOperation::Delete)?;
        self.require_row(id, RepositoryOperation::Delete).await?;
        tracing::debug!(entity = M::NAME, id, "staged delete");
        self.pending.push(Change::Remove(id));
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        if self.store.fail_next_commit.swap(false, AtomicOrdering::SeqCst) {
            return Err(RepositoryError::database_error(
                RepositoryOperation::Commit,
                "commit rejected by store",
            ));
        }

        let mut rows = self.store.rows.lock().await;

        // Check the whole log before applying any of it
        let mut live: BTreeSet<i64> = rows.keys().copied().collect();
        for change in &self.pending {
            let stale = match change {
                Change::Insert(id, _) => {
                    live.insert(*id);
                    None
                }
                Change::Update(id, _) => (!live.contains(id)).then_some(*id),
                Change::Remove(id) => (!live.remove(id)).then_some(*id),
            };
            if let Some(id) = stale {
                tracing::debug!(entity = M::NAME, id, "commit touches a row that no longer exists");
                return Err(RepositoryError::not_found(M::NAME, id.to_string())
                    .with_operation(RepositoryOperation::Commit));
            }
        }

        for change in self.pending.drain(..) {
            match change {
                Change::Insert(id, entity) | Change::Update(id, entity) => {
                    rows.insert(id, entity);
                }
                Change::Remove(id) => {
                    rows.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> RepositoryResult<()> {
        if !self.pending.is_empty() {
            tracing::debug!(
                entity = M::NAME,
                discarded = self.pending.len(),
                "rolled back staged changes"
            );
        }
        self.pending.clear();
        Ok(())
    }
}

fn matches(record: &Record, condition: &FilterCondition) -> bool {
    let value = record.get(&condition.field).unwrap_or(&Value::Null);
    match condition.operator {
        FilterOperator::IsNull => value.is_null(),
        FilterOperator::IsNotNull => !value.is_null(),
        FilterOperator::Equal => compare(value, &condition.value) == Some(Ordering::Equal),
        FilterOperator::NotEqual => {
            !value.is_null() && compare(value, &condition.value) != Some(Ordering::Equal)
        }
        FilterOperator::GreaterThan => compare(value, &condition.value) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => matches!(
            compare(value, &condition.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::LessThan => compare(value, &condition.value) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare(value, &condition.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Like => match (value, &condition.value) {
            (Value::String(text), FilterValue::String(pattern)) => like(pattern, text),
            _ => false,
        },
        FilterOperator::In => match &condition.value {
            FilterValue::List(candidates) => candidates
                .iter()
                .any(|candidate| compare(value, candidate) == Some(Ordering::Equal)),
            single => compare(value, single) == Some(Ordering::Equal),
        },
    }
}

/// Compare a stored value against a filter value, coercing the filter value
/// to the stored value's type the way a typed column would
fn compare(stored: &Value, wanted: &FilterValue) -> Option<Ordering> {
    match (stored, wanted) {
        (Value::Null, _) => None,
        (Value::Number(a), FilterValue::Integer(b)) => a.as_f64()?.partial_cmp(&(*b as f64)),
        (Value::Number(a), FilterValue::Float(b)) => a.as_f64()?.partial_cmp(b),
        (Value::Number(a), FilterValue::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::Bool(a), FilterValue::Boolean(b)) => Some(a.cmp(b)),
        (Value::String(a), FilterValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::String(a), FilterValue::Integer(b)) => Some(a.as_str().cmp(b.to_string().as_str())),
        (Value::String(a), FilterValue::Float(b)) => Some(a.as_str().cmp(b.to_string().as_str())),
        (Value::String(a), FilterValue::Boolean(b)) => Some(a.as_str().cmp(if *b { "true" } else { "false" })),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

/// Total order for sorting; nulls sort first
fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// SQL LIKE matching: `%` spans any run of characters, `_` exactly one
fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // matched[j] is true when pattern[..i] matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen = seen || matched[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}
