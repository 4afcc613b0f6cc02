//! In-process table.

use super::{DataSource, ScanRequest, WriteSource};
use crate::error::{FeedError, Result};
use crate::filter::{Filter, Row};
use crate::types::RowId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

struct TableState<R> {
    rows: BTreeMap<RowId, R>,
    /// `None` once `u64::MAX` has been handed out.
    next_id: Option<u64>,
}

/// Table of rows held in memory, ordered by id.
pub struct MemoryTable<R> {
    state: RwLock<TableState<R>>,
}

impl<R: Row> MemoryTable<R> {
    /// Create an empty table. The first inserted row gets id 1.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState {
                rows: BTreeMap::new(),
                next_id: Some(1),
            }),
        }
    }

    /// Build a table from existing rows. Later inserts continue after the
    /// highest id present.
    pub fn from_rows(rows: impl IntoIterator<Item = R>) -> Self {
        let rows: BTreeMap<RowId, R> = rows.into_iter().map(|r| (r.id(), r)).collect();
        let next_id = rows.keys().next_back().map_or(Some(1), |id| id.0.checked_add(1));
        Self {
            state: RwLock::new(TableState { rows, next_id }),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }
}

impl<R: Row> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Row> DataSource<R> for MemoryTable<R> {
    fn count(&self, filter: &Filter) -> Result<u64> {
        let state = self.state.read();
        Ok(state.rows.values().filter(|r| filter.matches(*r)).count() as u64)
    }

    fn scan(&self, request: &ScanRequest<'_>) -> Result<Vec<R>> {
        let state = self.state.read();
        let rows = match request.start_after {
            Some(after) => state.rows.range((Bound::Excluded(after), Bound::Unbounded)),
            None => state.rows.range::<RowId, _>(..),
        };
        Ok(request.collect(rows.map(|(_, r)| r)))
    }

    fn get(&self, id: RowId) -> Result<Option<R>> {
        Ok(self.state.read().rows.get(&id).cloned())
    }
}

impl<R: Row> WriteSource<R> for MemoryTable<R> {
    fn insert_with<F>(&self, build: F) -> Result<R>
    where
        F: FnOnce(RowId) -> R,
    {
        let mut state = self.state.write();
        let id = state
            .next_id
            .map(RowId)
            .ok_or_else(|| FeedError::InvalidArgument("row id space exhausted".into()))?;
        let row = build(id);
        state.next_id = id.0.checked_add(1);
        state.rows.insert(id, row.clone());
        Ok(row)
    }

    fn delete(&self, id: RowId) -> Result<bool> {
        Ok(self.state.write().rows.remove(&id).is_some())
    }
}
