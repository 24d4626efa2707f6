//! Optimistic changes
//!
//! A submit or delete shows its effect before the backend answers. Each tentative
//! change is begun with [`begin_insert`](PendingChanges::begin_insert) or
//! [`begin_remove`](PendingChanges::begin_remove), and later ended exactly once with
//! [`confirm`](PendingChanges::confirm) or [`rollback`](PendingChanges::rollback).
//! [`apply_to`](PendingChanges::apply_to) overlays the open changes on a snapshot.

use std::fmt;

use crate::fields::{BugRow, RecordId};

/// Handle for one tentative change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeId(u64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending-{}", self.0)
    }
}

/// A tentative change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Insert(BugRow),
    Remove(RecordId),
}

/// Open tentative changes, in the order they were begun.
#[derive(Clone, Debug, Default)]
pub struct PendingChanges {
    next_id: u64,
    open: Vec<(ChangeId, Change)>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, change: Change) -> ChangeId {
        self.next_id += 1;
        let id = ChangeId(self.next_id);
        self.open.push((id, change));
        id
    }

    /// Shows `row` until the change ends.
    pub fn begin_insert(&mut self, row: BugRow) -> ChangeId {
        self.begin(Change::Insert(row))
    }

    /// Like [`begin_insert`](Self::begin_insert), for a row keyed by its change id.
    pub fn begin_insert_with(&mut self, make_row: impl FnOnce(ChangeId) -> BugRow) -> ChangeId {
        let id = ChangeId(self.next_id + 1);
        let started = self.begin(Change::Insert(make_row(id)));
        debug_assert_eq!(id, started);
        started
    }

    /// Hides the record with `id` until the change ends.
    pub fn begin_remove(&mut self, id: RecordId) -> ChangeId {
        self.begin(Change::Remove(id))
    }

    fn end(&mut self, id: ChangeId) -> Option<Change> {
        let pos = self.open.iter().position(|(open, _)| *open == id)?;
        Some(self.open.remove(pos).1)
    }

    /// Ends a change the backend accepted. Returns the change so the caller can
    /// fold it into its snapshot; `None` if it already ended.
    pub fn confirm(&mut self, id: ChangeId) -> Option<Change> {
        self.end(id)
    }

    /// Ends a change the backend rejected; its effect disappears.
    pub fn rollback(&mut self, id: ChangeId) -> Option<Change> {
        self.end(id)
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Returns true if a removal of `id` is in flight.
    pub fn is_removing(&self, id: &RecordId) -> bool {
        self.open
            .iter()
            .any(|(_, change)| matches!(change, Change::Remove(removing) if removing == id))
    }

    /// Snapshot rows with open removals hidden and open inserts appended.
    pub fn apply_to(&self, rows: &[BugRow]) -> Vec<BugRow> {
        let mut out: Vec<BugRow> = rows
            .iter()
            .filter(|row| !self.is_removing(&row.id))
            .cloned()
            .collect();
        out.extend(self.open.iter().filter_map(|(_, change)| match change {
            Change::Insert(row) if !self.is_removing(&row.id) => Some(row.clone()),
            _ => None,
        }));
        out
    }
}

/// Folds a confirmed change into a snapshot.
pub fn fold_into(rows: &mut Vec<BugRow>, change: Change) {
    match change {
        Change::Insert(row) => rows.push(row),
        Change::Remove(id) => rows.retain(|row| row.id != id),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(id: i64) -> BugRow {
        BugRow::from_record(&json!({"id": id, "summary": format!("bug {id}")}))
    }

    #[test]
    fn insert_visible_until_rollback() {
        let snapshot = vec![row(1), row(2)];
        let mut pending = PendingChanges::new();
        let change = pending.begin_insert(row(3));
        assert_eq!(pending.apply_to(&snapshot).len(), 3);

        assert_eq!(pending.rollback(change), Some(Change::Insert(row(3))));
        assert!(pending.is_empty());
        assert_eq!(pending.apply_to(&snapshot), snapshot);
        // a change ends only once
        assert_eq!(pending.confirm(change), None);
    }

    #[test]
    fn remove_hidden_until_rollback() {
        let snapshot = vec![row(1), row(2)];
        let mut pending = PendingChanges::new();
        let keyed = pending.begin_insert_with(|id| {
            BugRow::from_record(&json!({"id": id.to_string(), "summary": "tentative"}))
        });
        assert_eq!(
            pending.apply_to(&[]).first().map(|r| r.id.to_string()),
            Some(keyed.to_string())
        );
        pending.rollback(keyed);
        let change = pending.begin_remove(RecordId::Int(1));
        assert!(pending.is_removing(&RecordId::Int(1)));
        assert_eq!(pending.apply_to(&snapshot), vec![row(2)]);
        pending.rollback(change);
        assert_eq!(pending.apply_to(&snapshot), snapshot);
    }

    #[test]
    fn confirm_folds_into_snapshot() {
        let mut snapshot = vec![row(1), row(2)];
        let mut pending = PendingChanges::new();
        let add = pending.begin_insert(row(9));
        let del = pending.begin_remove(RecordId::Int(2));
        assert_ne!(add, del);
        assert_eq!(pending.len(), 2);

        for id in [add, del] {
            let change = pending.confirm(id).expect("open change");
            fold_into(&mut snapshot, change);
        }
        assert_eq!(snapshot, vec![row(1), row(9)]);
        assert!(pending.is_empty());
    }
}
