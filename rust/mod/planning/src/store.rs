use std::sync::{Arc, RwLock};

use cutplan_core::PlanningError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{PlanningRow, Table, TableHeader};

/// The five table families an order is planned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Mattress,
    Adhesive,
    Along,
    Weft,
    Bias,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Mattress => "mattress",
            Family::Adhesive => "adhesive",
            Family::Along => "along",
            Family::Weft => "weft",
            Family::Bias => "bias",
        }
    }

    /// Families whose tables cannot be removed while a row is locked.
    pub fn guards_locked_tables(&self) -> bool {
        matches!(self, Family::Mattress | Family::Adhesive)
    }
}

struct StoreState<R> {
    tables: Vec<Table<R>>,
    deleted_names: Vec<String>,
    deleted_table_ids: Vec<String>,
}

/// Ordered tables of one family plus the deletions pending the next save.
///
/// Cloning yields another handle to the same tables, which is how debounce
/// tasks and bus listeners reach the store. Every rejected operation
/// leaves the state exactly as it was.
pub struct TableStore<R> {
    family: Family,
    state: Arc<RwLock<StoreState<R>>>,
}

impl<R> Clone for TableStore<R> {
    fn clone(&self) -> Self {
        Self {
            family: self.family,
            state: Arc::clone(&self.state),
        }
    }
}

impl<R: PlanningRow> TableStore<R> {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            state: Arc::new(RwLock::new(StoreState {
                tables: Vec::new(),
                deleted_names: Vec::new(),
                deleted_table_ids: Vec::new(),
            })),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn tables(&self) -> Vec<Table<R>> {
        self.state.read().unwrap().tables.clone()
    }

    pub fn table(&self, table_id: &str) -> Option<Table<R>> {
        self.state
            .read()
            .unwrap()
            .tables
            .iter()
            .find(|t| t.id == table_id)
            .cloned()
    }

    pub fn table_count(&self) -> usize {
        self.state.read().unwrap().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_count() == 0
    }

    pub fn read_row<T>(
        &self,
        table_id: &str,
        row_id: &str,
        f: impl FnOnce(&R, &TableHeader) -> T,
    ) -> Result<T, PlanningError> {
        let state = self.state.read().unwrap();
        let table = find_table(&state.tables, table_id)?;
        let row = table.row(row_id).ok_or_else(|| PlanningError::row_not_found(row_id))?;
        Ok(f(row, &table.header))
    }

    /// Fold over every row of every table.
    pub fn fold_rows<T>(&self, init: T, mut f: impl FnMut(T, &TableHeader, &R) -> T) -> T {
        let state = self.state.read().unwrap();
        let mut acc = init;
        for table in &state.tables {
            for row in &table.rows {
                acc = f(acc, &table.header, row);
            }
        }
        acc
    }

    /// Backend names of rows removed since the last save.
    pub fn deleted_names(&self) -> Vec<String> {
        self.state.read().unwrap().deleted_names.clone()
    }

    /// Ids of tables removed since the last save.
    pub fn deleted_table_ids(&self) -> Vec<String> {
        self.state.read().unwrap().deleted_table_ids.clone()
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Append a table with one blank row. New rows cover the order's sizes,
    /// so the operation needs them.
    pub fn add_table(&self, order_sizes: &[String], header: TableHeader) -> Result<String, PlanningError> {
        if order_sizes.is_empty() {
            warn!(family = self.family.as_str(), "add table refused: no order sizes");
            return Err(PlanningError::MissingOrderContext);
        }
        let table = Table::new(header);
        let id = table.id.clone();
        self.state.write().unwrap().tables.push(table);
        debug!(family = self.family.as_str(), table_id = %id, "table added");
        Ok(id)
    }

    /// Remove a table and record its saved rows for deletion.
    pub fn remove_table(&self, table_id: &str) -> Result<Table<R>, PlanningError> {
        let mut state = self.state.write().unwrap();
        let idx = state
            .tables
            .iter()
            .position(|t| t.id == table_id)
            .ok_or_else(|| PlanningError::table_not_found(table_id))?;
        if self.family.guards_locked_tables() && state.tables[idx].has_locked_rows() {
            warn!(family = self.family.as_str(), table_id, "remove table refused: locked rows");
            return Err(PlanningError::TableLocked(table_id.to_string()));
        }
        let table = state.tables.remove(idx);
        let names: Vec<String> = table
            .rows
            .iter()
            .map(|r| r.backend_name().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        state.deleted_names.extend(names);
        state.deleted_table_ids.push(table.id.clone());
        debug!(family = self.family.as_str(), table_id, "table removed");
        Ok(table)
    }

    pub fn update_header<T>(
        &self,
        table_id: &str,
        f: impl FnOnce(&mut TableHeader) -> Result<T, PlanningError>,
    ) -> Result<T, PlanningError> {
        let mut state = self.state.write().unwrap();
        let table = find_table_mut(&mut state.tables, table_id)?;
        // Validate on a copy so a rejected edit leaves the header untouched.
        let mut header = table.header.clone();
        let out = f(&mut header)?;
        table.header = header;
        Ok(out)
    }

    /// Apply `f` to every table header; returns how many it reported as
    /// changed.
    pub fn update_tables(&self, mut f: impl FnMut(&str, &mut TableHeader) -> bool) -> usize {
        let mut state = self.state.write().unwrap();
        let mut changed = 0;
        for table in state.tables.iter_mut() {
            if f(table.id.as_str(), &mut table.header) {
                changed += 1;
            }
        }
        changed
    }

    // ========================================================================
    // Rows
    // ========================================================================

    pub fn add_row(&self, table_id: &str) -> Result<String, PlanningError> {
        let mut state = self.state.write().unwrap();
        let table = find_table_mut(&mut state.tables, table_id)?;
        let row = R::blank(table.next_sequence_number());
        let id = row.id().to_string();
        table.rows.push(row);
        Ok(id)
    }

    pub fn remove_row(&self, table_id: &str, row_id: &str) -> Result<R, PlanningError> {
        let mut state = self.state.write().unwrap();
        let table = find_table_mut(&mut state.tables, table_id)?;
        let idx = table
            .rows
            .iter()
            .position(|r| r.id() == row_id)
            .ok_or_else(|| PlanningError::row_not_found(row_id))?;
        if !table.rows[idx].is_editable() {
            warn!(family = self.family.as_str(), table_id, row_id, "remove row refused: locked");
            return Err(PlanningError::RowLocked(row_id.to_string()));
        }
        if table.rows.len() == 1 {
            warn!(family = self.family.as_str(), table_id, "remove row refused: last row");
            return Err(PlanningError::LastRow(table_id.to_string()));
        }
        let row = table.rows.remove(idx);
        if !row.backend_name().is_empty() {
            state.deleted_names.push(row.backend_name().to_string());
        }
        Ok(row)
    }

    /// Edit an editable row. `f` works on a copy that only replaces the
    /// stored row when it returns `Ok`.
    pub fn update_row<T>(
        &self,
        table_id: &str,
        row_id: &str,
        f: impl FnOnce(&mut R, &TableHeader) -> Result<T, PlanningError>,
    ) -> Result<T, PlanningError> {
        let mut state = self.state.write().unwrap();
        let table = find_table_mut(&mut state.tables, table_id)?;
        let header = table.header.clone();
        let row = table.row_mut(row_id).ok_or_else(|| PlanningError::row_not_found(row_id))?;
        if !row.is_editable() {
            warn!(family = self.family.as_str(), table_id, row_id, "edit refused: row locked");
            return Err(PlanningError::RowLocked(row_id.to_string()));
        }
        let mut draft = row.clone();
        let out = f(&mut draft, &header)?;
        *row = draft;
        Ok(out)
    }

    /// Write derived values into a row whether or not it is locked.
    pub(crate) fn refresh_row<T>(
        &self,
        table_id: &str,
        row_id: &str,
        f: impl FnOnce(&mut R, &TableHeader) -> T,
    ) -> Result<T, PlanningError> {
        let mut state = self.state.write().unwrap();
        let table = find_table_mut(&mut state.tables, table_id)?;
        let header = table.header.clone();
        let row = table.row_mut(row_id).ok_or_else(|| PlanningError::row_not_found(row_id))?;
        Ok(f(row, &header))
    }

    /// Apply `f` to every row; returns how many it reported as changed.
    pub(crate) fn refresh_rows(&self, mut f: impl FnMut(&TableHeader, &mut R) -> bool) -> usize {
        let mut state = self.state.write().unwrap();
        let mut changed = 0;
        for table in state.tables.iter_mut() {
            for row in table.rows.iter_mut() {
                if f(&table.header, row) {
                    changed += 1;
                }
            }
        }
        changed
    }

    // ========================================================================
    // Bulk
    // ========================================================================

    /// Install freshly loaded tables. Pending deletions belong to the
    /// previous contents and are dropped.
    pub fn replace_all(&self, tables: Vec<Table<R>>) {
        let mut state = self.state.write().unwrap();
        debug!(family = self.family.as_str(), tables = tables.len(), "store populated");
        state.tables = tables;
        state.deleted_names.clear();
        state.deleted_table_ids.clear();
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    /// Drop deletions that a save has written. Entries recorded after the
    /// save started are kept.
    pub fn forget_deleted(&self, names: &[String], table_ids: &[String]) {
        let mut state = self.state.write().unwrap();
        state.deleted_names.retain(|n| !names.contains(n));
        state.deleted_table_ids.retain(|id| !table_ids.contains(id));
    }
}

fn find_table<'a, R>(tables: &'a [Table<R>], table_id: &str) -> Result<&'a Table<R>, PlanningError> {
    tables
        .iter()
        .find(|t| t.id == table_id)
        .ok_or_else(|| PlanningError::table_not_found(table_id))
}

fn find_table_mut<'a, R>(
    tables: &'a mut [Table<R>],
    table_id: &str,
) -> Result<&'a mut Table<R>, PlanningError> {
    tables
        .iter_mut()
        .find(|t| t.id == table_id)
        .ok_or_else(|| PlanningError::table_not_found(table_id))
}
