use std::sync::Arc;
use std::time::Duration;

use cutplan_client::MarkerRecord;
use cutplan_core::PlanningError;
use cutplan_flux::Debouncer;
use tracing::{debug, info};

use crate::model::{MattressField, MattressRow, PlanningRow, SharedOrder, Table, TableField, TableHeader};
use crate::store::{Family, TableStore};
use crate::sync::{SyncKind, SyncScheduler};

/// Mattress or adhesive tables: the side that drives synchronization.
///
/// Field edits recompute expected consumption after a quiet period and
/// publish layer/bagno changes through the shared [`SyncScheduler`].
#[derive(Clone)]
pub struct MattressTables {
    store: TableStore<MattressRow>,
    order: SharedOrder,
    sync: SyncScheduler,
    /// Expected-consumption recomputes, keyed by row id.
    consumption: Arc<Debouncer<String>>,
    default_allowance: f64,
}

impl MattressTables {
    pub fn new(
        family: Family,
        order: SharedOrder,
        sync: SyncScheduler,
        consumption_delay: Duration,
        default_allowance: f64,
    ) -> Self {
        Self {
            store: TableStore::new(family),
            order,
            sync,
            consumption: Arc::new(Debouncer::new(consumption_delay)),
            default_allowance,
        }
    }

    pub fn family(&self) -> Family {
        self.store.family()
    }

    pub fn store(&self) -> &TableStore<MattressRow> {
        &self.store
    }

    pub fn tables(&self) -> Vec<Table<MattressRow>> {
        self.store.tables()
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub fn add_table(&self) -> Result<String, PlanningError> {
        let sizes = self.order.read().unwrap().order_size_names();
        self.store.add_table(&sizes, TableHeader::new(self.default_allowance))
    }

    pub fn remove_table(&self, table_id: &str) -> Result<(), PlanningError> {
        let table = self.store.remove_table(table_id)?;
        let mut bagni = table.bagni();
        for row in &table.rows {
            self.consumption.cancel(&row.id);
            if let Some(origin) = self.sync.forget_row(&row.id) {
                if !origin.is_empty() && !bagni.contains(&origin) {
                    bagni.push(origin);
                }
            }
        }
        for bagno in &bagni {
            self.sync.publish_now(SyncKind::Pieces, self.family(), bagno);
        }
        Ok(())
    }

    pub fn update_table(&self, table_id: &str, field: TableField, value: &str) -> Result<(), PlanningError> {
        self.store.update_header(table_id, |h| h.set_field(field, value))?;
        if field == TableField::Allowance {
            if let Some(table) = self.store.table(table_id) {
                for row in &table.rows {
                    self.schedule_consumption(table_id, &row.id);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Rows
    // ========================================================================

    pub fn add_row(&self, table_id: &str) -> Result<String, PlanningError> {
        self.store.add_row(table_id)
    }

    pub fn remove_row(&self, table_id: &str, row_id: &str) -> Result<(), PlanningError> {
        let row = self.store.remove_row(table_id, row_id)?;
        self.consumption.cancel(&row.id);
        let origin = self.sync.forget_row(&row.id);
        self.sync.publish_now(SyncKind::Pieces, self.family(), &row.bagno);
        if let Some(origin) = origin.filter(|o| *o != row.bagno) {
            self.sync.publish_now(SyncKind::Pieces, self.family(), &origin);
        }
        Ok(())
    }

    /// Set one field and schedule whatever depends on it.
    pub fn update_field(
        &self,
        table_id: &str,
        row_id: &str,
        field: MattressField,
        value: &str,
    ) -> Result<(), PlanningError> {
        let (effect, bagno) = self.store.update_row(table_id, row_id, |row, _| {
            let effect = row.set_field(field, value)?;
            Ok((effect, row.bagno.clone()))
        })?;
        debug!(family = self.family().as_str(), row_id, ?field, "field updated");

        if effect.recompute_consumption {
            self.schedule_consumption(table_id, row_id);
        }
        if effect.layers_changed {
            self.sync.layers_changed(self.family(), row_id, &bagno);
        }
        if effect.pieces_changed {
            self.sync.pieces_changed(self.family(), row_id, &bagno);
        }
        if let Some(old) = effect.bagno_renamed_from {
            self.sync.bagno_changed(self.family(), row_id, &old, &bagno);
        }
        Ok(())
    }

    /// Copy a marker from the catalog onto the row.
    pub fn select_marker(&self, table_id: &str, row_id: &str, marker: &MarkerRecord) -> Result<(), PlanningError> {
        let bagno = self.store.update_row(table_id, row_id, |row, _| {
            row.apply_marker(marker);
            Ok(row.bagno.clone())
        })?;
        info!(row_id, marker = %marker.marker_name, "marker selected");
        self.schedule_consumption(table_id, row_id);
        self.sync.pieces_changed(self.family(), row_id, &bagno);
        Ok(())
    }

    /// Recompute `expected_consumption` once the row has been quiet for the
    /// consumption delay.
    pub fn recompute_expected_consumption(&self, table_id: &str, row_id: &str) -> Result<(), PlanningError> {
        self.store.read_row(table_id, row_id, |_, _| ())?;
        self.schedule_consumption(table_id, row_id);
        Ok(())
    }

    fn schedule_consumption(&self, table_id: &str, row_id: &str) {
        let store = self.store.clone();
        let table_id = table_id.to_string();
        let key = row_id.to_string();
        let row_id = row_id.to_string();
        self.consumption.call(key, move || {
            let result = store.refresh_row(&table_id, &row_id, |row, header| {
                row.expected_consumption = row.compute_expected_consumption(header.allowance);
                row.expected_consumption
            });
            match result {
                Ok(value) => debug!(row_id = %row_id, ?value, "expected consumption recomputed"),
                Err(_) => debug!(row_id = %row_id, "row gone before consumption recompute"),
            }
        });
    }

    pub fn planned_pieces(&self, table_id: &str, row_id: &str) -> Result<u32, PlanningError> {
        self.store.read_row(table_id, row_id, |row, _| row.planned_pieces())
    }

    pub fn actual_pieces(&self, table_id: &str, row_id: &str) -> Result<u32, PlanningError> {
        self.store.read_row(table_id, row_id, |row, _| row.actual_pieces())
    }

    pub fn pending_recomputes(&self) -> usize {
        self.consumption.pending_count()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub(crate) fn install(&self, tables: Vec<Table<MattressRow>>) {
        self.consumption.cancel_all();
        self.store.replace_all(tables);
    }

    pub(crate) fn reset(&self) {
        self.install(Vec::new());
    }

    pub(crate) fn cancel_timers(&self) {
        self.consumption.cancel_all();
    }
}

impl MattressTables {
    /// Ids of the rows of a table, in order.
    pub fn row_ids(&self, table_id: &str) -> Result<Vec<String>, PlanningError> {
        self.store
            .table(table_id)
            .map(|t| t.rows.iter().map(|r| r.id().to_string()).collect())
            .ok_or_else(|| PlanningError::table_not_found(table_id))
    }
}
