use cutplan_core::PlanningError;
use tracing::{debug, warn};

use crate::model::{CollarettoRow, SharedOrder, Table, TableField, TableHeader};
use crate::store::{Family, TableStore};
use crate::sync::{BagnoPieces, PiecesTarget};

/// Along, weft or bias tables.
///
/// Rows draw their `pieces` from the mattress side through [`BagnoPieces`]:
/// immediately when their own bagno or sizes change, and on every sync
/// event for their bagno.
pub struct CollarettoTables<R> {
    store: TableStore<R>,
    order: SharedOrder,
    pieces: BagnoPieces,
    default_allowance: f64,
}

impl<R> Clone for CollarettoTables<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            order: self.order.clone(),
            pieces: self.pieces.clone(),
            default_allowance: self.default_allowance,
        }
    }
}

impl<R: CollarettoRow> CollarettoTables<R> {
    pub fn new(family: Family, order: SharedOrder, pieces: BagnoPieces, default_allowance: f64) -> Self {
        Self {
            store: TableStore::new(family),
            order,
            pieces,
            default_allowance,
        }
    }

    pub fn family(&self) -> Family {
        self.store.family()
    }

    pub fn store(&self) -> &TableStore<R> {
        &self.store
    }

    pub fn tables(&self) -> Vec<Table<R>> {
        self.store.tables()
    }

    pub fn add_table(&self) -> Result<String, PlanningError> {
        let sizes = self.order.read().unwrap().order_size_names();
        self.store.add_table(&sizes, TableHeader::new(self.default_allowance))
    }

    pub fn remove_table(&self, table_id: &str) -> Result<(), PlanningError> {
        self.store.remove_table(table_id).map(|_| ())
    }

    pub fn update_table(&self, table_id: &str, field: TableField, value: &str) -> Result<(), PlanningError> {
        self.store.update_header(table_id, |h| h.set_field(field, value))
    }

    pub fn add_row(&self, table_id: &str) -> Result<String, PlanningError> {
        self.store.add_row(table_id)
    }

    pub fn remove_row(&self, table_id: &str, row_id: &str) -> Result<(), PlanningError> {
        self.store.remove_row(table_id, row_id).map(|_| ())
    }

    /// Set one field and re-derive the row. A changed size selection must
    /// name sizes of the order; other edits leave the selection unchecked.
    pub fn update_field(&self, table_id: &str, row_id: &str, field: R::Field, value: &str) -> Result<(), PlanningError> {
        let order_sizes = self.order.read().unwrap().order_size_names();
        let pieces = &self.pieces;
        self.store.update_row(table_id, row_id, |row, _| {
            let before = row.sizes().clone();
            row.set_field(field, value)?;
            let unknown = if *row.sizes() == before {
                Vec::new()
            } else {
                row.sizes().unknown_sizes(&order_sizes)
            };
            if !unknown.is_empty() {
                warn!(row_id, ?unknown, "sizes not in order");
                return Err(PlanningError::Validation(format!(
                    "sizes not in order: {}",
                    unknown.join(", ")
                )));
            }
            if R::affects_pieces(field) {
                row.set_pieces(pieces.pieces_for(row.bagno(), row.sizes()));
            }
            Ok(())
        })?;
        debug!(family = self.family().as_str(), row_id, ?field, "field updated");
        Ok(())
    }

    pub(crate) fn install(&self, tables: Vec<Table<R>>) {
        self.store.replace_all(tables);
    }

    pub(crate) fn reset(&self) {
        self.store.clear();
    }
}

impl<R: CollarettoRow> PiecesTarget for CollarettoTables<R> {
    /// Locked rows keep the pieces production planned with.
    fn refresh_bagno(&self, bagno: &str) -> usize {
        let pieces = &self.pieces;
        self.store.refresh_rows(|_, row| {
            if row.bagno() != bagno || !row.is_editable() {
                return false;
            }
            let total = pieces.pieces_for(bagno, row.sizes());
            if total == row.pieces() {
                return false;
            }
            row.set_pieces(total);
            true
        })
    }
}
