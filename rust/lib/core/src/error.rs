use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable identifiers the UI shell maps to translated snackbar messages.
// Codes never change; messages may be reworded.

pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const MISSING_ORDER_CONTEXT: &str = "MISSING_ORDER_CONTEXT";
    pub const TABLE_LOCKED: &str = "TABLE_LOCKED";
    pub const ROW_LOCKED: &str = "ROW_LOCKED";
    pub const LAST_ROW: &str = "LAST_ROW";
    pub const BACKEND: &str = "BACKEND";
}

// ── PlanningError ───────────────────────────────────────────────────

/// Rejections raised by the planning stores.
///
/// A rejected operation never changes state. Callers log the error and
/// surface it as a transient notification; none of these end the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    /// Table or row id is unknown to the store.
    #[error("{0}")]
    NotFound(String),

    /// Client-side validation failure (bad number, empty name, ...).
    #[error("{0}")]
    Validation(String),

    /// The operation needs order sizes and no order is selected.
    #[error("no order selected: order sizes are unknown")]
    MissingOrderContext,

    /// A table holding a locked row cannot be removed.
    #[error("table '{0}' contains locked rows")]
    TableLocked(String),

    /// The row has been locked by production and is read-only.
    #[error("row '{0}' is locked")]
    RowLocked(String),

    /// A table keeps at least one row.
    #[error("cannot remove the last row of table '{0}'")]
    LastRow(String),

    /// Backend call failed while serving a planning operation.
    #[error("{0}")]
    Backend(String),
}

impl PlanningError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            PlanningError::NotFound(_) => error_code::NOT_FOUND,
            PlanningError::Validation(_) => error_code::VALIDATION_FAILED,
            PlanningError::MissingOrderContext => error_code::MISSING_ORDER_CONTEXT,
            PlanningError::TableLocked(_) => error_code::TABLE_LOCKED,
            PlanningError::RowLocked(_) => error_code::ROW_LOCKED,
            PlanningError::LastRow(_) => error_code::LAST_ROW,
            PlanningError::Backend(_) => error_code::BACKEND,
        }
    }

    pub fn table_not_found(table_id: &str) -> Self {
        PlanningError::NotFound(format!("table '{}' not found", table_id))
    }

    pub fn row_not_found(row_id: &str) -> Self {
        PlanningError::NotFound(format!("row '{}' not found", row_id))
    }
}
