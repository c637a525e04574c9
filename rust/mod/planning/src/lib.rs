//! Cut-planning state engine.
//!
//! A [`PlanningSession`] holds one order's mattress, adhesive, along, weft
//! and bias tables. Mattress-side edits recompute consumption locally and
//! publish bagno changes on the session's bus; collaretto tables listen and
//! pull their pieces from the mattress rows sharing the bagno.
//!
//! ```text
//! select_order ──► combinations ──► filter decision ──► fetch ──► stores
//!                                        │
//!                                        └─► wait for apply_filter
//! mattress edit ──► debounce ──► sync/{layers,pieces}/{bagno} ──► collaretto refresh
//! ```

pub mod collaretto;
pub mod convert;
pub mod filter;
pub mod mattress;
pub mod model;
pub mod notifications;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use collaretto::CollarettoTables;
pub use filter::{FilterDecision, FilterOptions};
pub use mattress::MattressTables;
pub use orchestrator::{OrderPhase, OrderState};
pub use session::{PlanningSession, PlanningSnapshot};
pub use store::{Family, TableStore};
pub use sync::{SyncEvent, SyncKind};
