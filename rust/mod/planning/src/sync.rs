//! Bagno synchronization between the mattress side and collaretto tables.
//!
//! Mattress and adhesive stores publish on `sync/layers/{bagno}` and
//! `sync/pieces/{bagno}`; every collaretto store listens on `sync/#` and
//! recomputes the pieces of its rows sharing that bagno. Listeners always
//! recompute from current state, so a repeated event changes nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cutplan_flux::{Debouncer, EventBus, Subscription};
use serde::Serialize;
use tracing::{debug, trace};

use crate::model::{MattressRow, SizeSelection};
use crate::store::{Family, TableStore};

/// Pattern matching every synchronization topic.
pub const SYNC_PATTERN: &str = "sync/#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Layers,
    Pieces,
}

impl SyncKind {
    fn prefix(&self) -> &'static str {
        match self {
            SyncKind::Layers => "sync/layers",
            SyncKind::Pieces => "sync/pieces",
        }
    }
}

/// Topic for a bagno. The bagno is escaped so it stays one topic level.
pub fn topic(kind: SyncKind, bagno: &str) -> String {
    format!("{}/{}", kind.prefix(), escape_level(bagno))
}

fn escape_level(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '+' => out.push_str("%2B"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

/// Payload of every synchronization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEvent {
    pub kind: SyncKind,
    pub bagno: String,
    pub source: Family,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SyncField {
    Layers,
    Pieces,
    Bagno,
}

/// Debounce key: one timer per (row, field).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    row_id: String,
    field: SyncField,
}

// ============================================================================
// Publisher
// ============================================================================

/// Debounced publisher used by the mattress and adhesive stores.
///
/// A bagno edit burst on one row (B1 -> B -> B2) publishes once, for the
/// final bagno and for the bagno the row had before the burst started.
#[derive(Clone)]
pub struct SyncScheduler {
    bus: EventBus,
    debouncer: Arc<Debouncer<SyncKey>>,
    /// Bagno each row had when its current rename burst began.
    burst_origin: Arc<Mutex<HashMap<String, String>>>,
}

impl SyncScheduler {
    pub fn new(bus: EventBus, delay: Duration) -> Self {
        Self {
            bus,
            debouncer: Arc::new(Debouncer::new(delay)),
            burst_origin: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn layers_changed(&self, source: Family, row_id: &str, bagno: &str) {
        self.schedule(SyncKind::Layers, SyncField::Layers, source, row_id, bagno);
    }

    pub fn pieces_changed(&self, source: Family, row_id: &str, bagno: &str) {
        self.schedule(SyncKind::Pieces, SyncField::Pieces, source, row_id, bagno);
    }

    fn schedule(&self, kind: SyncKind, field: SyncField, source: Family, row_id: &str, bagno: &str) {
        if bagno.is_empty() {
            trace!(row_id, ?kind, "no bagno, nothing to sync");
            return;
        }
        let key = SyncKey {
            row_id: row_id.to_string(),
            field,
        };
        let bus = self.bus.clone();
        let bagno = bagno.to_string();
        self.debouncer.call(key, move || {
            publish(&bus, kind, source, &bagno);
        });
    }

    pub fn bagno_changed(&self, source: Family, row_id: &str, old: &str, new: &str) {
        self.burst_origin
            .lock()
            .unwrap()
            .entry(row_id.to_string())
            .or_insert_with(|| old.to_string());

        let key = SyncKey {
            row_id: row_id.to_string(),
            field: SyncField::Bagno,
        };
        let bus = self.bus.clone();
        let origins = Arc::clone(&self.burst_origin);
        let row_id = row_id.to_string();
        let new = new.to_string();
        self.debouncer.call(key, move || {
            let old = origins.lock().unwrap().remove(&row_id).unwrap_or_default();
            if !new.is_empty() {
                publish(&bus, SyncKind::Pieces, source, &new);
            }
            if !old.is_empty() && old != new {
                publish(&bus, SyncKind::Pieces, source, &old);
            }
        });
    }

    /// Publish without debouncing (row and table removal).
    pub fn publish_now(&self, kind: SyncKind, source: Family, bagno: &str) -> usize {
        if bagno.is_empty() {
            return 0;
        }
        publish(&self.bus, kind, source, bagno)
    }

    /// Cancel a removed row's timers. Returns the bagno its unfinished
    /// rename burst started from, which still needs a refresh.
    pub fn forget_row(&self, row_id: &str) -> Option<String> {
        for field in [SyncField::Layers, SyncField::Pieces, SyncField::Bagno] {
            self.debouncer.cancel(&SyncKey {
                row_id: row_id.to_string(),
                field,
            });
        }
        self.burst_origin.lock().unwrap().remove(row_id)
    }

    pub fn cancel_all(&self) {
        self.debouncer.cancel_all();
        self.burst_origin.lock().unwrap().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.debouncer.pending_count()
    }
}

fn publish(bus: &EventBus, kind: SyncKind, source: Family, bagno: &str) -> usize {
    let topic = topic(kind, bagno);
    let reached = bus.publish(
        &topic,
        SyncEvent {
            kind,
            bagno: bagno.to_string(),
            source,
        },
    );
    debug!(topic = %topic, reached, source = source.as_str(), "sync event");
    reached
}

// ============================================================================
// Listener side
// ============================================================================

/// Planned pieces available per bagno, read from the mattress side.
#[derive(Clone)]
pub struct BagnoPieces {
    sources: Vec<TableStore<MattressRow>>,
}

impl BagnoPieces {
    pub fn new(sources: Vec<TableStore<MattressRow>>) -> Self {
        Self { sources }
    }

    /// Sum of planned pieces of the selected sizes over every row with
    /// this bagno.
    pub fn pieces_for(&self, bagno: &str, sizes: &SizeSelection) -> u32 {
        if bagno.is_empty() {
            return 0;
        }
        self.sources
            .iter()
            .map(|store| {
                store.fold_rows(0u32, |acc, _, row| {
                    if row.bagno == bagno {
                        acc.saturating_add(row.planned_pieces_for(sizes))
                    } else {
                        acc
                    }
                })
            })
            .fold(0, u32::saturating_add)
    }
}

/// A store that refreshes its rows when a bagno's pieces change.
pub trait PiecesTarget: Send + Sync + 'static {
    /// Recompute rows with this bagno; returns how many changed.
    fn refresh_bagno(&self, bagno: &str) -> usize;
}

/// Register the collaretto targets on the bus. They stay registered until
/// the returned guard is dropped.
pub fn connect(bus: &EventBus, targets: Vec<Arc<dyn PiecesTarget>>) -> Subscription {
    bus.subscribe(SYNC_PATTERN, move |topic, payload| {
        let Some(event) = payload.downcast_ref::<SyncEvent>() else {
            trace!(topic, "ignoring foreign payload on sync topic");
            return;
        };
        let changed: usize = targets.iter().map(|t| t.refresh_bagno(&event.bagno)).sum();
        debug!(bagno = %event.bagno, kind = ?event.kind, changed, "collaretto pieces refreshed");
    })
}
