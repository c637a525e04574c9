//! In-memory backend for session tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cutplan_client::*;

/// Rows and routings one order answers with.
#[derive(Default, Clone)]
pub struct OrderData {
    pub combinations: Vec<Combination>,
    pub mattress: Vec<MattressRecord>,
    pub along: Vec<AlongRecord>,
    pub weft: Vec<PanelRecord>,
    pub bias: Vec<PanelRecord>,
    /// Delay before answering the combinations call.
    pub delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeApi {
    pub orders: Mutex<HashMap<String, OrderData>>,
    pub fail_combinations: AtomicBool,
    pub fail_filtered: AtomicBool,
    pub fail_rows: AtomicBool,
    pub fail_save: AtomicBool,
    pub pad_print: Mutex<Option<PadPrintRecord>>,
    pub brand: Mutex<Option<String>>,
    pub markers: Mutex<Vec<MarkerRecord>>,
    /// Filter of every mattress fetch, in call order.
    pub fetches: Mutex<Vec<Option<FetchFilter>>>,
    pub saved: Mutex<Vec<SaveBatch>>,
}

impl FakeApi {
    pub fn with_order(order_id: &str, data: OrderData) -> Self {
        let api = Self::default();
        api.insert(order_id, data);
        api
    }

    pub fn insert(&self, order_id: &str, data: OrderData) {
        self.orders.lock().unwrap().insert(order_id.to_string(), data);
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn order(&self, order_id: &str) -> Result<OrderData, ApiError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| ApiError::Backend(format!("order {order_id} not found")))
    }

    /// Failures are injected on the mattress endpoint only, so every
    /// fetch attempt shows up in `fetches`.
    fn rows_allowed(&self, filter: Option<&FetchFilter>) -> Result<(), ApiError> {
        if self.fail_rows.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: 503,
                message: "unavailable".into(),
            });
        }
        if filter.is_some() && self.fail_filtered.load(Ordering::SeqCst) {
            return Err(ApiError::Backend("filter rejected".into()));
        }
        Ok(())
    }
}

/// Rows a filtered fetch returns: the chosen routing plus unassigned tables.
fn keep(header: &TableHeaderRecord, filter: Option<&FetchFilter>) -> bool {
    match filter {
        None => true,
        Some(f) => {
            header.cutting_room.is_empty()
                || (header.cutting_room == f.cutting_room && header.destination == f.destination)
        }
    }
}

#[async_trait]
impl PlanningApi for FakeApi {
    async fn combinations(&self, order_id: &str) -> Result<Vec<Combination>, ApiError> {
        let data = self.order(order_id)?;
        if let Some(delay) = data.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_combinations.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: 500,
                message: "combinations unavailable".into(),
            });
        }
        Ok(data.combinations)
    }

    async fn mattress_rows(&self, order_id: &str, filter: Option<&FetchFilter>) -> Result<Vec<MattressRecord>, ApiError> {
        self.fetches.lock().unwrap().push(filter.cloned());
        self.rows_allowed(filter)?;
        let rows = self.order(order_id)?.mattress;
        Ok(rows.into_iter().filter(|r| keep(&r.table, filter)).collect())
    }

    async fn along_rows(&self, order_id: &str, filter: Option<&FetchFilter>) -> Result<Vec<AlongRecord>, ApiError> {
        let rows = self.order(order_id)?.along;
        Ok(rows.into_iter().filter(|r| keep(&r.table, filter)).collect())
    }

    async fn weft_rows(&self, order_id: &str, filter: Option<&FetchFilter>) -> Result<Vec<PanelRecord>, ApiError> {
        let rows = self.order(order_id)?.weft;
        Ok(rows.into_iter().filter(|r| keep(&r.table, filter)).collect())
    }

    async fn bias_rows(&self, order_id: &str, filter: Option<&FetchFilter>) -> Result<Vec<PanelRecord>, ApiError> {
        let rows = self.order(order_id)?.bias;
        Ok(rows.into_iter().filter(|r| keep(&r.table, filter)).collect())
    }

    async fn pad_print(&self, _: &str, _: &str, _: &str) -> Result<Option<PadPrintRecord>, ApiError> {
        Ok(self.pad_print.lock().unwrap().clone())
    }

    async fn brand(&self, _: &str) -> Result<Option<String>, ApiError> {
        Ok(self.brand.lock().unwrap().clone())
    }

    async fn markers(&self, _: &str, width: &str) -> Result<Vec<MarkerRecord>, ApiError> {
        let width: f64 = width.parse().unwrap_or_default();
        Ok(self
            .markers
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.marker_width == width)
            .cloned()
            .collect())
    }

    async fn save(&self, batch: &SaveBatch) -> Result<(), ApiError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(ApiError::Backend("save rejected".into()));
        }
        self.saved.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn unread_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Record builders
// ============================================================================

pub fn header(table_id: &str, combination: Option<&Combination>) -> TableHeaderRecord {
    let c = combination.cloned().unwrap_or_default();
    TableHeaderRecord {
        table_id: table_id.into(),
        production_center: c.production_center,
        cutting_room: c.cutting_room,
        destination: c.destination,
        fabric_code: "F100".into(),
        allowance: Some(0.02),
        ..Default::default()
    }
}

pub fn mattress(
    table: TableHeaderRecord,
    row_id: &str,
    bagno: &str,
    layers: u32,
    pieces: &[(&str, u32)],
) -> MattressRecord {
    MattressRecord {
        table,
        row_id: row_id.into(),
        mattress_name: format!("M-{row_id}"),
        width: Some(150.0),
        marker_name: "MK1".into(),
        marker_length: Some(3.0),
        efficiency: Some(80.0),
        pieces_per_size: pieces
            .iter()
            .map(|(s, n)| (s.to_string(), *n))
            .collect::<BTreeMap<_, _>>(),
        layers: Some(layers),
        bagno: bagno.into(),
        status: "not_ready".into(),
        sequence_number: 1,
        ..Default::default()
    }
}

pub fn along(table: TableHeaderRecord, row_id: &str, bagno: &str, sizes: &str) -> AlongRecord {
    AlongRecord {
        table,
        row_id: row_id.into(),
        collaretto_name: format!("A-{row_id}"),
        usable_width: Some(150.0),
        theoretical_consumption: Some(1.0),
        collaretto_width: Some(20.0),
        scrap_rolls: Some(1),
        extra_pct: Some(10.0),
        bagno: bagno.into(),
        sizes: sizes.into(),
        sequence_number: 1,
        ..Default::default()
    }
}
