use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use cutplan_client::{Combination, MarkerRecord, PlanningApi, SaveBatch};
use cutplan_core::{PlannerConfig, PlanningError};
use cutplan_flux::{EventBus, Subscription};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaretto::CollarettoTables;
use crate::convert;
use crate::filter::{self, FilterOptions};
use crate::mattress::MattressTables;
use crate::model::{AlongRow, MattressRow, OrderContext, PanelRow, SharedOrder, Table};
use crate::notifications;
use crate::orchestrator::{OrderPhase, OrderState};
use crate::store::Family;
use crate::sync::{self, BagnoPieces, PiecesTarget, SyncScheduler};

/// One planning page: the selected order, its five table families and the
/// machinery connecting them.
///
/// The session owns its bus. Collaretto stores are subscribed for the
/// session's lifetime; dropping the session cancels every pending timer,
/// stops the notification poller and closes the bus.
pub struct PlanningSession {
    pub(crate) config: PlannerConfig,
    pub(crate) api: Arc<dyn PlanningApi>,
    pub(crate) bus: EventBus,
    pub(crate) order: SharedOrder,
    pub(crate) state: Arc<RwLock<OrderState>>,
    /// Bumped on every order selection; background lookups check it.
    pub(crate) selection_seq: Arc<AtomicU64>,
    /// Bumped on every table load; a fetch only installs if still current.
    pub(crate) load_seq: AtomicU64,
    pub(crate) sync: SyncScheduler,
    pub(crate) mattress: MattressTables,
    pub(crate) adhesive: MattressTables,
    pub(crate) along: CollarettoTables<AlongRow>,
    pub(crate) weft: CollarettoTables<PanelRow>,
    pub(crate) bias: CollarettoTables<PanelRow>,
    poller: Mutex<Option<CancellationToken>>,
    _sync_listener: Subscription,
}

/// Everything a view needs to render the page, filtered to the selected
/// combination.
#[derive(Debug, Clone, Serialize)]
pub struct PlanningSnapshot {
    pub order: OrderContext,
    pub state: OrderState,
    pub mattress: Vec<Table<MattressRow>>,
    pub adhesive: Vec<Table<MattressRow>>,
    pub along: Vec<Table<AlongRow>>,
    pub weft: Vec<Table<PanelRow>>,
    pub bias: Vec<Table<PanelRow>>,
}

impl PlanningSession {
    pub fn new(config: PlannerConfig, api: Arc<dyn PlanningApi>) -> Self {
        Self::with_bus(config, api, EventBus::new())
    }

    /// Build a session on a caller-provided bus.
    pub fn with_bus(config: PlannerConfig, api: Arc<dyn PlanningApi>, bus: EventBus) -> Self {
        let order: SharedOrder = Arc::new(RwLock::new(OrderContext::default()));
        let sync = SyncScheduler::new(bus.clone(), config.sync_debounce());
        let allowance = config.default_allowance;

        let mattress = MattressTables::new(
            Family::Mattress,
            order.clone(),
            sync.clone(),
            config.consumption_debounce(),
            allowance,
        );
        let adhesive = MattressTables::new(
            Family::Adhesive,
            order.clone(),
            sync.clone(),
            config.consumption_debounce(),
            allowance,
        );
        let pieces = BagnoPieces::new(vec![mattress.store().clone(), adhesive.store().clone()]);
        let along = CollarettoTables::new(Family::Along, order.clone(), pieces.clone(), allowance);
        let weft = CollarettoTables::new(Family::Weft, order.clone(), pieces.clone(), allowance);
        let bias = CollarettoTables::new(Family::Bias, order.clone(), pieces, allowance);

        let targets: Vec<Arc<dyn PiecesTarget>> = vec![
            Arc::new(along.clone()),
            Arc::new(weft.clone()),
            Arc::new(bias.clone()),
        ];
        let listener = sync::connect(&bus, targets);

        Self {
            config,
            api,
            bus,
            order,
            state: Arc::new(RwLock::new(OrderState::default())),
            selection_seq: Arc::new(AtomicU64::new(0)),
            load_seq: AtomicU64::new(0),
            sync,
            mattress,
            adhesive,
            along,
            weft,
            bias,
            poller: Mutex::new(None),
            _sync_listener: listener,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn order(&self) -> OrderContext {
        self.order.read().unwrap().clone()
    }

    pub fn state(&self) -> OrderState {
        self.state.read().unwrap().clone()
    }

    pub fn phase(&self) -> OrderPhase {
        self.state.read().unwrap().phase
    }

    pub fn mattress(&self) -> &MattressTables {
        &self.mattress
    }

    pub fn adhesive(&self) -> &MattressTables {
        &self.adhesive
    }

    pub fn along(&self) -> &CollarettoTables<AlongRow> {
        &self.along
    }

    pub fn weft(&self) -> &CollarettoTables<PanelRow> {
        &self.weft
    }

    pub fn bias(&self) -> &CollarettoTables<PanelRow> {
        &self.bias
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.state.read().unwrap().options.clone()
    }

    /// Tables visible under the selected combination.
    pub fn snapshot(&self) -> PlanningSnapshot {
        let state = self.state();
        let selected = state.selected.clone();
        let selected = selected.as_ref();
        PlanningSnapshot {
            order: self.order(),
            mattress: filter::visible_tables(self.mattress.store(), selected),
            adhesive: filter::visible_tables(self.adhesive.store(), selected),
            along: filter::visible_tables(self.along.store(), selected),
            weft: filter::visible_tables(self.weft.store(), selected),
            bias: filter::visible_tables(self.bias.store(), selected),
            state,
        }
    }

    // ========================================================================
    // Production-center assignment
    // ========================================================================

    /// Assign a combination to tables of any family. Returns how many changed.
    pub fn assign_combination(&self, table_ids: &[String], combination: &Combination) -> usize {
        filter::assign(self.mattress.store(), table_ids, combination)
            + filter::assign(self.adhesive.store(), table_ids, combination)
            + filter::assign(self.along.store(), table_ids, combination)
            + filter::assign(self.weft.store(), table_ids, combination)
            + filter::assign(self.bias.store(), table_ids, combination)
    }

    /// Move every table on `old` to `new`.
    pub fn retarget_combination(&self, old: &Combination, new: &Combination) -> usize {
        let moved = filter::retarget(self.mattress.store(), old, new)
            + filter::retarget(self.adhesive.store(), old, new)
            + filter::retarget(self.along.store(), old, new)
            + filter::retarget(self.weft.store(), old, new)
            + filter::retarget(self.bias.store(), old, new);
        info!(moved, "tables retargeted");
        moved
    }

    // ========================================================================
    // Backend
    // ========================================================================

    /// Markers of the selected style usable at `width`.
    pub async fn markers(&self, width: &str) -> Result<Vec<MarkerRecord>, PlanningError> {
        let style = {
            let order = self.order.read().unwrap();
            if !order.is_selected() {
                return Err(PlanningError::MissingOrderContext);
            }
            order.style.clone()
        };
        self.api
            .markers(&style, width)
            .await
            .map_err(|e| PlanningError::Backend(e.to_string()))
    }

    /// Write every table and the pending deletions in one batch. The
    /// deletion lists are cleared only once the backend accepts them.
    pub async fn save(&self) -> Result<(), PlanningError> {
        let order = self.order();
        if !order.is_selected() {
            return Err(PlanningError::MissingOrderContext);
        }
        let sizes = order.order_size_names();

        let mut batch = SaveBatch {
            order_id: order.order_id.clone(),
            mattress: convert::mattress_records(Family::Mattress, &self.mattress.tables()),
            along: convert::along_records(&self.along.tables(), &sizes),
            weft: convert::panel_records(&self.weft.tables(), &sizes),
            bias: convert::panel_records(&self.bias.tables(), &sizes),
            ..Default::default()
        };
        batch
            .mattress
            .extend(convert::mattress_records(Family::Adhesive, &self.adhesive.tables()));
        for (names, ids) in self.pending_deletions() {
            batch.deleted_names.extend(names);
            batch.deleted_table_ids.extend(ids);
        }

        if let Err(e) = self.api.save(&batch).await {
            warn!(order_id = %order.order_id, "save failed: {e}");
            return Err(PlanningError::Backend(e.to_string()));
        }

        self.mattress.store().forget_deleted(&batch.deleted_names, &batch.deleted_table_ids);
        self.adhesive.store().forget_deleted(&batch.deleted_names, &batch.deleted_table_ids);
        self.along.store().forget_deleted(&batch.deleted_names, &batch.deleted_table_ids);
        self.weft.store().forget_deleted(&batch.deleted_names, &batch.deleted_table_ids);
        self.bias.store().forget_deleted(&batch.deleted_names, &batch.deleted_table_ids);
        info!(
            order_id = %order.order_id,
            rows = batch.mattress.len() + batch.along.len() + batch.weft.len() + batch.bias.len(),
            deleted = batch.deleted_names.len(),
            "order saved"
        );
        Ok(())
    }

    fn pending_deletions(&self) -> [(Vec<String>, Vec<String>); 5] {
        [
            (self.mattress.store().deleted_names(), self.mattress.store().deleted_table_ids()),
            (self.adhesive.store().deleted_names(), self.adhesive.store().deleted_table_ids()),
            (self.along.store().deleted_names(), self.along.store().deleted_table_ids()),
            (self.weft.store().deleted_names(), self.weft.store().deleted_table_ids()),
            (self.bias.store().deleted_names(), self.bias.store().deleted_table_ids()),
        ]
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Start polling unread notifications. Results are published on
    /// [`notifications::NOTIFICATIONS_TOPIC`]. Calling it again restarts
    /// the poller.
    pub fn start_notifications(&self) {
        let token = notifications::start(
            Arc::clone(&self.api),
            self.bus.clone(),
            self.config.notification_interval(),
        );
        if let Some(previous) = self.poller.lock().unwrap().replace(token) {
            previous.cancel();
        }
    }

    pub fn stop_notifications(&self) {
        if let Some(token) = self.poller.lock().unwrap().take() {
            token.cancel();
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    pub(crate) fn next_load(&self) -> u64 {
        self.load_seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn is_current_load(&self, ticket: u64) -> bool {
        self.load_seq.load(Ordering::Acquire) == ticket
    }

    pub(crate) fn update_state(&self, f: impl FnOnce(&mut OrderState)) {
        f(&mut self.state.write().unwrap());
    }

    /// Empty every store and drop pending timers.
    pub(crate) fn reset_stores(&self) {
        self.sync.cancel_all();
        self.mattress.reset();
        self.adhesive.reset();
        self.along.reset();
        self.weft.reset();
        self.bias.reset();
    }
}

impl Drop for PlanningSession {
    fn drop(&mut self) {
        self.selection_seq.fetch_add(1, Ordering::AcqRel);
        self.stop_notifications();
        self.sync.cancel_all();
        self.mattress.cancel_timers();
        self.adhesive.cancel_timers();
        self.bus.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cutplan_client::MarkerRecord;

    use super::*;
    use crate::model::{MattressField, OrderSelection, OrderSize, PlanningRow};
    use crate::testing::{self, FakeApi, OrderData};

    fn selection() -> OrderSelection {
        OrderSelection {
            order_id: "ORD1".into(),
            style: "ST100".into(),
            sizes: ["S", "M"]
                .iter()
                .map(|s| OrderSize {
                    size: s.to_string(),
                    qty: 20,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Mattress row r1 on B1 (10 layers, S:1 M:2) and two along rows,
    /// one per bagno, with pieces as the backend last saved them.
    fn sync_order() -> OrderData {
        let mut on_b1 = testing::along(testing::header("A1", None), "a1", "B1", "ALL");
        on_b1.pieces = Some(30);
        let mut on_b2 = testing::along(testing::header("A1", None), "a2", "B2", "ALL");
        on_b2.sequence_number = 2;
        OrderData {
            mattress: vec![testing::mattress(
                testing::header("T1", None),
                "r1",
                "B1",
                10,
                &[("S", 1), ("M", 2)],
            )],
            along: vec![on_b1, on_b2],
            ..Default::default()
        }
    }

    async fn loaded(data: OrderData) -> (Arc<FakeApi>, PlanningSession) {
        let api = Arc::new(FakeApi::with_order("ORD1", data));
        let session = PlanningSession::new(PlannerConfig::default(), api.clone());
        session.select_order(Some(selection())).await;
        (api, session)
    }

    fn along_pieces(s: &PlanningSession) -> Vec<(String, u32)> {
        s.along().tables()[0]
            .rows
            .iter()
            .map(|r| (r.bagno.clone(), r.pieces))
            .collect()
    }

    fn pieces(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(b, n)| (b.to_string(), *n)).collect()
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    // ========================================================================
    // Cross-table sync
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn bagno_rename_moves_collaretto_pieces() {
        let (_api, s) = loaded(sync_order()).await;
        assert_eq!(along_pieces(&s), pieces(&[("B1", 30), ("B2", 0)]));

        s.mattress().update_field("T1", "r1", MattressField::Bagno, "B2").unwrap();
        advance(100).await;
        assert_eq!(along_pieces(&s), pieces(&[("B1", 30), ("B2", 0)]));

        advance(300).await;
        assert_eq!(along_pieces(&s), pieces(&[("B1", 0), ("B2", 30)]));
    }

    #[tokio::test(start_paused = true)]
    async fn layer_edits_reach_collaretto_after_quiet_period() {
        let (_api, s) = loaded(sync_order()).await;

        s.mattress().update_field("T1", "r1", MattressField::Layers, "15").unwrap();
        advance(200).await;
        s.mattress().update_field("T1", "r1", MattressField::Layers, "20").unwrap();
        advance(200).await;
        assert_eq!(along_pieces(&s)[0].1, 30);

        advance(200).await;
        assert_eq!(along_pieces(&s)[0].1, 60);
    }

    // ========================================================================
    // Save
    // ========================================================================

    #[tokio::test]
    async fn save_sends_tables_and_clears_deletions() {
        let (api, s) = loaded(sync_order()).await;
        s.along().remove_table("A1").unwrap();

        s.save().await.unwrap();
        let saved = api.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        let batch = &saved[0];
        assert_eq!(batch.order_id, "ORD1");
        assert_eq!(batch.mattress.len(), 1);
        assert!(batch.along.is_empty());
        assert_eq!(batch.deleted_table_ids, vec!["A1"]);
        assert_eq!(batch.deleted_names, vec!["A-a1", "A-a2"]);

        assert!(s.along().store().deleted_table_ids().is_empty());
        assert!(s.along().store().deleted_names().is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_deletions() {
        let (api, s) = loaded(sync_order()).await;
        s.along().remove_table("A1").unwrap();
        FakeApi::fail(&api.fail_save);

        let err = s.save().await.unwrap_err();
        assert_eq!(err.error_code(), "BACKEND");
        assert_eq!(s.along().store().deleted_table_ids(), vec!["A1"]);
    }

    #[tokio::test]
    async fn save_needs_an_order() {
        let s = PlanningSession::new(PlannerConfig::default(), Arc::new(FakeApi::default()));
        assert_eq!(s.save().await.unwrap_err().error_code(), "MISSING_ORDER_CONTEXT");
    }

    // ========================================================================
    // Filtering and assignment
    // ========================================================================

    #[tokio::test]
    async fn snapshot_shows_selected_combination_only() {
        let s1 = Combination::new("PC1", "ZALLI", "SECTOR1");
        let s2 = Combination::new("PC1", "ZALLI", "SECTOR2");
        let (_api, s) = loaded(OrderData {
            combinations: vec![s1.clone(), s2.clone()],
            mattress: vec![
                testing::mattress(testing::header("T1", Some(&s1)), "r1", "B1", 10, &[("S", 1)]),
                testing::mattress(testing::header("T3", None), "r3", "B3", 10, &[("M", 1)]),
            ],
            ..Default::default()
        })
        .await;
        s.apply_filter(s1.clone()).await.unwrap();
        assert_eq!(s.snapshot().mattress.len(), 2);

        assert_eq!(s.assign_combination(&["T3".to_string()], &s2), 1);
        let visible: Vec<String> = s.snapshot().mattress.into_iter().map(|t| t.id).collect();
        assert_eq!(visible, vec!["T1"]);

        assert_eq!(s.retarget_combination(&s1, &s2), 1);
        assert!(s.snapshot().mattress.is_empty());
    }

    #[tokio::test]
    async fn markers_need_an_order() {
        let api = Arc::new(FakeApi::with_order("ORD1", OrderData::default()));
        *api.markers.lock().unwrap() = vec![
            MarkerRecord {
                marker_name: "MK150".into(),
                marker_width: 150.0,
                ..Default::default()
            },
            MarkerRecord {
                marker_name: "MK160".into(),
                marker_width: 160.0,
                ..Default::default()
            },
        ];
        let s = PlanningSession::new(PlannerConfig::default(), api);
        assert_eq!(s.markers("150").await.unwrap_err().error_code(), "MISSING_ORDER_CONTEXT");

        s.select_order(Some(selection())).await;
        let found = s.markers("150").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].marker_name, "MK150");

        let row = s.mattress().add_table().unwrap();
        let row_id = s.mattress().store().table(&row).unwrap().rows[0].id().to_string();
        s.mattress().select_marker(&row, &row_id, &found[0]).unwrap();
        assert_eq!(s.mattress().store().table(&row).unwrap().rows[0].marker_name, "MK150");
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn notifications_publish_until_stopped() {
        let (_api, s) = loaded(OrderData::default()).await;
        let polls = Arc::new(AtomicU64::new(0));
        let p = polls.clone();
        let _sub = s.bus().subscribe(notifications::NOTIFICATIONS_TOPIC, move |_, _| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        s.start_notifications();
        advance(1).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        s.stop_notifications();
        advance(120_000).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_closes_the_bus() {
        let bus = EventBus::new();
        let s = PlanningSession::with_bus(PlannerConfig::default(), Arc::new(FakeApi::default()), bus.clone());
        assert_eq!(bus.listener_count(), 1);
        drop(s);
        assert!(bus.is_closed());
    }
}
