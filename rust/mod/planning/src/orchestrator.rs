//! Order change orchestration.
//!
//! Selecting an order walks `Idle -> CombinationsLoading -> SinglePath |
//! MultiPathWaitingForFilter -> Populated`. Every step that can fail falls
//! back to an unfiltered fetch. A load only installs its tables if no newer
//! selection or filter started meanwhile.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cutplan_client::{AlongRecord, ApiError, Combination, FetchFilter, MattressRecord, PanelRecord};
use cutplan_core::PlanningError;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::convert;
use crate::filter::{self, FilterDecision, FilterOptions};
use crate::model::{OrderContext, OrderSelection};
use crate::session::PlanningSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPhase {
    #[default]
    Idle,
    CombinationsLoading,
    SinglePath,
    MultiPathWaitingForFilter,
    Populated,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderState {
    pub phase: OrderPhase,
    pub combinations: Vec<Combination>,
    /// Combination the tables were fetched with, if any.
    pub selected: Option<Combination>,
    pub options: FilterOptions,
    /// Last load failure, cleared by the next successful load.
    pub error: Option<String>,
}

struct Fetched {
    mattress: Vec<MattressRecord>,
    along: Vec<AlongRecord>,
    weft: Vec<PanelRecord>,
    bias: Vec<PanelRecord>,
}

impl PlanningSession {
    /// Switch the session to another order, or clear it with `None`.
    ///
    /// Returns the phase reached: `Populated`, `MultiPathWaitingForFilter`
    /// or `Idle`.
    pub async fn select_order(&self, selection: Option<OrderSelection>) -> OrderPhase {
        self.selection_seq.fetch_add(1, Ordering::AcqRel);
        let ticket = self.next_load();
        self.reset_stores();

        let Some(selection) = selection.filter(|s| !s.order_id.is_empty()) else {
            *self.order.write().unwrap() = OrderContext::default();
            *self.state.write().unwrap() = OrderState::default();
            info!("order cleared");
            return OrderPhase::Idle;
        };

        let order_id = selection.order_id.clone();
        info!(%order_id, style = %selection.style, "order selected");
        *self.order.write().unwrap() = OrderContext::from_selection(selection);
        *self.state.write().unwrap() = OrderState {
            phase: OrderPhase::CombinationsLoading,
            ..Default::default()
        };
        self.spawn_order_details();

        let combinations = match self.api.combinations(&order_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(%order_id, "combinations fetch failed, loading unfiltered: {e}");
                if !self.is_current_load(ticket) {
                    return self.phase();
                }
                self.update_state(|s| s.phase = OrderPhase::SinglePath);
                self.load(ticket, &order_id, None).await;
                return self.phase();
            }
        };
        if !self.is_current_load(ticket) {
            debug!(%order_id, "discarding combinations of a superseded selection");
            return self.phase();
        }

        let decision = filter::decide(&combinations, &self.config);
        debug!(%order_id, count = combinations.len(), ?decision, "combinations loaded");
        self.update_state(|s| {
            s.options = FilterOptions::from_combinations(&combinations);
            s.combinations = combinations;
        });

        match decision {
            FilterDecision::Unfiltered => {
                self.update_state(|s| s.phase = OrderPhase::SinglePath);
                self.load(ticket, &order_id, None).await;
            }
            FilterDecision::AutoSelect(combination) => {
                let fetch_filter = FetchFilter::from(&combination);
                self.update_state(|s| {
                    s.selected = Some(combination);
                    s.phase = OrderPhase::SinglePath;
                });
                self.load(ticket, &order_id, Some(fetch_filter)).await;
            }
            FilterDecision::AwaitUser => {
                info!(%order_id, "waiting for destination choice");
                self.update_state(|s| s.phase = OrderPhase::MultiPathWaitingForFilter);
            }
        }
        self.phase()
    }

    /// Fetch the order's tables for one combination. Completes the
    /// waiting state, or switches an already populated order.
    pub async fn apply_filter(&self, combination: Combination) -> Result<(), PlanningError> {
        let order_id = {
            let order = self.order.read().unwrap();
            if !order.is_selected() {
                return Err(PlanningError::MissingOrderContext);
            }
            order.order_id.clone()
        };
        {
            let state = self.state.read().unwrap();
            if !state.combinations.is_empty() && !state.combinations.contains(&combination) {
                return Err(PlanningError::Validation(format!(
                    "{}/{}/{} is not a routing of order {}",
                    combination.production_center, combination.cutting_room, combination.destination, order_id
                )));
            }
        }

        let ticket = self.next_load();
        info!(
            %order_id,
            cutting_room = %combination.cutting_room,
            destination = %combination.destination,
            "filter applied"
        );
        let fetch_filter = FetchFilter::from(&combination);
        self.update_state(|s| {
            s.selected = Some(combination);
            s.phase = OrderPhase::SinglePath;
        });
        self.populate(ticket, &order_id, Some(fetch_filter)).await
    }

    /// Populate for `select_order`, which reports through state only.
    async fn load(&self, ticket: u64, order_id: &str, fetch_filter: Option<FetchFilter>) {
        if let Err(e) = self.populate(ticket, order_id, fetch_filter).await {
            debug!(order_id, "load failed, error kept in state: {e}");
        }
    }

    /// Fetch and install every family. A filtered failure is retried
    /// unfiltered; a second failure leaves the stores empty.
    async fn populate(&self, ticket: u64, order_id: &str, fetch_filter: Option<FetchFilter>) -> Result<(), PlanningError> {
        let result = match (self.fetch(order_id, fetch_filter.as_ref()).await, &fetch_filter) {
            (Err(e), Some(f)) => {
                warn!(
                    order_id,
                    cutting_room = %f.cutting_room,
                    destination = %f.destination,
                    "filtered fetch failed, retrying unfiltered: {e}"
                );
                self.fetch(order_id, None).await
            }
            (result, _) => result,
        };

        if !self.is_current_load(ticket) {
            debug!(order_id, "discarding tables of a superseded load");
            return Ok(());
        }

        match result {
            Ok(fetched) => {
                self.install(fetched);
                self.update_state(|s| {
                    s.phase = OrderPhase::Populated;
                    s.error = None;
                });
                info!(
                    order_id,
                    mattress = self.mattress.store().table_count(),
                    adhesive = self.adhesive.store().table_count(),
                    along = self.along.store().table_count(),
                    weft = self.weft.store().table_count(),
                    bias = self.bias.store().table_count(),
                    "order populated"
                );
                Ok(())
            }
            Err(e) => {
                error!(order_id, "table fetch failed: {e}");
                self.reset_stores();
                let message = e.to_string();
                self.update_state(|s| {
                    s.phase = OrderPhase::Populated;
                    s.error = Some(message.clone());
                });
                Err(PlanningError::Backend(message))
            }
        }
    }

    async fn fetch(&self, order_id: &str, fetch_filter: Option<&FetchFilter>) -> Result<Fetched, ApiError> {
        let (mattress, along, weft, bias) = tokio::try_join!(
            self.api.mattress_rows(order_id, fetch_filter),
            self.api.along_rows(order_id, fetch_filter),
            self.api.weft_rows(order_id, fetch_filter),
            self.api.bias_rows(order_id, fetch_filter),
        )?;
        Ok(Fetched {
            mattress,
            along,
            weft,
            bias,
        })
    }

    fn install(&self, fetched: Fetched) {
        let allowance = self.config.default_allowance;
        self.sync.cancel_all();
        let (mattress, adhesive) = convert::mattress_tables(fetched.mattress, allowance);
        self.mattress.install(mattress);
        self.adhesive.install(adhesive);
        self.along.install(convert::along_tables(fetched.along, allowance));
        self.weft.install(convert::panel_tables(fetched.weft, allowance));
        self.bias.install(convert::panel_tables(fetched.bias, allowance));
    }

    /// Look up pad print and brand in the background. Results land in the
    /// order context only if the same selection is still active.
    fn spawn_order_details(&self) {
        let (style, season, color) = {
            let order = self.order.read().unwrap();
            (order.style.clone(), order.season.clone(), order.color_code.clone())
        };
        if style.is_empty() {
            return;
        }
        let seq = self.selection_seq.load(Ordering::Acquire);

        {
            let api = Arc::clone(&self.api);
            let order = self.order.clone();
            let selection = self.selection_seq.clone();
            let style = style.clone();
            tokio::spawn(async move {
                match api.pad_print(&style, &season, &color).await {
                    Ok(found) => {
                        if selection.load(Ordering::Acquire) == seq {
                            order.write().unwrap().pad_print = found;
                        }
                    }
                    Err(e) => warn!(%style, "pad print lookup failed: {e}"),
                }
            });
        }

        let api = Arc::clone(&self.api);
        let order = self.order.clone();
        let selection = self.selection_seq.clone();
        tokio::spawn(async move {
            match api.brand(&style).await {
                Ok(found) => {
                    if selection.load(Ordering::Acquire) == seq {
                        order.write().unwrap().brand = found;
                    }
                }
                Err(e) => warn!(%style, "brand lookup failed: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cutplan_client::PadPrintRecord;
    use cutplan_core::PlannerConfig;

    use super::*;
    use crate::model::OrderSize;
    use crate::testing::{self, FakeApi, OrderData};

    fn selection(order_id: &str) -> OrderSelection {
        OrderSelection {
            order_id: order_id.into(),
            season: "FW26".into(),
            style: "ST100".into(),
            color_code: "001".into(),
            sizes: ["S", "M", "L"]
                .iter()
                .map(|s| OrderSize {
                    size: s.to_string(),
                    qty: 10,
                })
                .collect(),
        }
    }

    fn session(api: Arc<FakeApi>) -> PlanningSession {
        PlanningSession::new(PlannerConfig::default(), api)
    }

    fn zalli(dest: &str) -> Combination {
        Combination::new("PC1", "ZALLI", dest)
    }

    /// Two mattress tables on different ZALLI sectors plus one unassigned.
    fn zalli_order() -> OrderData {
        let s1 = zalli("SECTOR1");
        let s2 = zalli("SECTOR2");
        OrderData {
            combinations: vec![s1.clone(), s2.clone()],
            mattress: vec![
                testing::mattress(testing::header("T1", Some(&s1)), "r1", "B1", 10, &[("S", 1)]),
                testing::mattress(testing::header("T2", Some(&s2)), "r2", "B2", 10, &[("M", 1)]),
                testing::mattress(testing::header("T3", None), "r3", "B3", 10, &[("L", 1)]),
            ],
            ..Default::default()
        }
    }

    fn table_ids(session: &PlanningSession) -> Vec<String> {
        session.mattress().tables().into_iter().map(|t| t.id).collect()
    }

    // ========================================================================
    // Combination decisions
    // ========================================================================

    #[tokio::test]
    async fn zero_combinations_fetch_unfiltered() {
        let api = Arc::new(FakeApi::with_order(
            "ORD1",
            OrderData {
                mattress: vec![testing::mattress(testing::header("T1", None), "r1", "B1", 10, &[("S", 2)])],
                ..Default::default()
            },
        ));
        let s = session(api.clone());

        assert_eq!(s.select_order(Some(selection("ORD1"))).await, OrderPhase::Populated);
        assert_eq!(*api.fetches.lock().unwrap(), vec![None]);
        assert_eq!(table_ids(&s), vec!["T1"]);
        assert!(s.state().selected.is_none());
    }

    #[tokio::test]
    async fn single_combination_is_auto_selected() {
        let only = Combination::new("PC1", "ROOM1", "D1");
        let api = Arc::new(FakeApi::with_order(
            "ORD1",
            OrderData {
                combinations: vec![only.clone()],
                ..Default::default()
            },
        ));
        let s = session(api.clone());

        assert_eq!(s.select_order(Some(selection("ORD1"))).await, OrderPhase::Populated);
        assert_eq!(s.state().selected, Some(only.clone()));
        assert_eq!(*api.fetches.lock().unwrap(), vec![Some(FetchFilter::from(&only))]);
    }

    #[tokio::test]
    async fn multi_destination_room_waits_then_applies_filter() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        let s = session(api.clone());

        let phase = s.select_order(Some(selection("ORD1"))).await;
        assert_eq!(phase, OrderPhase::MultiPathWaitingForFilter);
        assert!(s.mattress().store().is_empty());
        assert!(api.fetches.lock().unwrap().is_empty());
        assert_eq!(s.filter_options().destinations, vec!["SECTOR1", "SECTOR2"]);

        s.apply_filter(zalli("SECTOR2")).await.unwrap();
        assert_eq!(s.phase(), OrderPhase::Populated);
        assert_eq!(table_ids(&s), vec!["T2", "T3"]);
    }

    #[tokio::test]
    async fn apply_filter_rejects_foreign_combination() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        let s = session(api);
        s.select_order(Some(selection("ORD1"))).await;

        let err = s.apply_filter(Combination::new("PC9", "ROOM9", "D9")).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(s.phase(), OrderPhase::MultiPathWaitingForFilter);
    }

    #[tokio::test]
    async fn apply_filter_needs_an_order() {
        let s = session(Arc::new(FakeApi::default()));
        let err = s.apply_filter(zalli("SECTOR1")).await.unwrap_err();
        assert_eq!(err.error_code(), "MISSING_ORDER_CONTEXT");
    }

    // ========================================================================
    // Reset and fallbacks
    // ========================================================================

    #[tokio::test]
    async fn none_selection_resets_everything() {
        let api = Arc::new(FakeApi::with_order(
            "ORD1",
            OrderData {
                mattress: vec![testing::mattress(testing::header("T1", None), "r1", "B1", 10, &[("S", 2)])],
                ..Default::default()
            },
        ));
        let s = session(api);
        s.select_order(Some(selection("ORD1"))).await;
        assert!(!s.mattress().store().is_empty());

        assert_eq!(s.select_order(None).await, OrderPhase::Idle);
        let order = s.order();
        assert!(!order.is_selected());
        assert!(order.season.is_empty() && order.style.is_empty() && order.color_code.is_empty());
        assert!(s.mattress().store().is_empty());
        assert!(s.along().store().is_empty());
        assert_eq!(s.phase(), OrderPhase::Idle);
    }

    #[tokio::test]
    async fn combinations_failure_falls_back_to_unfiltered() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        FakeApi::fail(&api.fail_combinations);
        let s = session(api.clone());

        assert_eq!(s.select_order(Some(selection("ORD1"))).await, OrderPhase::Populated);
        assert_eq!(*api.fetches.lock().unwrap(), vec![None]);
        assert_eq!(table_ids(&s), vec!["T1", "T2", "T3"]);
    }

    #[tokio::test]
    async fn filtered_failure_retries_unfiltered() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        FakeApi::fail(&api.fail_filtered);
        let s = session(api.clone());
        s.select_order(Some(selection("ORD1"))).await;

        s.apply_filter(zalli("SECTOR1")).await.unwrap();
        assert_eq!(api.fetches.lock().unwrap().len(), 2);
        assert_eq!(table_ids(&s).len(), 3);
        assert!(s.state().error.is_none());
    }

    #[tokio::test]
    async fn double_failure_leaves_stores_empty() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        FakeApi::fail(&api.fail_rows);
        let s = session(api);
        s.select_order(Some(selection("ORD1"))).await;

        let err = s.apply_filter(zalli("SECTOR1")).await.unwrap_err();
        assert_eq!(err.error_code(), "BACKEND");
        let state = s.state();
        assert_eq!(state.phase, OrderPhase::Populated);
        assert!(state.error.is_some());
        assert!(s.mattress().store().is_empty());
    }

    #[tokio::test]
    async fn select_order_records_fetch_failure() {
        let api = Arc::new(FakeApi::with_order("ORD1", zalli_order()));
        FakeApi::fail(&api.fail_combinations);
        FakeApi::fail(&api.fail_rows);
        let s = session(api);

        assert_eq!(s.select_order(Some(selection("ORD1"))).await, OrderPhase::Populated);
        let state = s.state();
        assert!(state.error.is_some());
        assert!(s.mattress().store().is_empty());
    }

    // ========================================================================
    // Concurrency
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn superseded_selection_never_installs() {
        let api = Arc::new(FakeApi::default());
        let mut slow = zalli_order();
        slow.combinations.clear();
        slow.delay = Some(Duration::from_millis(100));
        api.insert("SLOW", slow);
        api.insert(
            "FAST",
            OrderData {
                mattress: vec![testing::mattress(testing::header("F1", None), "f1", "B9", 5, &[("S", 1)])],
                ..Default::default()
            },
        );
        let s = session(api);

        tokio::join!(s.select_order(Some(selection("SLOW"))), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            s.select_order(Some(selection("FAST"))).await
        });

        assert_eq!(s.order().order_id, "FAST");
        assert_eq!(table_ids(&s), vec!["F1"]);
        assert_eq!(s.phase(), OrderPhase::Populated);
    }

    #[tokio::test(start_paused = true)]
    async fn order_details_arrive_in_background() {
        let api = Arc::new(FakeApi::with_order("ORD1", OrderData::default()));
        *api.brand.lock().unwrap() = Some("ACME".into());
        *api.pad_print.lock().unwrap() = Some(PadPrintRecord {
            pattern: "LOGO".into(),
            pad_print_color: "WHITE".into(),
            image_url: None,
        });
        let s = session(api);

        s.select_order(Some(selection("ORD1"))).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let order = s.order();
        assert_eq!(order.brand.as_deref(), Some("ACME"));
        assert_eq!(order.pad_print.map(|p| p.pattern), Some("LOGO".to_string()));
    }
}
