use std::sync::Arc;
use std::time::Duration;

use cutplan_client::{NotificationRecord, PlanningApi};
use cutplan_flux::EventBus;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Topic carrying [`UnreadNotifications`] after every successful poll.
pub const NOTIFICATIONS_TOPIC: &str = "notifications/unread";

#[derive(Debug, Clone, PartialEq)]
pub struct UnreadNotifications(pub Vec<NotificationRecord>);

/// Start the unread-notification poll loop.
///
/// Polls once right away, then every `interval`. A failed poll is logged
/// and retried on the next tick. Returns a CancellationToken that stops
/// the loop when cancelled.
pub fn start(api: Arc<dyn PlanningApi>, bus: EventBus, interval: Duration) -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        info!("notification poller started (interval={interval:?})");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("notification poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match api.unread_notifications().await {
                        Ok(unread) => {
                            debug!(count = unread.len(), "notifications polled");
                            bus.publish(NOTIFICATIONS_TOPIC, UnreadNotifications(unread));
                        }
                        Err(e) => warn!("notification poll failed: {e}"),
                    }
                }
            }
        }
    });

    cancel
}
