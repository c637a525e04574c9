use async_trait::async_trait;

use crate::dto::*;
use crate::ApiError;

/// Backend operations the planning session depends on.
///
/// Table fetches take an optional filter: `None` fetches every table of
/// the order regardless of routing.
#[async_trait]
pub trait PlanningApi: Send + Sync + 'static {
    /// Production-center combinations the order is routed through.
    async fn combinations(&self, order_id: &str) -> Result<Vec<Combination>, ApiError>;

    /// Mattress and adhesive rows, flat.
    async fn mattress_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<MattressRecord>, ApiError>;

    async fn along_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<AlongRecord>, ApiError>;

    async fn weft_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<PanelRecord>, ApiError>;

    async fn bias_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<PanelRecord>, ApiError>;

    /// Pad-print artwork for a style/color, if one is registered.
    async fn pad_print(
        &self,
        style: &str,
        season: &str,
        color: &str,
    ) -> Result<Option<PadPrintRecord>, ApiError>;

    /// Brand owning a style, if known.
    async fn brand(&self, style: &str) -> Result<Option<String>, ApiError>;

    /// Marker catalog entries usable at the given width.
    async fn markers(&self, style: &str, width: &str) -> Result<Vec<MarkerRecord>, ApiError>;

    async fn save(&self, batch: &SaveBatch) -> Result<(), ApiError>;

    async fn unread_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError>;
}
