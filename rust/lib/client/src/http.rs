use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::api::PlanningApi;
use crate::dto::*;
use crate::{ApiError, TokenSource};

/// reqwest-backed [`PlanningApi`].
///
/// Every path is rooted at `{base_url}/api`. Responses are unwrapped from
/// the `{success, data|msg}` envelope; `success: false` becomes
/// [`ApiError::Backend`]. No retries: a failed call is reported once.
pub struct HttpPlanningApi {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl HttpPlanningApi {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Build a request with auth header.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    /// Unwrap the envelope, mapping HTTP and application errors.
    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<R>, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Server { status: code, message: body });
        }
        let env: Envelope<R> = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))?;
        if !env.success {
            return Err(ApiError::Backend(
                env.msg.unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        Ok(env.data)
    }

    /// GET returning optional data (`data: null` is a valid answer).
    async fn get_opt<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<R>, ApiError> {
        debug!(path, "GET");
        let req = self.http.get(self.url(path)).query(query);
        let req = self.authed(req).await?;
        Self::parse(req.send().await?).await
    }

    /// GET where missing data is a protocol error.
    async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<R, ApiError> {
        self.get_opt(path, query)
            .await?
            .ok_or_else(|| ApiError::Decode(format!("{}: missing data", path)))
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        debug!(path, "POST");
        let req = self.http.post(self.url(path)).json(body);
        let req = self.authed(req).await?;
        Self::parse::<serde_json::Value>(req.send().await?).await?;
        Ok(())
    }

    async fn table_rows<R: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<R>, ApiError> {
        match filter {
            Some(f) => {
                let query = [
                    ("cutting_room", f.cutting_room.as_str()),
                    ("destination", f.destination.as_str()),
                ];
                self.get(path, &query).await
            }
            None => self.get(path, &[]).await,
        }
    }
}

#[async_trait]
impl PlanningApi for HttpPlanningApi {
    async fn combinations(&self, order_id: &str) -> Result<Vec<Combination>, ApiError> {
        self.get(&format!("/production_center/combinations/{}", order_id), &[])
            .await
    }

    async fn mattress_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<MattressRecord>, ApiError> {
        self.table_rows(&format!("/mattress/order/{}", order_id), filter)
            .await
    }

    async fn along_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<AlongRecord>, ApiError> {
        self.table_rows(&format!("/collaretto/along/order/{}", order_id), filter)
            .await
    }

    async fn weft_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<PanelRecord>, ApiError> {
        self.table_rows(&format!("/collaretto/weft/order/{}", order_id), filter)
            .await
    }

    async fn bias_rows(
        &self,
        order_id: &str,
        filter: Option<&FetchFilter>,
    ) -> Result<Vec<PanelRecord>, ApiError> {
        self.table_rows(&format!("/collaretto/bias/order/{}", order_id), filter)
            .await
    }

    async fn pad_print(
        &self,
        style: &str,
        season: &str,
        color: &str,
    ) -> Result<Option<PadPrintRecord>, ApiError> {
        self.get_opt(
            &format!("/pad_print/{}", style),
            &[("season", season), ("color", color)],
        )
        .await
    }

    async fn brand(&self, style: &str) -> Result<Option<String>, ApiError> {
        self.get_opt(&format!("/brand/{}", style), &[]).await
    }

    async fn markers(&self, style: &str, width: &str) -> Result<Vec<MarkerRecord>, ApiError> {
        self.get(&format!("/markers/{}", style), &[("width", width)])
            .await
    }

    async fn save(&self, batch: &SaveBatch) -> Result<(), ApiError> {
        self.post("/planning/save", batch).await
    }

    async fn unread_notifications(&self) -> Result<Vec<NotificationRecord>, ApiError> {
        self.get("/notifications/unread", &[]).await
    }
}
