use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use types::account::UserRecord;
use types::ids::{OrderId, UserId};
use types::order::OrderRecord;

use super::{DirectoryError, OrderDirectory, UserDirectory};

/// Directory backed by the platform's internal REST endpoints.
#[derive(Clone)]
pub struct HttpDirectory {
    client: Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL plus `segments`, each percent-encoded as exactly one path
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| DirectoryError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, DirectoryError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(DirectoryError::Status(res.status().as_u16()));
        }

        res.json::<T>()
            .await
            .map(Some)
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for HttpDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let url = self.endpoint(&["internal", "users", id.as_str()])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl OrderDirectory for HttpDirectory {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderRecord>, DirectoryError> {
        let url = self.endpoint(&["internal", "orders", id.as_str()])?;
        self.get_json(url).await
    }

    async fn active_orders_for(
        &self,
        customer: &UserId,
    ) -> Result<Vec<OrderRecord>, DirectoryError> {
        let mut url = self.endpoint(&["internal", "customers", customer.as_str(), "orders"])?;
        url.query_pairs_mut().append_pair("active", "true");
        let orders: Option<Vec<OrderRecord>> = self.get_json(url).await?;
        Ok(orders
            .unwrap_or_default()
            .into_iter()
            .filter(OrderRecord::is_active)
            .collect())
    }
}
