//! # Marketplace API
//!
//! Sellers publish signed auctions to a marketplace, which may charge a
//! listing fee. The marketplace is another injected collaborator, like the
//! ledger and wallet in [`context`](crate::context): operations take a
//! `&dyn MarketplaceService`, production code plugs in [`HttpMarketplace`],
//! tests plug in a stub.
//!
//! Wire contract:
//!
//! | Call                   | Success              | Notes                      |
//! |------------------------|----------------------|----------------------------|
//! | `GET /api/v1/fee_info` | `{"rate", "addr"}`   | 404 means no fee           |
//! | `POST /api/v1/auctions`| any JSON             | body `{"auction": {...}}`  |

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{MARKETPLACE_AUCTIONS_PATH, MARKETPLACE_FEE_INFO_PATH, MARKETPLACE_TIMEOUT_SECS};
use crate::error::ServiceError;

/// Listing fee terms as the marketplace reports them. The address is still
/// an unchecked string here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInfo {
    /// Basis points of each proof's price.
    pub rate: u64,
    #[serde(default)]
    pub addr: Option<String>,
}

#[async_trait]
pub trait MarketplaceService: Send + Sync {
    /// Current listing fee, or `None` if the marketplace does not charge one.
    async fn fee_info(&self) -> Result<Option<FeeInfo>, ServiceError>;

    /// Upload an auction request body. Returns whatever the marketplace
    /// answered with.
    async fn upload_auction(&self, body: &Value) -> Result<Value, ServiceError>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// [`MarketplaceService`] over the marketplace's JSON API.
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMarketplace {
    /// Client for the marketplace rooted at `base_url`, e.g.
    /// `https://market.example`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(MARKETPLACE_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::Marketplace(format!("HTTP client build failed: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Marketplace(e.to_string())
}

#[async_trait]
impl MarketplaceService for HttpMarketplace {
    async fn fee_info(&self) -> Result<Option<FeeInfo>, ServiceError> {
        let url = self.url(MARKETPLACE_FEE_INFO_PATH);
        let response = self.http.get(&url).send().await.map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%url, "marketplace charges no listing fee");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ServiceError::Marketplace(format!(
                "error getting fee info: HTTP {status}"
            )));
        }

        let info: FeeInfo = response.json().await.map_err(transport)?;
        debug!(%url, rate = info.rate, "fetched marketplace fee");
        Ok(Some(info))
    }

    async fn upload_auction(&self, body: &Value) -> Result<Value, ServiceError> {
        let url = self.url(MARKETPLACE_AUCTIONS_PATH);
        let response = self.http.post(&url).json(body).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Marketplace(format!(
                "error posting auction: HTTP {status}"
            )));
        }
        response.json().await.map_err(transport)
    }
}
