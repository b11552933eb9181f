// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const CACHE_TTL: u64 = 60; // Cache prices for 60 seconds

/// Current market price of a token, quoted by the external oracle.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price_of(&self, token: Address) -> Result<f64, AppError>;
}

#[derive(Deserialize, Debug)]
struct PriceResponse {
    price: f64,
}

#[derive(Clone)]
pub struct HttpPriceOracle {
    client: Client,
    base_url: String,
    chain_id: u64,
    // Map: token -> (price, fetched-at)
    cache: Arc<RwLock<HashMap<Address, (f64, Instant)>>>,
}

impl HttpPriceOracle {
    pub fn new(base_url: &str, chain_id: u64, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn cached(&self, token: Address) -> Option<f64> {
        let read_guard = self.cache.read().await;
        read_guard.get(&token).and_then(|(price, fetched_at)| {
            (fetched_at.elapsed().as_secs() < CACHE_TTL).then_some(*price)
        })
    }

    async fn store_cache(&self, token: Address, price: f64) {
        let mut write_guard = self.cache.write().await;
        write_guard.insert(token, (price, Instant::now()));
    }

    fn price_url(&self, token: Address) -> String {
        format!(
            "{}/price?address={:#x}&chainId={}",
            self.base_url, token, self.chain_id
        )
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn price_of(&self, token: Address) -> Result<f64, AppError> {
        if let Some(price) = self.cached(token).await {
            return Ok(price);
        }

        let resp = self
            .client
            .get(self.price_url(token))
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Price fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::ApiCall {
                provider: "price-oracle".into(),
                status: resp.status().as_u16(),
            });
        }

        let body: PriceResponse = resp.json().await.map_err(|_| AppError::ApiCall {
            provider: "price-oracle JSON".into(),
            status: 0,
        })?;

        if !body.price.is_finite() || body.price <= 0.0 {
            return Err(AppError::ApiCall {
                provider: "price-oracle".into(),
                status: 0,
            });
        }

        self.store_cache(token, body.price).await;
        Ok(body.price)
    }
}
