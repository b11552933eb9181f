// SPDX-License-Identifier: MIT

use crate::domain::error::AppError;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;

/// Ordered multi-step transaction plan for one swap. Steps run strictly
/// in sequence; one step must fully confirm before the next starts.
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub steps: Vec<PlanStep>,
}

impl SwapPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|s| s.items.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub kind: StepKind,
    pub items: Vec<TxItem>,
}

/// Tagged step identity from the planning service. `Swap` marks the
/// economically meaningful action whose tx hash becomes the order's
/// execution receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Authorize,
    Swap,
    Other(String),
}

impl StepKind {
    pub fn parse(id: &str) -> Self {
        let lower = id.to_ascii_lowercase();
        if lower.contains("swap") || lower.contains("sale") {
            StepKind::Swap
        } else if lower.contains("approve") || lower.contains("authorize") {
            StepKind::Authorize
        } else {
            StepKind::Other(id.to_string())
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, StepKind::Swap)
    }
}

/// One transaction to submit as part of a step.
#[derive(Debug, Clone)]
pub struct TxItem {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
}

#[async_trait]
pub trait SwapPlanner: Send + Sync {
    async fn plan_swap(
        &self,
        user: Address,
        token_in: Address,
        token_out: Address,
        amount: U256,
    ) -> Result<SwapPlan, AppError>;
}

// Wire shapes, parsed into the domain types above.

#[derive(Deserialize, Debug)]
struct PlanResponse {
    steps: Vec<StepWire>,
}

#[derive(Deserialize, Debug)]
struct StepWire {
    id: String,
    #[serde(default)]
    items: Vec<ItemWire>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ItemWire {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
}

fn parse_u256(field: &str, value: &str) -> Result<U256, AppError> {
    U256::from_str(value).map_err(|e| AppError::Validation {
        field: field.into(),
        message: format!("'{value}' is not a valid integer: {e}"),
    })
}

fn parse_u64(field: &str, value: &str) -> Result<u64, AppError> {
    parse_u256(field, value)?
        .try_into()
        .map_err(|_| AppError::Validation {
            field: field.into(),
            message: format!("'{value}' exceeds u64"),
        })
}

impl ItemWire {
    fn into_item(self) -> Result<TxItem, AppError> {
        let to = Address::from_str(&self.to)
            .map_err(|_| AppError::InvalidAddress(format!("plan item to: {}", self.to)))?;
        let data_hex = self.data.strip_prefix("0x").unwrap_or(&self.data);
        let data = hex::decode(data_hex).map_err(|e| AppError::Validation {
            field: "data".into(),
            message: format!("plan item calldata is not hex: {e}"),
        })?;

        let value = match &self.value {
            Some(v) => parse_u256("value", v)?,
            None => U256::ZERO,
        };
        let gas = self.gas.as_deref().map(|v| parse_u64("gas", v)).transpose()?;
        let gas_price = self
            .gas_price
            .as_deref()
            .map(|v| {
                parse_u256("gasPrice", v)?
                    .try_into()
                    .map_err(|_| AppError::Validation {
                        field: "gasPrice".into(),
                        message: "gas price exceeds u128".into(),
                    })
            })
            .transpose()?;

        Ok(TxItem {
            to,
            data: data.into(),
            value,
            gas,
            gas_price,
        })
    }
}

impl PlanResponse {
    fn into_plan(self) -> Result<SwapPlan, AppError> {
        let steps = self
            .steps
            .into_iter()
            .map(|step| {
                let kind = StepKind::parse(&step.id);
                let items = step
                    .items
                    .into_iter()
                    .map(ItemWire::into_item)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PlanStep { kind, items })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(SwapPlan { steps })
    }
}

/// HTTP client for the external swap-planning service.
#[derive(Clone)]
pub struct HttpSwapPlanner {
    client: Client,
    base_url: String,
    chain_id: u64,
}

impl HttpSwapPlanner {
    pub fn new(base_url: &str, chain_id: u64, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
        })
    }
}

#[async_trait]
impl SwapPlanner for HttpSwapPlanner {
    async fn plan_swap(
        &self,
        user: Address,
        token_in: Address,
        token_out: Address,
        amount: U256,
    ) -> Result<SwapPlan, AppError> {
        let body = json!({
            "user": format!("{user:#x}"),
            "originChainId": self.chain_id,
            "destinationChainId": self.chain_id,
            "originCurrency": format!("{token_in:#x}"),
            "destinationCurrency": format!("{token_out:#x}"),
            "amount": amount.to_string(),
            "tradeType": "EXACT_INPUT",
        });

        let resp = self
            .client
            .post(format!("{}/quote", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Swap plan fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::ApiCall {
                provider: "swap-planner".into(),
                status: resp.status().as_u16(),
            });
        }

        let wire: PlanResponse = resp.json().await.map_err(|_| AppError::ApiCall {
            provider: "swap-planner JSON".into(),
            status: 0,
        })?;

        let plan = wire.into_plan()?;
        if plan.is_empty() {
            return Err(AppError::ApiCall {
                provider: "swap-planner".into(),
                status: 0,
            });
        }
        Ok(plan)
    }
}
