// SPDX-License-Identifier: MIT

use crate::common::retry::retry_async;
use crate::domain::error::AppError;
use crate::infrastructure::network::provider::HttpProvider;
use crate::infrastructure::network::swap_plan::TxItem;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::sleep;

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
}

#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// RPC-facing seam. `sign_and_send` blocks until on-chain confirmation
/// or a bounded timeout; the signer is only borrowed for the call.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn balance_of(&self, wallet: Address, token: Address) -> Result<U256, AppError>;

    async fn sign_and_send(
        &self,
        signer: &PrivateKeySigner,
        item: &TxItem,
    ) -> Result<TxReceipt, AppError>;
}

#[derive(Clone)]
pub struct RpcChainClient {
    provider: HttpProvider,
    chain_id: u64,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(
        provider: HttpProvider,
        chain_id: u64,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            chain_id,
            receipt_poll,
            receipt_timeout,
        }
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {e}")))
    }

    /// Poll for the receipt until confirmed or the bounded wait elapses.
    async fn await_receipt(&self, tx_hash: alloy::primitives::TxHash) -> Result<TxReceipt, AppError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(AppError::Transaction {
                            hash: Some(format!("{tx_hash:#x}")),
                            reason: "transaction reverted on-chain".into(),
                        });
                    }
                    return Ok(TxReceipt {
                        tx_hash: format!("{tx_hash:#x}"),
                        block_number: receipt.block_number,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "chain", tx=%format!("{tx_hash:#x}"), error=%e, "Receipt poll failed");
                }
            }

            if Instant::now() >= deadline {
                return Err(AppError::Transaction {
                    hash: Some(format!("{tx_hash:#x}")),
                    reason: format!(
                        "confirmation not observed within {}ms",
                        self.receipt_timeout.as_millis()
                    ),
                });
            }
            sleep(self.receipt_poll).await;
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn balance_of(&self, wallet: Address, token: Address) -> Result<U256, AppError> {
        if token == Address::ZERO {
            return self
                .provider
                .get_balance(wallet)
                .await
                .map_err(|e| AppError::Connection(format!("Balance fetch failed: {e}")));
        }

        let contract = IERC20::new(token, self.provider.clone());
        contract
            .balanceOf(wallet)
            .call()
            .await
            .map_err(|e| AppError::Connection(format!("ERC20 balance fetch failed: {e}")))
    }

    async fn sign_and_send(
        &self,
        signer: &PrivateKeySigner,
        item: &TxItem,
    ) -> Result<TxReceipt, AppError> {
        let from = signer.address();
        let nonce = self.pending_nonce(from).await?;

        let gas_price = match item.gas_price {
            Some(p) => p,
            None => self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| AppError::Connection(format!("Gas price fetch failed: {e}")))?,
        };

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(item.to)
            .with_input(item.data.clone())
            .with_value(item.value)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        let gas_limit = match item.gas {
            Some(g) => g,
            None => self
                .provider
                .estimate_gas(tx.clone())
                .await
                .map_err(|e| AppError::Connection(format!("Gas estimation failed: {e}")))?,
        };
        tx = tx.with_gas_limit(gas_limit);

        // The signer exists only for the duration of this call; the
        // plaintext secret is never persisted.
        let wallet = EthereumWallet::from(signer.clone());
        let envelope = tx.build(&wallet).await.map_err(|e| AppError::Transaction {
            hash: None,
            reason: format!("signing failed: {e}"),
        })?;

        let raw = envelope.encoded_2718();
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| AppError::Connection(format!("Transaction broadcast failed: {e}")))?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(target: "chain", tx=%format!("{tx_hash:#x}"), nonce, "Transaction broadcast");

        self.await_receipt(tx_hash).await
    }
}
