//! Typed chain access over a single endpoint

use crate::chain::rpc::RpcClient;
use crate::config::Endpoint;
use crate::error::{FireError, FireResult};

use ethers::types::{Address, Bytes, H256, U256, U64};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::warn;

/// Execution status decoded from a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
    /// Mined, but the receipt carries no usable `status` (pre-Byzantium `root`
    /// receipts, some L2s)
    Unknown,
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptStatus::Success => write!(f, "success"),
            ReceiptStatus::Reverted => write!(f, "reverted"),
            ReceiptStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// The parts of a mined receipt the sender cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub block_number: u64,
    pub status: ReceiptStatus,
    pub gas_used: U256,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    block_number: Option<U64>,
    status: Option<U64>,
    gas_used: Option<U256>,
}

/// Chain calls bound to one endpoint
pub struct ChainProvider<'a> {
    rpc: &'a dyn RpcClient,
    endpoint: &'a Endpoint,
}

impl<'a> ChainProvider<'a> {
    pub fn new(rpc: &'a dyn RpcClient, endpoint: &'a Endpoint) -> Self {
        Self { rpc, endpoint }
    }

    /// Endpoint this provider talks to
    pub fn endpoint(&self) -> &Endpoint {
        self.endpoint
    }

    /// Current block number; doubles as the liveness check
    pub async fn get_block_number(&self) -> FireResult<u64> {
        let block: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(block.as_u64())
    }

    /// Pending transaction count for an account
    pub async fn get_transaction_count(&self, account: Address) -> FireResult<u64> {
        let nonce: U256 = self
            .request("eth_getTransactionCount", json!([account, "pending"]))
            .await?;
        if nonce > U256::from(u64::MAX) {
            return Err(FireError::Decode(format!("Nonce out of range: {}", nonce)));
        }
        Ok(nonce.as_u64())
    }

    /// Gas estimate for a call
    pub async fn estimate_gas(&self, from: Address, to: Address, data: &Bytes) -> FireResult<U256> {
        self.request(
            "eth_estimateGas",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await
    }

    /// Broadcast a signed transaction
    pub async fn send_raw_transaction(&self, raw: &Bytes) -> FireResult<H256> {
        self.request("eth_sendRawTransaction", json!([raw])).await
    }

    /// Receipt for a transaction, `None` while it is not mined
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> FireResult<Option<TransactionReceipt>> {
        let value = self
            .rpc
            .call(&self.endpoint.url, "eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        if value.is_null() {
            return Ok(None);
        }

        let raw: RawReceipt = decode(value, "eth_getTransactionReceipt")?;

        // Some clients return pending receipts without a block
        let Some(block_number) = raw.block_number else {
            return Ok(None);
        };

        // Once mined the receipt is final, whatever its status says
        let status = match raw.status.map(|s| s.as_u64()) {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Reverted,
            other => {
                warn!(
                    "Receipt for {:?} in block {} has no usable status: {:?}",
                    tx_hash, block_number, other
                );
                ReceiptStatus::Unknown
            }
        };

        let gas_used = raw.gas_used.unwrap_or_default();

        Ok(Some(TransactionReceipt {
            block_number: block_number.as_u64(),
            status,
            gas_used,
        }))
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> FireResult<T> {
        let value = self.rpc.call(&self.endpoint.url, method, params).await?;
        decode(value, method)
    }
}

fn decode<T: DeserializeOwned>(value: Value, method: &str) -> FireResult<T> {
    serde_json::from_value(value)
        .map_err(|e| FireError::Decode(format!("Invalid {} result: {}", method, e)))
}
