//! Fire transaction construction and signing

use super::fees::FeeFields;
use crate::error::{FireError, FireResult};

use alloy_sol_types::{sol, SolCall};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, U256};

sol! {
    function fire() external;
}

/// Call payload of the argument-less `fire()` function: its 4-byte selector
pub fn fire_call_data() -> Bytes {
    Bytes::from(fireCall::SELECTOR.to_vec())
}

/// A fully specified, unsigned fire transaction
#[derive(Debug, Clone, PartialEq)]
pub struct FireRequest {
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: U256,
    pub nonce: u64,
    pub chain_id: u64,
    pub fees: FeeFields,
}

impl FireRequest {
    /// Convert into the typed transaction matching the fee fields
    pub fn to_typed(&self) -> TypedTransaction {
        match self.fees {
            FeeFields::Legacy { gas_price } => TransactionRequest::new()
                .to(self.to)
                .data(self.data.clone())
                .nonce(self.nonce)
                .gas(self.gas_limit)
                .gas_price(gas_price)
                .chain_id(self.chain_id)
                .into(),
            FeeFields::DynamicFee {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .to(self.to)
                .data(self.data.clone())
                .nonce(self.nonce)
                .gas(self.gas_limit)
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .chain_id(self.chain_id)
                .into(),
        }
    }

    /// Sign with `wallet` and return the raw RLP bytes for broadcast
    pub async fn sign(&self, wallet: &LocalWallet) -> FireResult<Bytes> {
        let wallet = wallet.clone().with_chain_id(self.chain_id);
        let mut tx = self.to_typed();
        tx.set_from(wallet.address());

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| FireError::Signing(e.to_string()))?;

        Ok(tx.rlp_signed(&signature))
    }
}
