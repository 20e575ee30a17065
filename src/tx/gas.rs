//! Gas limit estimation for the fire call

use crate::chain::ChainProvider;

use ethers::types::{Address, Bytes, U256};
use tracing::{debug, warn};

/// Gas limit used when the endpoint cannot estimate
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Ceiling on accepted estimates, guarding against an endpoint inflating the limit
pub const MAX_GAS_LIMIT: u64 = 500_000;

/// Best-effort gas estimator; never fails
pub struct GasEstimator {
    default_limit: U256,
    max_limit: U256,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new() -> Self {
        Self {
            default_limit: U256::from(DEFAULT_GAS_LIMIT),
            max_limit: U256::from(MAX_GAS_LIMIT),
        }
    }

    /// Estimate the gas limit of a call from `from`
    pub async fn estimate(
        &self,
        provider: &ChainProvider<'_>,
        from: Address,
        to: Address,
        data: &Bytes,
    ) -> U256 {
        let endpoint = &provider.endpoint().name;

        match provider.estimate_gas(from, to, data).await {
            Ok(estimate) if estimate > self.max_limit => {
                warn!(
                    "Gas estimate {} from {} exceeds ceiling; capping at {}",
                    estimate, endpoint, self.max_limit
                );
                self.max_limit
            }
            Ok(estimate) => {
                debug!("Gas estimate from {}: {}", endpoint, estimate);
                estimate
            }
            Err(e) => {
                warn!(
                    "Gas estimation failed on {}: {}; using default {}",
                    endpoint, e, self.default_limit
                );
                self.default_limit
            }
        }
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::rpc::MockRpcClient;
    use crate::config::{Endpoint, FeeModel};
    use crate::error::FireError;
    use serde_json::json;

    fn endpoint() -> Endpoint {
        Endpoint {
            name: "Primary".to_string(),
            url: "https://primary.example".to_string(),
            fee_model: FeeModel::Legacy,
        }
    }

    async fn estimate_with(rpc: &MockRpcClient) -> U256 {
        let endpoint = endpoint();
        let provider = ChainProvider::new(rpc, &endpoint);
        GasEstimator::new()
            .estimate(
                &provider,
                Address::repeat_byte(0x11),
                Address::repeat_byte(0x22),
                &Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            )
            .await
    }

    #[tokio::test]
    async fn uses_endpoint_estimate() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call()
            .withf(|_, method, params| {
                method == "eth_estimateGas" && params[0]["data"] == json!("0xdeadbeef")
            })
            .times(1)
            .returning(|_, _, _| Ok(json!("0xb411")));

        assert_eq!(estimate_with(&rpc).await, U256::from(46_097));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_default() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call()
            .returning(|_, _, _| Err(FireError::Transport("connection refused".to_string())));

        assert_eq!(estimate_with(&rpc).await, U256::from(DEFAULT_GAS_LIMIT));
    }

    #[tokio::test]
    async fn malformed_estimate_falls_back_to_default() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call().returning(|_, _, _| Ok(json!("lots")));

        assert_eq!(estimate_with(&rpc).await, U256::from(DEFAULT_GAS_LIMIT));
    }

    #[tokio::test]
    async fn inflated_estimate_is_capped() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call().returning(|_, _, _| Ok(json!("0x5f5e100")));

        assert_eq!(estimate_with(&rpc).await, U256::from(MAX_GAS_LIMIT));
    }
}
