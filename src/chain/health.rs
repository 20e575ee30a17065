//! Endpoint health probing
//!
//! Probing is advisory: an empty healthy set falls back to the full list in
//! [`candidate_endpoints`], so a momentary blip never prevents the only attempt.

use crate::chain::provider::ChainProvider;
use crate::chain::rpc::RpcClient;
use crate::config::Endpoint;

use tracing::{info, warn};

/// Liveness classification of one endpoint for the current run
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub endpoint: Endpoint,
    pub healthy: bool,
}

/// Check a single endpoint with a cheap `eth_blockNumber` call
pub async fn check_endpoint(rpc: &dyn RpcClient, endpoint: &Endpoint) -> EndpointHealth {
    let provider = ChainProvider::new(rpc, endpoint);
    let healthy = match provider.get_block_number().await {
        Ok(block) => {
            info!("Endpoint {} healthy at block {}", endpoint.name, block);
            true
        }
        Err(e) => {
            warn!("Health check failed for endpoint {}: {}", endpoint.name, e);
            false
        }
    };

    EndpointHealth {
        endpoint: endpoint.clone(),
        healthy,
    }
}

/// Return the healthy endpoints, preserving configured order
pub async fn probe(rpc: &dyn RpcClient, endpoints: &[Endpoint]) -> Vec<Endpoint> {
    let mut healthy = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        let health = check_endpoint(rpc, endpoint).await;
        if health.healthy {
            healthy.push(health.endpoint);
        }
    }

    healthy
}

/// Endpoints to submit through this run
pub async fn candidate_endpoints(rpc: &dyn RpcClient, endpoints: &[Endpoint]) -> Vec<Endpoint> {
    let healthy = probe(rpc, endpoints).await;

    if healthy.is_empty() {
        warn!(
            "No endpoint passed the health check; trying all {} configured endpoints",
            endpoints.len()
        );
        return endpoints.to_vec();
    }

    info!("{}/{} endpoints healthy", healthy.len(), endpoints.len());
    healthy
}
