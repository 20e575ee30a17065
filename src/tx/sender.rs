//! Fire transaction sender with multi-endpoint failover and bounded retries
//!
//! Every per-endpoint failure is absorbed into a [`SubmissionAttempt`] and moves
//! control to the next endpoint or round. Only key store failures escape an
//! attempt, and only exhaustion of all rounds fails the run.

use super::fees::select_fees;
use super::gas::GasEstimator;
use super::request::FireRequest;
use crate::chain::health;
use crate::chain::{ChainProvider, Confirmation, ConfirmationPoller, RpcClient};
use crate::config::{Endpoint, FireConfig};
use crate::error::{FireError, FireResult, KeyError};
use crate::keystore::KeyStore;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use std::sync::Arc;
use tokio::task;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Hash returned in test mode, where nothing is signed or broadcast
pub const DRY_RUN_TX_HASH: H256 = H256([0u8; 32]);

/// What happened on one endpoint in one round
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Broadcast accepted by the endpoint
    Sent(H256),
    /// Test mode stopped before signing
    DryRun(H256),
    /// Endpoint not usable for this attempt
    Skipped(String),
    /// Signing or broadcast failed
    Failed(FireError),
}

#[derive(Debug)]
pub struct SubmissionAttempt {
    pub endpoint: Endpoint,
    pub round: u32,
    pub outcome: AttemptOutcome,
}

/// Result of a successful run
#[derive(Debug)]
pub struct FireOutcome {
    pub tx_hash: H256,
    pub endpoint: String,
    pub round: u32,
    /// `None` in test mode
    pub confirmation: Option<Confirmation>,
}

impl FireOutcome {
    pub fn is_dry_run(&self) -> bool {
        self.confirmation.is_none()
    }

    /// Advisory error to surface next to the hash, if any
    pub fn warning(&self) -> Option<FireError> {
        match self.confirmation {
            Some(Confirmation::TimedOut) => Some(FireError::ConfirmationTimeout {
                tx_hash: format!("{:?}", self.tx_hash),
            }),
            _ => None,
        }
    }
}

/// Submits the fire call through the configured endpoints
pub struct TransactionSender {
    rpc: Arc<dyn RpcClient>,
    key_store: Arc<dyn KeyStore>,
    gas_estimator: GasEstimator,
    poller: ConfirmationPoller,
    config: FireConfig,
}

impl TransactionSender {
    /// Create a new transaction sender
    pub fn new(rpc: Arc<dyn RpcClient>, key_store: Arc<dyn KeyStore>, config: FireConfig) -> Self {
        let poller = ConfirmationPoller::new(config.poll_interval, config.progress_interval);

        Self {
            rpc,
            key_store,
            gas_estimator: GasEstimator::new(),
            poller,
            config,
        }
    }

    /// Submit the fire transaction, failing over across endpoints and rounds
    pub async fn send_fire_transaction(&self) -> FireResult<FireOutcome> {
        let candidates =
            health::candidate_endpoints(self.rpc.as_ref(), &self.config.endpoints).await;
        let max_retries = self.config.max_retries;

        for round in 1..=max_retries {
            info!("Submission round {}/{}", round, max_retries);

            for endpoint in &candidates {
                let attempt = self.attempt_endpoint(endpoint, round).await?;

                match attempt.outcome {
                    AttemptOutcome::Sent(tx_hash) => {
                        info!(
                            "Transaction {:?} sent via {} (round {}/{})",
                            tx_hash, endpoint.name, round, max_retries
                        );
                        let confirmation = self.confirm(endpoint, tx_hash).await;
                        return Ok(FireOutcome {
                            tx_hash,
                            endpoint: endpoint.name.clone(),
                            round,
                            confirmation: Some(confirmation),
                        });
                    }
                    AttemptOutcome::DryRun(tx_hash) => {
                        return Ok(FireOutcome {
                            tx_hash,
                            endpoint: endpoint.name.clone(),
                            round,
                            confirmation: None,
                        });
                    }
                    AttemptOutcome::Skipped(reason) => {
                        warn!(
                            "Round {}: skipping {}: {}",
                            attempt.round, attempt.endpoint.name, reason
                        );
                    }
                    AttemptOutcome::Failed(FireError::Revert(reason)) => {
                        warn!(
                            "Round {}: submission via {} reverted: {}",
                            attempt.round, attempt.endpoint.name, reason
                        );
                    }
                    AttemptOutcome::Failed(e) => {
                        warn!(
                            "Round {}: submission via {} failed: {}",
                            attempt.round, attempt.endpoint.name, e
                        );
                    }
                }
            }

            if round < max_retries {
                warn!(
                    "No endpoint accepted the transaction in round {}; retrying in {}s",
                    round,
                    self.config.retry_delay.as_secs()
                );
                sleep(self.config.retry_delay).await;
            }
        }

        Err(FireError::SubmissionExhausted {
            rounds: max_retries,
            endpoints: candidates.len(),
        })
    }

    /// Run one attempt against one endpoint. `Err` only for fatal key errors.
    async fn attempt_endpoint(
        &self,
        endpoint: &Endpoint,
        round: u32,
    ) -> FireResult<SubmissionAttempt> {
        let provider = ChainProvider::new(self.rpc.as_ref(), endpoint);
        let attempt = |outcome| SubmissionAttempt {
            endpoint: endpoint.clone(),
            round,
            outcome,
        };

        if let Err(e) = provider.get_block_number().await {
            return Ok(attempt(AttemptOutcome::Skipped(format!(
                "liveness check failed: {}",
                e
            ))));
        }

        let wallet = self.load_wallet().await?;
        let from = wallet.address();

        let nonce = match provider.get_transaction_count(from).await {
            Ok(nonce) => nonce,
            Err(e) => {
                return Ok(attempt(AttemptOutcome::Skipped(format!(
                    "nonce lookup failed: {}",
                    e
                ))))
            }
        };

        let gas_limit = self
            .gas_estimator
            .estimate(
                &provider,
                from,
                self.config.contract_address,
                &self.config.call_data,
            )
            .await;

        let request = FireRequest {
            to: self.config.contract_address,
            data: self.config.call_data.clone(),
            gas_limit,
            nonce,
            chain_id: self.config.chain_id,
            fees: select_fees(endpoint.fee_model, self.config.fees),
        };
        debug!("Built fire request for {}: {:?}", endpoint.name, request);

        if self.config.test_mode {
            info!(
                "Test mode: not signing or broadcasting via {} (nonce {}, gas {}, max price {} wei)",
                endpoint.name,
                nonce,
                gas_limit,
                request.fees.max_price_per_gas()
            );
            return Ok(attempt(AttemptOutcome::DryRun(DRY_RUN_TX_HASH)));
        }

        let signed = request.sign(&wallet).await;
        drop(wallet);

        let raw = match signed {
            Ok(raw) => raw,
            Err(e) => return Ok(attempt(AttemptOutcome::Failed(e))),
        };

        let outcome = match provider.send_raw_transaction(&raw).await {
            Ok(tx_hash) => AttemptOutcome::Sent(tx_hash),
            Err(e) => AttemptOutcome::Failed(e),
        };

        Ok(attempt(outcome))
    }

    /// Decrypt the key for a single attempt; the plaintext is wiped on return
    async fn load_wallet(&self) -> FireResult<LocalWallet> {
        // scrypt is CPU-bound; keep it off the runtime thread
        let key_store = Arc::clone(&self.key_store);
        let key = task::spawn_blocking(move || key_store.decrypt_key())
            .await
            .map_err(|e| KeyError::DecryptionFailed(format!("key decryption task failed: {}", e)))??;
        let wallet: LocalWallet = key
            .as_str()
            .parse()
            .map_err(|e: ethers::signers::WalletError| KeyError::InvalidKey(e.to_string()))?;

        Ok(wallet.with_chain_id(self.config.chain_id))
    }

    async fn confirm(&self, endpoint: &Endpoint, tx_hash: H256) -> Confirmation {
        let provider = ChainProvider::new(self.rpc.as_ref(), endpoint);
        self.poller
            .await_confirmation(&provider, tx_hash, self.config.confirmation_timeout)
            .await
    }
}
