//! Receipt polling after submission
//!
//! A present receipt is authoritative whatever its status. A failed receipt
//! query only means "not yet" for that tick. Reaching the timeout is
//! inconclusive: the transaction may still be mined later.

use crate::chain::provider::{ChainProvider, TransactionReceipt};

use ethers::types::H256;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(15);

/// Terminal state of a confirmation wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined, successfully or not
    Confirmed(TransactionReceipt),
    /// No receipt before the deadline
    TimedOut,
}

/// Polls an endpoint for a receipt until mined or timed out
pub struct ConfirmationPoller {
    poll_interval: Duration,
    progress_interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(poll_interval: Duration, progress_interval: Duration) -> Self {
        Self {
            poll_interval,
            progress_interval,
        }
    }

    /// Wait for `tx_hash` to be mined, measured from the first poll
    pub async fn await_confirmation(
        &self,
        provider: &ChainProvider<'_>,
        tx_hash: H256,
        timeout: Duration,
    ) -> Confirmation {
        let started = Instant::now();
        let mut last_progress = started;
        let endpoint = &provider.endpoint().name;

        info!(
            "Waiting up to {}s for {:?} to be mined via {}",
            timeout.as_secs(),
            tx_hash,
            endpoint
        );

        loop {
            match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    info!(
                        "Transaction {:?} mined in block {} with status {} (gas used {})",
                        tx_hash, receipt.block_number, receipt.status, receipt.gas_used
                    );
                    return Confirmation::Confirmed(receipt);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Receipt query for {:?} on {} failed: {}", tx_hash, endpoint, e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    "No receipt for {:?} after {}s; outcome unknown",
                    tx_hash,
                    elapsed.as_secs()
                );
                return Confirmation::TimedOut;
            }

            if last_progress.elapsed() >= self.progress_interval {
                info!(
                    "Still waiting for {:?} ({}s elapsed)",
                    tx_hash,
                    elapsed.as_secs()
                );
                last_progress = Instant::now();
            }

            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

impl Default for ConfirmationPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::provider::ReceiptStatus;
    use crate::chain::rpc::MockRpcClient;
    use crate::config::{Endpoint, FeeModel};
    use crate::error::FireError;
    use ethers::types::U256;
    use serde_json::{json, Value};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Log sink for asserting on emitted progress lines
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, needle: &str) -> usize {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .matches(needle)
                .count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            name: "Primary".to_string(),
            url: "https://primary.example".to_string(),
            fee_model: FeeModel::Eip1559,
        }
    }

    fn receipt_json() -> Value {
        json!({ "blockNumber": "0x64", "status": "0x1", "gasUsed": "0xc350" })
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_after_receipt_appears() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut rpc = MockRpcClient::new();
        rpc.expect_call().returning(move |_, _, _| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Ok(Value::Null),
                // A flaky read in between must not end the wait
                2 => Err(FireError::Transport("connection reset".to_string())),
                _ => Ok(receipt_json()),
            }
        });

        let endpoint = endpoint();
        let provider = ChainProvider::new(&rpc, &endpoint);
        let poller = ConfirmationPoller::default();

        let started = Instant::now();
        let result = poller
            .await_confirmation(&provider, H256::repeat_byte(1), Duration::from_secs(120))
            .await;

        assert_eq!(
            result,
            Confirmation::Confirmed(TransactionReceipt {
                block_number: 100,
                status: ReceiptStatus::Success,
                gas_used: U256::from(50_000),
            })
        );
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_receipt_is_terminal() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call()
            .times(1)
            .returning(|_, _, _| Ok(json!({ "blockNumber": "0x2", "status": "0x0", "gasUsed": "0x1" })));

        let endpoint = endpoint();
        let provider = ChainProvider::new(&rpc, &endpoint);
        let result = ConfirmationPoller::default()
            .await_confirmation(&provider, H256::repeat_byte(2), Duration::from_secs(60))
            .await;

        match result {
            Confirmation::Confirmed(receipt) => assert_eq!(receipt.status, ReceiptStatus::Reverted),
            other => panic!("expected confirmed receipt, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_no_earlier_than_deadline() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call().returning(|_, _, _| Ok(Value::Null));

        let endpoint = endpoint();
        let provider = ChainProvider::new(&rpc, &endpoint);
        let timeout = Duration::from_secs(12);

        let started = Instant::now();
        let result = ConfirmationPoller::default()
            .await_confirmation(&provider, H256::repeat_byte(3), timeout)
            .await;

        assert_eq!(result, Confirmation::TimedOut);
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < timeout + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_without_status_ends_the_wait() {
        let mut rpc = MockRpcClient::new();
        rpc.expect_call().times(1).returning(|_, _, _| {
            Ok(json!({ "blockNumber": "0x64", "root": "0x11", "gasUsed": "0x5208" }))
        });

        let endpoint = endpoint();
        let provider = ChainProvider::new(&rpc, &endpoint);
        let result = ConfirmationPoller::default()
            .await_confirmation(&provider, H256::repeat_byte(4), Duration::from_secs(30))
            .await;

        match result {
            Confirmation::Confirmed(receipt) => {
                assert_eq!(receipt.block_number, 100);
                assert_eq!(receipt.status, ReceiptStatus::Unknown);
            }
            other => panic!("expected confirmed receipt, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_progress_every_interval() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut rpc = MockRpcClient::new();
        rpc.expect_call().returning(|_, _, _| Ok(Value::Null));

        let endpoint = endpoint();
        let provider = ChainProvider::new(&rpc, &endpoint);
        let result = ConfirmationPoller::default()
            .await_confirmation(&provider, H256::repeat_byte(5), Duration::from_secs(60))
            .await;

        assert_eq!(result, Confirmation::TimedOut);
        // At 15s, 30s and 45s; the 60s tick is the deadline
        assert_eq!(logs.count("Still waiting"), 3);
    }
}
