//! Chain module - JSON-RPC access to the configured endpoints
//!
//! This module provides:
//! - A thin JSON-RPC client with a bounded per-call timeout
//! - Typed wrappers for the handful of calls the sender needs
//! - Advisory endpoint health probing
//! - Receipt polling after submission

pub mod confirmation;
pub mod health;
pub mod provider;
pub mod rpc;

pub use confirmation::{Confirmation, ConfirmationPoller};
pub use provider::ChainProvider;
pub use rpc::{HttpRpcClient, RpcClient};
