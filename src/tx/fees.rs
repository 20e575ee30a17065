//! Fee field selection per endpoint fee model

use crate::config::FeeModel;

use ethers::types::U256;

const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Configured fee magnitudes in gwei
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSettings {
    pub priority_gwei: u64,
    pub max_gwei: u64,
}

/// Fee fields of a transaction; exactly one variant per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeFields {
    Legacy {
        gas_price: U256,
    },
    DynamicFee {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeFields {
    /// Highest price per gas the sender may pay
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeFields::Legacy { gas_price } => *gas_price,
            FeeFields::DynamicFee {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

fn gwei(value: u64) -> U256 {
    U256::from(value) * U256::from(WEI_PER_GWEI)
}

/// Choose fee fields for an endpoint's fee model
pub fn select_fees(model: FeeModel, settings: FeeSettings) -> FeeFields {
    let priority = gwei(settings.priority_gwei);
    let total = priority + gwei(settings.max_gwei);

    match model {
        FeeModel::Eip1559 => FeeFields::DynamicFee {
            max_fee_per_gas: total,
            max_priority_fee_per_gas: priority,
        },
        FeeModel::Legacy => FeeFields::Legacy { gas_price: total },
    }
}
