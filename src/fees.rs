use ethers::types::U256;

use crate::chain::{ChainResult, GovernanceChain};

/// Fixed precision base for the fee factor, mirroring the ratio precision
/// governance contracts use on chain.
const PRECISION_FACTOR_BASE: u64 = 1_000;

/// Fee quote for one transaction, in wei.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasEstimate {
    pub average: U256,
    pub max: U256,
}

/// Scales the worst-case fee down to the expected one using integer
/// arithmetic only; floating point never touches the wei amounts.
pub fn approximate(gas_units: U256, max_fee_per_gas: U256, fee_factor: f64) -> GasEstimate {
    let max = gas_units * max_fee_per_gas;
    let factor = (fee_factor * PRECISION_FACTOR_BASE as f64).round() as u64;
    let average = max * U256::from(factor) / U256::from(PRECISION_FACTOR_BASE);
    GasEstimate { average, max }
}

/// Turns a raw gas-unit estimate into a fee quote using the live network fee
/// sample from the active chain backend. One suspension point; fails with
/// `FeeDataUnavailable` when the backend cannot supply fee data.
pub async fn estimate<C>(chain: &C, gas_units: U256, fee_factor: f64) -> ChainResult<GasEstimate>
where
    C: GovernanceChain + ?Sized,
{
    let max_fee_per_gas = chain.max_fee_per_gas().await?;
    Ok(approximate(gas_units, max_fee_per_gas, fee_factor))
}
