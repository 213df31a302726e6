use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// Gas-pricing parameters, in wei, sufficient to submit a transaction under
/// either legacy or EIP-1559 pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub last_base_fee_per_gas: Option<U256>,
}

impl FeeEstimate {
    pub fn legacy(gas_price: U256) -> Self {
        Self {
            gas_price: Some(gas_price),
            ..Default::default()
        }
    }

    pub fn dynamic(max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Self {
        Self {
            gas_price: None,
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            last_base_fee_per_gas: None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.max_fee_per_gas.is_some() && self.max_priority_fee_per_gas.is_some()
    }

    pub fn is_legacy(&self) -> bool {
        self.gas_price.is_some()
    }

    /// Either a gas price or a complete pair of fee-per-gas values is present.
    pub fn is_interpretable(&self) -> bool {
        let half_dynamic =
            self.max_fee_per_gas.is_some() != self.max_priority_fee_per_gas.is_some();
        !half_dynamic && (self.is_legacy() || self.is_dynamic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpretable_shapes() {
        assert!(FeeEstimate::legacy(U256::from(1)).is_interpretable());
        assert!(FeeEstimate::dynamic(U256::from(2), U256::from(1)).is_interpretable());
        assert!(!FeeEstimate::default().is_interpretable());

        let half = FeeEstimate {
            gas_price: Some(U256::from(1)),
            max_fee_per_gas: Some(U256::from(2)),
            ..Default::default()
        };
        assert!(!half.is_interpretable());
    }

    #[test]
    fn test_dynamic_has_no_gas_price() {
        let fees = FeeEstimate::dynamic(U256::from(40), U256::from(30));
        assert!(fees.is_dynamic());
        assert!(!fees.is_legacy());
        assert_eq!(fees.last_base_fee_per_gas, None);
    }
}
