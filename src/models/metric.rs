use chrono::{SecondsFormat, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::models::Result;

/// Partial gas telemetry for a single user operation.
///
/// An operation is reported incrementally (submission, simulation, inclusion),
/// so every field is optional and absent fields are left out of the message.
/// Numeric values serialize as `0x`-prefixed hex so amounts beyond 2^53 survive
/// consumers that parse JSON numbers as doubles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    #[serde(default, with = "hex_u64", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_op_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefund: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_l1_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_l2_gas_limit: Option<U256>,
    /// Expected pre-verification gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_pre_verification_gas: Option<U256>,
    /// Calculated pre-verification gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_pre_verification_gas1: Option<U256>,
    /// Pre-verification gas actually paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_pre_verification_gas2: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<H256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_time: Option<String>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_entry_point(mut self, entry_point: Address) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    pub fn with_user_op_hash(mut self, hash: H256) -> Self {
        self.user_op_hash = Some(hash);
        self
    }

    pub fn with_prefund(mut self, prefund: U256) -> Self {
        self.prefund = Some(prefund);
        self
    }

    pub fn with_gas_limits(mut self, l1: U256, l2: U256) -> Self {
        self.rt_l1_gas_limit = Some(l1);
        self.rt_l2_gas_limit = Some(l2);
        self
    }

    pub fn with_actual_gas(mut self, actual_gas: U256) -> Self {
        self.actual_gas = Some(actual_gas);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: H256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Record the submission time as an RFC 3339 UTC timestamp.
    pub fn stamp_submitted(mut self) -> Self {
        self.submit_time = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Message body as sent to the ingestion queue.
    pub fn to_message_body(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

mod hex_u64 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format!("{:#x}", v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            let digits = s.strip_prefix("0x").unwrap_or(&s);
            u64::from_str_radix(digits, 16).map_err(D::Error::custom)
        })
        .transpose()
    }
}
