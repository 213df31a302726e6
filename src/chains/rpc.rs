use async_trait::async_trait;
use ethers::{
    providers::{JsonRpcClient, Middleware, Provider},
    types::{BlockNumber, U256},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::{BundlerError, FeeEstimate, Result};

/// Structured failure of a JSON-RPC call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcFault {
    /// The endpoint answered with a JSON-RPC error object.
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// The call never produced a JSON-RPC answer.
    Transport(String),
}

impl RpcFault {
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcFault::Rpc { code, .. } => Some(*code),
            RpcFault::Transport(_) => None,
        }
    }
}

impl fmt::Display for RpcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcFault::Rpc { code, message, .. } => write!(f, "RPC error {}: {}", code, message),
            RpcFault::Transport(message) => write!(f, "transport failure: {}", message),
        }
    }
}

impl From<RpcFault> for BundlerError {
    fn from(fault: RpcFault) -> Self {
        match fault {
            RpcFault::Rpc { code, message, .. } => BundlerError::RpcError { code, message },
            RpcFault::Transport(message) => BundlerError::TransportError(message),
        }
    }
}

/// Raw access to a JSON-RPC endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcSend: Send + Sync {
    /// Stable identity of the underlying connection, used as a cache key.
    fn connection_id(&self) -> String;

    async fn send(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFault>;
}

/// Chain id and native fee estimation of a provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn fee_data(&self) -> Result<FeeEstimate>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Minimal JSON-RPC over HTTP client that keeps error codes intact.
///
/// Every client built with [`HttpRpcClient::new`] is a distinct connection;
/// clones share the connection identity of their original.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    connection: u64,
}

impl HttpRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundlerError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            connection: NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl RpcSend for HttpRpcClient {
    fn connection_id(&self) -> String {
        format!("{}#{}", self.rpc_url, self.connection)
    }

    async fn send(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFault> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self.http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcFault::Transport(format!("HTTP request failed: {}", e)))?;

        let rpc_response: RpcResponse = response.json().await
            .map_err(|e| RpcFault::Transport(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcFault::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }
}

/// Priority fee assumed when deriving EIP-1559 fees from the latest base fee.
pub const DEFAULT_PRIORITY_FEE_WEI: u64 = 1_500_000_000;

#[async_trait]
impl<P> FeeProvider for Provider<P>
where
    P: JsonRpcClient + 'static,
{
    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.get_chainid().await
            .map_err(|e| BundlerError::TransportError(format!("Failed to get chain ID: {}", e)))?;
        Ok(chain_id.as_u64())
    }

    async fn fee_data(&self) -> Result<FeeEstimate> {
        let gas_price = self.get_gas_price().await
            .map_err(|e| BundlerError::TransportError(format!("Failed to get gas price: {}", e)))?;

        let block = self.get_block(BlockNumber::Latest).await
            .map_err(|e| BundlerError::TransportError(format!("Failed to get latest block: {}", e)))?;

        let mut fees = FeeEstimate::legacy(gas_price);

        if let Some(base_fee) = block.and_then(|b| b.base_fee_per_gas) {
            let priority_fee = U256::from(DEFAULT_PRIORITY_FEE_WEI);
            fees.last_base_fee_per_gas = Some(base_fee);
            fees.max_priority_fee_per_gas = Some(priority_fee);
            fees.max_fee_per_gas = Some(base_fee * 2 + priority_fee);
        }

        Ok(fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rpc_codes;

    #[test]
    fn test_fault_conversion_keeps_code() {
        let fault = RpcFault::Rpc {
            code: rpc_codes::INVALID_PARAMS,
            message: "missing value for required argument 0".to_string(),
            data: None,
        };
        assert_eq!(fault.code(), Some(rpc_codes::INVALID_PARAMS));

        let err: BundlerError = fault.into();
        assert_eq!(err.code(), Some(rpc_codes::INVALID_PARAMS));
    }

    #[test]
    fn test_transport_fault_has_no_code() {
        let fault = RpcFault::Transport("connection refused".to_string());
        assert_eq!(fault.code(), None);
        assert!(fault.to_string().contains("connection refused"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"the method debug_traceCall does not exist/is not available"}}"#;
        let response: RpcResponse = serde_json::from_str(raw).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, rpc_codes::METHOD_NOT_FOUND);
        assert!(response.result.is_none());
    }

    #[test]
    fn test_connection_identity_is_per_client() {
        let timeout = Duration::from_secs(1);
        let first = HttpRpcClient::new("http://localhost:8545", timeout).unwrap();
        let second = HttpRpcClient::new("http://localhost:8545", timeout).unwrap();

        assert_ne!(first.connection_id(), second.connection_id());
        assert_eq!(first.connection_id(), first.clone().connection_id());
        assert!(first.connection_id().starts_with("http://localhost:8545#"));
    }
}
