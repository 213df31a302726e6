use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::chains::rpc::{RpcFault, RpcSend};
use crate::models::rpc_codes;

pub const CLIENT_VERSION_METHOD: &str = "web3_clientVersion";

/// Only full-featured clients (geth and friends) expose call tracing.
pub const FULL_FEATURE_METHOD: &str = "debug_traceCall";

/// What a synthetic call with empty params tells us about a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint recognised the method and rejected the arguments.
    MethodSupported,
    /// The endpoint reported the method as unknown.
    MethodUnsupported,
    /// Anything else: other error codes, transport failures, or a clean answer.
    Indeterminate,
}

impl ProbeOutcome {
    pub fn from_code(code: i64) -> Self {
        match code {
            rpc_codes::INVALID_PARAMS => ProbeOutcome::MethodSupported,
            rpc_codes::METHOD_NOT_FOUND => ProbeOutcome::MethodUnsupported,
            _ => ProbeOutcome::Indeterminate,
        }
    }

    pub fn from_response(response: &std::result::Result<Value, RpcFault>) -> Self {
        match response {
            Err(fault) => fault.code().map_or(ProbeOutcome::Indeterminate, Self::from_code),
            Ok(_) => ProbeOutcome::Indeterminate,
        }
    }

    pub fn is_supported(self) -> bool {
        self == ProbeOutcome::MethodSupported
    }
}

/// Send `method` with no arguments and classify the answer. Not memoized.
pub async fn probe_method(conn: &dyn RpcSend, method: &str) -> ProbeOutcome {
    let response = conn.send(method, json!([])).await;
    let outcome = ProbeOutcome::from_response(&response);
    debug!("Probe of {} on {}: {:?}", method, conn.connection_id(), outcome);
    outcome
}

#[derive(Debug, Default)]
struct ConnectionCapabilities {
    client_version: OnceCell<Option<String>>,
    methods: RwLock<HashMap<String, Arc<OnceCell<bool>>>>,
}

impl ConnectionCapabilities {
    fn method_cell(&self, method: &str) -> Arc<OnceCell<bool>> {
        if let Some(cell) = self.methods.read().unwrap_or_else(|p| p.into_inner()).get(method) {
            return cell.clone();
        }

        self.methods
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(method.to_string())
            .or_default()
            .clone()
    }
}

/// Memoized capability knowledge, keyed by connection identity.
///
/// Each method is probed at most once per connection and the client version
/// is fetched at most once. Probing never fails; anything unexpected reads as
/// "not supported".
#[derive(Debug, Default)]
pub struct CapabilityCache {
    connections: RwLock<HashMap<String, Arc<ConnectionCapabilities>>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, conn: &dyn RpcSend) -> Arc<ConnectionCapabilities> {
        let id = conn.connection_id();
        if let Some(entry) = self.connections.read().unwrap_or_else(|p| p.into_inner()).get(&id) {
            return entry.clone();
        }

        self.connections
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(id)
            .or_default()
            .clone()
    }

    pub async fn supports_method(&self, conn: &dyn RpcSend, method: &str) -> bool {
        let cell = self.entry(conn).method_cell(method);
        *cell
            .get_or_init(|| async { probe_method(conn, method).await.is_supported() })
            .await
    }

    /// Client version reported by the connection, fetched once.
    pub async fn client_version(&self, conn: &dyn RpcSend) -> Option<String> {
        let entry = self.entry(conn);
        entry
            .client_version
            .get_or_init(|| async {
                match conn.send(CLIENT_VERSION_METHOD, json!([])).await {
                    Ok(Value::String(version)) => Some(version),
                    Ok(other) => Some(other.to_string()),
                    Err(e) => {
                        warn!("Failed to read client version of {}: {}", conn.connection_id(), e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether the endpoint offers the debug/tracing extensions.
    pub async fn detect_full_feature_support(&self, conn: &dyn RpcSend) -> bool {
        let version = self.client_version(conn).await;
        debug!("Client version of {}: {:?}", conn.connection_id(), version);

        self.supports_method(conn, FULL_FEATURE_METHOD).await
    }

    pub fn known_connections(&self) -> usize {
        self.connections.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}
