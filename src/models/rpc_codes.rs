//! JSON-RPC error codes from EIP-1474.

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

pub const INVALID_INPUT: i64 = -32000;
pub const RESOURCE_NOT_FOUND: i64 = -32001;
pub const RESOURCE_UNAVAILABLE: i64 = -32002;
pub const TRANSACTION_REJECTED: i64 = -32003;
pub const METHOD_NOT_SUPPORTED: i64 = -32004;
pub const LIMIT_EXCEEDED: i64 = -32005;
pub const JSON_RPC_VERSION_NOT_SUPPORTED: i64 = -32006;
