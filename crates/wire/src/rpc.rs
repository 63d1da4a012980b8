// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 request/response envelopes.

use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: String,
    pub message: String,
}

impl JsonRpcError {
    pub fn invalid_auth() -> Self {
        Self { code: "invalid-auth".to_string(), message: "Invalid Auth".to_string() }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self { code: "method-not-found".to_string(), message: format!("Unknown method '{method}'") }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self { code: "invalid-params".to_string(), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { code: "internal-error".to_string(), message: message.into() }
    }
}

/// A JSON-RPC response: either `{result, id, jsonrpc}` or `{error, id, jsonrpc}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
    Success { result: serde_json::Value, id: serde_json::Value, jsonrpc: String },
    Error { error: JsonRpcError, id: serde_json::Value, jsonrpc: String },
}

impl JsonRpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self::Success { result, id, jsonrpc: JSONRPC_VERSION.to_string() }
    }

    pub fn error(id: serde_json::Value, error: JsonRpcError) -> Self {
        Self::Error { error, id, jsonrpc: JSONRPC_VERSION.to_string() }
    }

    /// The unauthenticated-request envelope; always carries a null id since
    /// the request body is never parsed before the auth check runs.
    pub fn invalid_auth() -> Self {
        Self::error(serde_json::Value::Null, JsonRpcError::invalid_auth())
    }
}
