//! JSON RPC envelope: `{method, tag, arguments}` requests and `{result, arguments}`
//! responses, UTF-8 JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

pub const SUCCESS: &str = "success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub tag: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<u64>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, tag: u64, arguments: Value) -> Self {
        Self {
            method: method.into(),
            tag,
            arguments,
        }
    }

    pub fn to_body(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl RpcResponse {
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }

    /// The `arguments` object when `result` is `"success"`.
    pub fn into_arguments(self) -> Result<Value, ProtocolError> {
        if self.result == SUCCESS {
            Ok(self.arguments)
        } else {
            Err(ProtocolError::Rejected {
                result: self.result,
            })
        }
    }
}
