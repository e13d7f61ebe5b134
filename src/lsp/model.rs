// SPDX-License-Identifier: MIT
//! JSON-RPC 2.0 wire message shape shared by the channel and the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcMessage {
    pub fn request(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(Value::from(id)),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn is_response(&self) -> bool {
        self.method.is_none() && self.id.is_some()
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some() && self.id.is_some()
    }

    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    pub fn id_as_u64(&self) -> Option<u64> {
        self.id.as_ref().and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_id_and_method() {
        let msg = RpcMessage::request(1, "initialize", serde_json::json!({}));
        assert!(msg.is_request());
        assert!(!msg.is_notification());
        assert!(!msg.is_response());
    }

    #[test]
    fn notification_has_no_id() {
        let msg = RpcMessage::notification("initialized", serde_json::json!({}));
        assert!(msg.is_notification());
        assert!(!msg.is_request());
    }

    #[test]
    fn response_roundtrips_id() {
        let msg = RpcMessage::response(serde_json::json!(7), serde_json::json!({"ok": true}));
        assert!(msg.is_response());
        assert_eq!(msg.id_as_u64(), Some(7));
    }

    #[test]
    fn serializes_without_absent_fields() {
        let msg = RpcMessage::notification("textDocument/didOpen", serde_json::json!({"uri": "file:///a"}));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(!json.contains("\"result\""));
    }
}
