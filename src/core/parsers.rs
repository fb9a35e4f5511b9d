//! Ready-made parse hooks for the common "single result element" response
//! shape, e.g. `{"IsValidISBN13Response": {"IsValidISBN13Result": "true"}}`.

use crate::core::hooks::ParseHook;
use crate::utils::error::{ProxyError, Result};
use serde_json::Value;
use std::sync::Arc;

/// 沿著只有一個子元素的路徑往下找到文字節點
pub fn leaf_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(fields) if fields.len() == 1 => fields.values().next().and_then(leaf_text),
        _ => None,
    }
}

fn require_leaf(value: &Value) -> Result<&str> {
    leaf_text(value).ok_or_else(|| {
        ProxyError::protocol(format!("expected a single result value, got {}", value))
    })
}

/// 原樣回傳
pub fn raw() -> ParseHook {
    Arc::new(|value: Value| -> Result<Value> { Ok(value) })
}

pub fn text() -> ParseHook {
    Arc::new(|value: Value| -> Result<Value> {
        Ok(Value::String(require_leaf(&value)?.to_string()))
    })
}

pub fn boolean() -> ParseHook {
    Arc::new(|value: Value| -> Result<Value> {
        let text = require_leaf(&value)?;
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(ProxyError::protocol(format!(
                "'{}' is not a boolean",
                other
            ))),
        }
    })
}

pub fn integer() -> ParseHook {
    Arc::new(|value: Value| -> Result<Value> {
        let text = require_leaf(&value)?.trim();
        text.parse::<i64>()
            .map(Value::from)
            .map_err(|e| ProxyError::protocol(format!("'{}' is not an integer: {}", text, e)))
    })
}

/// 設定檔裡用名稱指定 parser
pub fn by_name(name: &str) -> Option<ParseHook> {
    match name {
        "raw" => Some(raw()),
        "text" => Some(text()),
        "boolean" => Some(boolean()),
        "integer" => Some(integer()),
        _ => None,
    }
}

pub const PARSER_NAMES: &[&str] = &["raw", "text", "boolean", "integer"];
