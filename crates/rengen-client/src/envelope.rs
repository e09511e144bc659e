//! 列表响应规范化
//!
//! 列表接口可能返回裸数组，也可能返回带 `results` 字段的分页包装。

use rengen_core::{RengenError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 列表响应
#[derive(Debug, Clone, PartialEq)]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Paged {
        count: Option<u64>,
        next: Option<String>,
        results: Vec<T>,
    },
}

impl<T: DeserializeOwned> ListEnvelope<T> {
    /// 从JSON解析，两种形状都接受
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => Ok(Self::Bare(serde_json::from_value(value)?)),
            Value::Object(mut map) => {
                let results = map
                    .remove("results")
                    .ok_or_else(|| decode_error("list response has neither an array nor `results`"))?;
                Ok(Self::Paged {
                    count: map.get("count").and_then(Value::as_u64),
                    next: map.get("next").and_then(Value::as_str).map(str::to_string),
                    results: serde_json::from_value(results)?,
                })
            }
            Value::Null => Ok(Self::Bare(Vec::new())),
            other => Err(decode_error(&format!("unexpected list response: {}", other))),
        }
    }
}

fn decode_error(message: &str) -> RengenError {
    RengenError::Decode(serde::de::Error::custom(message))
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) => items,
            Self::Paged { results, .. } => results,
        }
    }

    /// 后端报告的总数，裸数组时为数组长度
    pub fn total(&self) -> u64 {
        match self {
            Self::Bare(items) => items.len() as u64,
            Self::Paged { count, results, .. } => count.unwrap_or(results.len() as u64),
        }
    }

    pub fn has_more(&self) -> bool {
        matches!(self, Self::Paged { next: Some(_), .. })
    }
}
