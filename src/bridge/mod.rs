// 方法桥模块
//
// 宿主以"通道名 + 方法名 + 参数表"调用，返回成功值或结构化错误

mod file_manager;
mod media_store;

pub use file_manager::FileManagerChannel;
pub use media_store::MediaStoreChannel;

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StorageConfig;
use crate::storage::PublicStorageService;

/// 方法参数表
pub type Arguments = serde_json::Map<String, Value>;

/// 方法调用
#[derive(Debug, Clone, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// 读取字符串参数；缺失、null 或类型不符时返回 None
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// 读取字节参数：支持 base64 字符串或整数数组
    ///
    /// 缺失或 null 时返回 `Ok(None)`
    pub fn argument_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        match self.arguments.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| format!("参数 {} 不是合法的 base64: {}", key, e)),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| format!("参数 {} 包含非字节元素: {}", key, v))
                })
                .collect::<Result<Vec<u8>, String>>()
                .map(Some),
            Some(other) => Err(format!("参数 {} 类型无效: {}", key, other)),
        }
    }
}

/// 方法调用结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResult {
    Success {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResult {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// 错误码（仅错误结果）
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// 通道处理器
pub trait MethodCallHandler: Send + Sync {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult;
}

/// 通道注册表
#[derive(Default, Clone)]
pub struct BridgeRegistry {
    handlers: HashMap<String, Arc<dyn MethodCallHandler>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置注册媒体存储与文件管理两个通道
    pub fn with_storage_channels(config: &StorageConfig, service: Arc<PublicStorageService>) -> Self {
        let mut registry = Self::new();
        registry.register(
            config.media_store_channel.clone(),
            Arc::new(MediaStoreChannel::new(service.clone())),
        );
        registry.register(
            config.file_manager_channel.clone(),
            Arc::new(FileManagerChannel::new(service)),
        );
        registry
    }

    pub fn register(&mut self, channel: impl Into<String>, handler: Arc<dyn MethodCallHandler>) {
        let channel = channel.into();
        tracing::debug!("注册方法通道: {}", channel);
        self.handlers.insert(channel, handler);
    }

    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 调用通道方法；通道未注册时返回 None
    pub fn invoke(&self, channel: &str, call: &MethodCall) -> Option<MethodResult> {
        self.handlers
            .get(channel)
            .map(|handler| handler.on_method_call(call))
    }
}
