// 媒体存储通道
//
// saveToPublicStorage(fileName, mimeType, subfolder?, bytes) -> 引用字符串

use std::sync::Arc;

use tracing::{error, info};

use crate::storage::{PublicStorageService, StorageRequest};

use super::{MethodCall, MethodCallHandler, MethodResult};

/// 未提供 mimeType 时的默认值
const DEFAULT_MIME_TYPE: &str = "image/png";

const SAVE_ERROR: &str = "SAVE_ERROR";

pub struct MediaStoreChannel {
    service: Arc<PublicStorageService>,
}

impl MediaStoreChannel {
    pub fn new(service: Arc<PublicStorageService>) -> Self {
        Self { service }
    }

    fn save_to_public_storage(&self, call: &MethodCall) -> MethodResult {
        let payload = match call.argument_bytes("bytes") {
            Ok(bytes) => bytes.unwrap_or_default(),
            Err(message) => {
                error!("保存文件失败: {}", message);
                return MethodResult::error(SAVE_ERROR, message);
            }
        };

        let req = StorageRequest {
            file_name: call.argument_str("fileName").unwrap_or_default().to_string(),
            mime_type: call
                .argument_str("mimeType")
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
            subfolder: call.argument_str("subfolder").map(str::to_string),
            payload,
        };

        match self.service.save_to_public_storage(&req) {
            Ok(artifact) => {
                info!("API: 已保存到公共存储: {}", artifact.reference);
                MethodResult::success(artifact.reference)
            }
            Err(e) => {
                error!("保存文件失败: {} (code={})", e, e.code.code());
                MethodResult::error(SAVE_ERROR, e.to_string())
            }
        }
    }
}

impl MethodCallHandler for MediaStoreChannel {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult {
        match call.method.as_str() {
            "saveToPublicStorage" => self.save_to_public_storage(call),
            _ => MethodResult::NotImplemented,
        }
    }
}
