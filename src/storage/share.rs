// 文件分享交接
//
// 为现有文件生成可分享的引用，组装分享单据并交给外部选择器。
// 分发是发出即返回的：不等待用户选择目标应用。

use std::path::{Component, Path};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::platform::{ContentCatalog, ShareDispatcher};

use super::types::*;

/// 未知扩展名时的 MIME 类型
pub const FALLBACK_MIME_TYPE: &str = "*/*";

/// 分享单据中的文案
#[derive(Debug, Clone)]
pub struct ShareTexts {
    /// 主题前缀，主题为 "<前缀> - <文件名>"
    pub subject_prefix: String,
    pub body: String,
    pub chooser_title: String,
}

impl ShareTexts {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            subject_prefix: config.share_subject_prefix.clone(),
            body: config.share_body.clone(),
            chooser_title: config.chooser_title.clone(),
        }
    }
}

/// 按扩展名推断 MIME 类型
pub fn mime_type_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string()
}

/// 生成 `file://` 直接引用
pub fn file_uri(path: &Path) -> String {
    let absolute = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let segments: Vec<String> = absolute
        .components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(urlencoding::encode(&seg.to_string_lossy()).into_owned()),
            _ => None,
        })
        .collect();
    format!("file:///{}", segments.join("/"))
}

/// 分享交接
pub struct ShareHandoff {
    level: CapabilityLevel,
    catalog: Arc<dyn ContentCatalog>,
    dispatcher: Arc<dyn ShareDispatcher>,
    texts: ShareTexts,
}

impl ShareHandoff {
    pub fn new(
        level: CapabilityLevel,
        catalog: Arc<dyn ContentCatalog>,
        dispatcher: Arc<dyn ShareDispatcher>,
        texts: ShareTexts,
    ) -> Self {
        Self {
            level,
            catalog,
            dispatcher,
            texts,
        }
    }

    /// 分享现有文件
    ///
    /// 文件不存在时返回 `FileNotFound`，且不会发出任何分发。
    /// 分发失败只记录日志，不向调用方传播。
    pub fn share_existing(&self, path: &Path) -> Result<ShareTicket, StorageError> {
        if !path.exists() {
            return Err(StorageError::new(StorageErrorCode::FileNotFound)
                .with_path(path.to_string_lossy().to_string()));
        }

        let reference = self.shareable_reference(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let ticket = ShareTicket {
            reference,
            mime_type: mime_type_for_path(path),
            subject: format!("{} - {}", self.texts.subject_prefix, file_name),
            body: self.texts.body.clone(),
            chooser_title: self.texts.chooser_title.clone(),
            grant_read: true,
        };

        match self.dispatcher.present_chooser(ticket.clone()) {
            Ok(()) => info!("已发起分享: {} ({})", ticket.reference, ticket.mime_type),
            Err(e) => {
                let err = StorageError::new(StorageErrorCode::ExternalDispatchFailed)
                    .with_message(e.to_string())
                    .with_path(ticket.reference.clone());
                warn!("分享选择器分发失败（已忽略）: {}", err);
            }
        }

        Ok(ticket)
    }

    fn shareable_reference(&self, path: &Path) -> Result<String, StorageError> {
        if self.level.requires_brokered_share() {
            self.catalog.reference_for_file(path).map_err(|e| {
                StorageError::new(StorageErrorCode::StorageUnavailable)
                    .with_message(format!("生成分享引用失败: {}", e))
                    .with_path(path.to_string_lossy().to_string())
            })
        } else {
            Ok(file_uri(path))
        }
    }
}
