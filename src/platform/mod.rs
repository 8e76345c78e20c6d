// 平台协作方接口
//
// 目录服务、分享分发、目录选择器、重新索引通知。核心逻辑只依赖这些 trait，
// 具体实现由宿主注入。

mod catalog;
mod events;

pub use catalog::LocalCatalog;
pub use events::{pump_host_events, HostEvent, HostEventSender};

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::{Collection, ShareTicket};

/// 目录条目的不透明标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntryId(String);

impl CatalogEntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 目录服务错误
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("目录服务不可用: {0}")]
    Unavailable(String),

    #[error("目录服务拒绝创建条目: {0}")]
    InsertRejected(String),

    #[error("目录条目不存在或状态不符: {0}")]
    EntryNotFound(String),

    #[error("目录服务 I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 外部分发错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("宿主事件通道已关闭")]
    ChannelClosed,

    #[error("宿主拒绝请求: {0}")]
    Rejected(String),
}

/// 写入通道
pub type WriteChannel = Box<dyn Write + Send>;

/// 内容索引目录服务
///
/// 通过不透明条目标识（而非文件系统路径）管理共享存储中的文件。
pub trait ContentCatalog: Send + Sync {
    /// 登记一个处于 pending 状态的条目
    fn insert_pending_entry(
        &self,
        name: &str,
        mime_type: &str,
        relative_path: &str,
        collection: Collection,
    ) -> Result<CatalogEntryId, CatalogError>;

    /// 打开条目的写入通道
    fn open_write_channel(&self, id: &CatalogEntryId) -> Result<WriteChannel, CatalogError>;

    /// 清除 pending 标记，条目对其他应用可见
    fn clear_pending(&self, id: &CatalogEntryId) -> Result<(), CatalogError>;

    /// 查询条目的真实路径（可能未知）
    fn query_direct_path(&self, id: &CatalogEntryId) -> Option<PathBuf>;

    /// 为现有文件生成可分享的间接引用
    fn reference_for_file(&self, path: &Path) -> Result<String, CatalogError>;
}

/// 外部分享选择器（发出即返回，不等待用户选择）
pub trait ShareDispatcher: Send + Sync {
    fn present_chooser(&self, ticket: ShareTicket) -> Result<(), DispatchError>;
}

/// 目录选择提示（发出即返回，结果不回传）
pub trait DirectoryPicker: Send + Sync {
    fn request_directory_selection(&self) -> Result<(), DispatchError>;
}

/// 重新索引通知（仅建议性）
pub trait ReindexNotifier: Send + Sync {
    fn notify(&self, path: &Path, mime_type: &str) -> Result<(), DispatchError>;
}

/// 关闭重新索引时使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReindexNotifier;

impl ReindexNotifier for NoopReindexNotifier {
    fn notify(&self, _path: &Path, _mime_type: &str) -> Result<(), DispatchError> {
        Ok(())
    }
}
