// 公共存储模块数据类型定义

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 公共存储错误码
/// 错误码范围：60001 - 60099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// 缺少必填参数或参数无效（在任何 I/O 之前拦截）
    InvalidInput = 60001,
    /// 目录不存在
    DirectoryNotFound = 60002,
    /// 文件不存在
    FileNotFound = 60003,
    /// 存储不可用（目录服务或文件系统无法访问）
    StorageUnavailable = 60004,
    /// 写入失败
    WriteFailed = 60005,
    /// 创建目录条目失败
    CatalogInsertFailed = 60006,
    /// 外部分发失败（仅提示，不向调用方传播）
    ExternalDispatchFailed = 60007,
}

impl StorageErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "参数无效",
            Self::DirectoryNotFound => "目录不存在",
            Self::FileNotFound => "文件不存在",
            Self::StorageUnavailable => "公共存储不可用",
            Self::WriteFailed => "写入文件失败",
            Self::CatalogInsertFailed => "创建目录条目失败",
            Self::ExternalDispatchFailed => "外部分发失败",
        }
    }
}

/// 公共存储错误
#[derive(Debug)]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for StorageError {}

/// 平台能力等级（对应平台 API 版本号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityLevel(pub u32);

impl CapabilityLevel {
    /// 从此等级开始，共享存储写入必须经过目录服务
    pub const BROKERED_WRITES: CapabilityLevel = CapabilityLevel(29);
    /// 从此等级开始，分享文件必须使用间接引用
    pub const BROKERED_SHARE: CapabilityLevel = CapabilityLevel(24);

    pub fn requires_brokered_writes(&self) -> bool {
        *self >= Self::BROKERED_WRITES
    }

    pub fn requires_brokered_share(&self) -> bool {
        *self >= Self::BROKERED_SHARE
    }
}

/// 内容分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pictures,
    Documents,
}

impl Category {
    /// 分类在公共存储中的根目录名
    pub fn root_dir(&self) -> &'static str {
        match self {
            Self::Pictures => "Pictures",
            Self::Documents => "Documents",
        }
    }

    /// 分类对应的目录服务集合
    pub fn collection(&self) -> Collection {
        match self {
            Self::Pictures => Collection::Images,
            Self::Documents => Collection::Files,
        }
    }
}

/// 目录服务集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Images,
    Files,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Files => "files",
        }
    }
}

/// 保存请求
#[derive(Debug, Clone)]
pub struct StorageRequest {
    /// 文件名（不含路径分隔符）
    pub file_name: String,
    /// MIME 类型
    pub mime_type: String,
    /// 可选子目录
    pub subfolder: Option<String>,
    /// 文件内容
    pub payload: Vec<u8>,
}

/// 暂存目录（公共存储根目录下），未完成的写入都放在这里
pub const STAGING_DIR: &str = ".pending";

impl StorageRequest {
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_file_name(&self.file_name)?;

        if let Some(subfolder) = &self.subfolder {
            validate_relative_path(subfolder)?;
        }

        Ok(())
    }
}

/// 相对路径只能由普通目录名组成（不允许 `..`、`.`、绝对路径或盘符）
pub fn is_confined_relative_path(relative_path: &str) -> bool {
    Path::new(relative_path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// 校验相对路径不会逃出公共存储根目录
pub fn validate_relative_path(relative_path: &str) -> Result<(), StorageError> {
    if is_confined_relative_path(relative_path) {
        Ok(())
    } else {
        Err(StorageError::new(StorageErrorCode::InvalidInput)
            .with_message("路径越界")
            .with_path(relative_path))
    }
}

/// 校验文件名：非空、不含路径分隔符、不是 `.` / `..`
pub fn validate_file_name(file_name: &str) -> Result<(), StorageError> {
    if file_name.trim().is_empty() {
        return Err(StorageError::new(StorageErrorCode::InvalidInput)
            .with_message("文件名不能为空"));
    }

    if file_name.contains('/') || file_name.contains('\\') {
        return Err(StorageError::new(StorageErrorCode::InvalidInput)
            .with_message("文件名不能包含路径分隔符")
            .with_path(file_name));
    }

    if file_name == "." || file_name == ".." {
        return Err(StorageError::new(StorageErrorCode::InvalidInput)
            .with_message("文件名无效")
            .with_path(file_name));
    }

    Ok(())
}

/// 解析后的公共存储目标位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDestination {
    pub category: Category,
    /// 相对路径：分类根目录 + 应用命名空间 + 可选子目录
    #[serde(rename = "relativePath")]
    pub relative_path: String,
}

impl ResolvedDestination {
    pub fn collection(&self) -> Collection {
        self.category.collection()
    }
}

/// 已发布的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    /// 不透明引用（content:// URI 或绝对路径）
    pub reference: String,
    /// 写入过程中为 true，发布完成后为 false
    #[serde(rename = "isPending")]
    pub is_pending: bool,
}

impl PublishedArtifact {
    pub fn pending(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            is_pending: true,
        }
    }

    pub fn published(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            is_pending: false,
        }
    }
}

/// 目录中最近修改的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub path: PathBuf,
    pub last_modified: SystemTime,
}

impl LocatedFile {
    pub fn last_modified_iso8601(&self) -> String {
        let datetime: DateTime<Utc> = self.last_modified.into();
        datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

/// 分享单据，交给外部选择器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareTicket {
    /// 内容引用
    pub reference: String,
    /// MIME 类型
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// 建议主题
    pub subject: String,
    /// 建议正文
    pub body: String,
    /// 选择器标题
    #[serde(rename = "chooserTitle")]
    pub chooser_title: String,
    /// 是否授予接收方读权限
    #[serde(rename = "grantRead")]
    pub grant_read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_code() {
        assert_eq!(StorageErrorCode::InvalidInput.code(), 60001);
        assert_eq!(StorageErrorCode::FileNotFound.code(), 60003);
        assert_eq!(StorageErrorCode::ExternalDispatchFailed.code(), 60007);
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::new(StorageErrorCode::DirectoryNotFound).with_path("/nope");
        assert_eq!(err.to_string(), "目录不存在: /nope");

        let err = StorageError::new(StorageErrorCode::WriteFailed).with_message("磁盘已满");
        assert_eq!(err.to_string(), "磁盘已满");
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("report.pdf").is_ok());
        assert!(validate_file_name("photo 1.png").is_ok());

        for bad in ["", "   ", "a/b.txt", "a\\b.txt", ".", ".."] {
            let err = validate_file_name(bad).unwrap_err();
            assert_eq!(err.code, StorageErrorCode::InvalidInput, "{:?}", bad);
        }
    }

    #[test]
    fn test_relative_path_confinement() {
        for ok in ["Invoices", "2024/March", "Documents/App/Invoices"] {
            assert!(validate_relative_path(ok).is_ok(), "{:?}", ok);
        }

        for bad in ["../escaped", "../../../x", "a/../../b", "/etc", "./a"] {
            let err = validate_relative_path(bad).unwrap_err();
            assert_eq!(err.code, StorageErrorCode::InvalidInput, "{:?}", bad);
        }
    }

    #[test]
    fn test_request_rejects_escaping_subfolder() {
        let req = StorageRequest {
            file_name: "evil.txt".to_string(),
            mime_type: "text/plain".to_string(),
            subfolder: Some("../../../escaped".to_string()),
            payload: b"x".to_vec(),
        };
        assert_eq!(req.validate().unwrap_err().code, StorageErrorCode::InvalidInput);
    }

    #[test]
    fn test_capability_level() {
        assert!(CapabilityLevel(29).requires_brokered_writes());
        assert!(CapabilityLevel(33).requires_brokered_writes());
        assert!(!CapabilityLevel(28).requires_brokered_writes());

        assert!(CapabilityLevel(24).requires_brokered_share());
        assert!(!CapabilityLevel(23).requires_brokered_share());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(Category::Pictures.root_dir(), "Pictures");
        assert_eq!(Category::Documents.collection(), Collection::Files);
        assert_eq!(Category::Pictures.collection().as_str(), "images");
    }
}
