// 公共存储根目录校验

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 路径校验结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathValidationResult {
    /// 路径是否完全可用
    pub valid: bool,
    /// 路径是否存在
    pub exists: bool,
    /// 路径是否可写
    pub is_writable: bool,
    /// 是否是目录
    pub is_directory: bool,
    /// 校验消息
    pub message: String,
    /// 详细错误信息（如果有）
    pub details: Option<String>,
}

impl PathValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            exists: true,
            is_writable: true,
            is_directory: true,
            message: "路径验证通过".to_string(),
            details: None,
        }
    }

    pub fn failure(message: String, details: Option<String>) -> Self {
        Self {
            valid: false,
            exists: false,
            is_writable: false,
            is_directory: false,
            message,
            details,
        }
    }
}

/// 路径校验器
pub struct PathValidator;

impl PathValidator {
    /// 校验公共存储根目录
    ///
    /// 执行以下检查：
    /// 1. 路径是否存在
    /// 2. 路径是否为目录
    /// 3. 路径是否可写
    pub fn validate(path: &Path) -> PathValidationResult {
        if !path.exists() {
            return PathValidationResult::failure(
                "路径不存在".to_string(),
                Some(format!("公共存储根目录 {:?} 不存在", path)),
            );
        }

        if !path.is_dir() {
            return PathValidationResult {
                valid: false,
                exists: true,
                is_writable: false,
                is_directory: false,
                message: "路径不是目录".to_string(),
                details: Some(format!("公共存储根目录 {:?} 不是一个目录", path)),
            };
        }

        if !Self::check_writable(path) {
            return PathValidationResult {
                valid: false,
                exists: true,
                is_writable: false,
                is_directory: true,
                message: "路径不可写".to_string(),
                details: Some(format!("公共存储根目录 {:?} 没有写入权限", path)),
            };
        }

        PathValidationResult::success()
    }

    /// 通过创建临时文件检查目录是否可写
    fn check_writable(path: &Path) -> bool {
        let test_file = path.join(".write_check");

        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                true
            }
            Err(_) => false,
        }
    }

    /// 确保目录存在后再校验
    pub fn prepare(path: &Path) -> Result<PathValidationResult> {
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("无法创建目录: {:?}", path))?;
            tracing::info!("已创建公共存储根目录: {:?}", path);
        }
        Ok(Self::validate(path))
    }

    /// 校验失败时返回带详情的错误
    pub fn validate_or_error(path: &Path) -> Result<()> {
        let result = Self::prepare(path)?;

        if !result.valid {
            let error_msg = match result.details {
                Some(details) => format!("{}\n详情: {}", result.message, details),
                None => result.message,
            };
            anyhow::bail!(error_msg);
        }

        Ok(())
    }
}
