// 最近文件定位
//
// 列出目录的直接子项，只保留普通文件，取修改时间最大的一个

use std::fs;
use std::path::Path;

use tracing::debug;

use super::types::{LocatedFile, StorageError, StorageErrorCode};

/// 最近文件定位器
pub struct LatestFileLocator;

impl LatestFileLocator {
    /// 查找目录中最近修改的文件
    ///
    /// # Returns
    /// - `Ok(Some(file))` - 找到文件（修改时间相同时任取其一）
    /// - `Ok(None)` - 目录中没有普通文件
    /// - `Err` - 目录不存在或不是目录
    pub fn locate_latest(dir: &Path) -> Result<Option<LocatedFile>, StorageError> {
        if !dir.is_dir() {
            return Err(StorageError::new(StorageErrorCode::DirectoryNotFound)
                .with_path(dir.to_string_lossy().to_string()));
        }

        let read_dir = fs::read_dir(dir).map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", dir, e);
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("读取目录失败: {}", e))
                .with_path(dir.to_string_lossy().to_string())
        })?;

        let latest = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                // 跟随符号链接判断是否为普通文件
                let metadata = fs::metadata(&path).ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let last_modified = metadata.modified().ok()?;
                Some(LocatedFile {
                    path,
                    last_modified,
                })
            })
            .max_by_key(|file| file.last_modified);

        match &latest {
            Some(file) => debug!(
                "最近修改的文件: {:?} ({})",
                file.path,
                file.last_modified_iso8601()
            ),
            None => debug!("目录中没有文件: {:?}", dir),
        }

        Ok(latest)
    }
}
