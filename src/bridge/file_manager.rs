// 文件管理通道
//
// openFolder(path) / openFile(path)

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::storage::{OpenFolderOutcome, PublicStorageService, StorageError, StorageErrorCode};

use super::{MethodCall, MethodCallHandler, MethodResult};

pub struct FileManagerChannel {
    service: Arc<PublicStorageService>,
}

impl FileManagerChannel {
    pub fn new(service: Arc<PublicStorageService>) -> Self {
        Self { service }
    }

    fn open_folder(&self, path: &str) -> MethodResult {
        match self.service.open_folder(Path::new(path)) {
            Ok(OpenFolderOutcome::Shared { path: latest, .. }) => {
                let name = display_name(&latest);
                info!("API: 打开文件夹 {}，已分享最近文件 {}", path, name);
                MethodResult::success(format!("File shared: {}", name))
            }
            Ok(OpenFolderOutcome::PromptIssued) => {
                info!("API: 打开文件夹 {}，目录为空，已弹出选择器", path);
                MethodResult::success("Folder picker opened")
            }
            Err(e) => storage_error_result(e),
        }
    }

    fn open_file(&self, path: &str) -> MethodResult {
        let file = Path::new(path);
        match self.service.open_file(file) {
            Ok(_) => {
                info!("API: 打开文件 {}", path);
                MethodResult::success(format!("File shared: {}", display_name(file)))
            }
            Err(e) => storage_error_result(e),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn storage_error_result(e: StorageError) -> MethodResult {
    let code = match e.code {
        StorageErrorCode::DirectoryNotFound => "FOLDER_NOT_FOUND",
        StorageErrorCode::FileNotFound => "FILE_NOT_FOUND",
        _ => "ERROR",
    };

    if code == "ERROR" {
        error!("文件管理操作失败: {}", e);
    } else {
        warn!("文件管理操作失败: {}", e);
    }

    MethodResult::error(code, e.to_string())
}

impl MethodCallHandler for FileManagerChannel {
    fn on_method_call(&self, call: &MethodCall) -> MethodResult {
        let open: fn(&Self, &str) -> MethodResult = match call.method.as_str() {
            "openFolder" => Self::open_folder,
            "openFile" => Self::open_file,
            _ => return MethodResult::NotImplemented,
        };

        match call.argument_str("path") {
            Some(path) => open(self, path),
            None => MethodResult::error("INVALID_PATH", "Path is null"),
        }
    }
}
