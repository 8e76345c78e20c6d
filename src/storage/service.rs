// 公共存储服务
//
// 组合路径解析、写入、最近文件定位和分享交接，对外提供三个操作：
// 保存到公共存储、打开文件（分享）、打开文件夹

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::platform::{ContentCatalog, DirectoryPicker, ReindexNotifier, ShareDispatcher};

use super::locator::LatestFileLocator;
use super::resolver::StoragePathResolver;
use super::share::{ShareHandoff, ShareTexts};
use super::types::*;
use super::writer::PublishingWriter;

/// 打开文件夹的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenFolderOutcome {
    /// 找到最近的文件并已发起分享
    Shared { path: PathBuf, ticket: ShareTicket },
    /// 目录中没有文件，已弹出目录选择器
    PromptIssued,
}

/// 宿主注入的协作方
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ContentCatalog>,
    pub dispatcher: Arc<dyn ShareDispatcher>,
    pub picker: Arc<dyn DirectoryPicker>,
    pub notifier: Arc<dyn ReindexNotifier>,
}

/// 公共存储服务
pub struct PublicStorageService {
    resolver: StoragePathResolver,
    writer: PublishingWriter,
    share: ShareHandoff,
    picker: Arc<dyn DirectoryPicker>,
}

impl PublicStorageService {
    /// 创建新的公共存储服务
    pub fn new(config: &StorageConfig, collaborators: Collaborators) -> Self {
        let level = config.capability_level;

        Self {
            resolver: StoragePathResolver::from_config(config),
            writer: PublishingWriter::new(
                level,
                config.public_root.clone(),
                collaborators.catalog.clone(),
                collaborators.notifier,
            ),
            share: ShareHandoff::new(
                level,
                collaborators.catalog,
                collaborators.dispatcher,
                ShareTexts::from_config(config),
            ),
            picker: collaborators.picker,
        }
    }

    pub fn resolver(&self) -> &StoragePathResolver {
        &self.resolver
    }

    pub fn writer(&self) -> &PublishingWriter {
        &self.writer
    }

    /// 保存到公共存储，返回不透明引用
    pub fn save_to_public_storage(
        &self,
        req: &StorageRequest,
    ) -> Result<PublishedArtifact, StorageError> {
        req.validate()?;

        let destination = self
            .resolver
            .resolve(&req.mime_type, req.subfolder.as_deref());

        self.writer
            .publish(&destination, &req.file_name, &req.mime_type, &req.payload)
    }

    /// 打开文件：交给外部分享选择器
    pub fn open_file(&self, path: &Path) -> Result<ShareTicket, StorageError> {
        self.share.share_existing(path)
    }

    /// 打开文件夹：分享最近修改的文件，没有文件时弹出目录选择器
    pub fn open_folder(&self, dir: &Path) -> Result<OpenFolderOutcome, StorageError> {
        match LatestFileLocator::locate_latest(dir)? {
            Some(latest) => {
                let ticket = self.share.share_existing(&latest.path)?;
                Ok(OpenFolderOutcome::Shared {
                    path: latest.path,
                    ticket,
                })
            }
            None => {
                match self.picker.request_directory_selection() {
                    Ok(()) => info!("目录为空，已弹出目录选择器: {:?}", dir),
                    Err(e) => warn!("目录选择器分发失败（已忽略）: {}", e),
                }
                Ok(OpenFolderOutcome::PromptIssued)
            }
        }
    }
}
