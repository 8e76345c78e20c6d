// 应用状态

use crate::bridge::BridgeRegistry;
use crate::config::AppConfig;
use crate::platform::{HostEventSender, LocalCatalog, NoopReindexNotifier, ReindexNotifier};
use crate::storage::{Collaborators, PublicStorageService};
use std::sync::Arc;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 公共存储服务
    pub storage: Arc<PublicStorageService>,
    /// 方法通道注册表
    pub registry: Arc<BridgeRegistry>,
}

impl AppState {
    /// 创建新的应用状态
    ///
    /// 分享、目录选择、重新索引都转成宿主事件发往 `events`
    pub fn new(config: AppConfig, events: HostEventSender) -> Self {
        let storage_config = &config.storage;

        let catalog = Arc::new(LocalCatalog::new(
            &storage_config.public_root,
            &storage_config.provider_authority,
        ));
        let events = Arc::new(events);
        let notifier: Arc<dyn ReindexNotifier> = if storage_config.reindex_enabled {
            events.clone()
        } else {
            Arc::new(NoopReindexNotifier)
        };

        let storage = Arc::new(PublicStorageService::new(
            storage_config,
            Collaborators {
                catalog,
                dispatcher: events.clone(),
                picker: events,
                notifier,
            },
        ));

        let registry = BridgeRegistry::with_storage_channels(storage_config, storage.clone());

        tracing::info!(
            "公共存储服务已就绪: 根目录={:?}, 写入协议={:?}, 通道={:?}",
            storage_config.public_root,
            storage.writer().protocol(),
            registry.channels()
        );

        Self {
            config: Arc::new(config),
            storage,
            registry: Arc::new(registry),
        }
    }
}
