// 配置管理模块

pub mod path_validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use path_validator::{PathValidationResult, PathValidator};

use crate::storage::CapabilityLevel;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 公共存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_server_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 请求体大小上限（字节，默认 64MB）
    ///
    /// 字节参数以 base64 或整数数组传输，请求体约为文件大小的 4/3 倍以上
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    18890
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024 // 64MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// 公共存储配置
///
/// 通道名、命名空间、authority、分享文案都在这里显式配置，
/// 构造组件时传入，不使用模块级常量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 公共存储根目录
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
    /// 应用命名空间（分类根目录下的应用目录名）
    #[serde(default = "default_app_namespace")]
    pub app_namespace: String,
    /// 平台能力等级（API 版本号）
    #[serde(default = "default_capability_level")]
    pub capability_level: CapabilityLevel,
    /// 间接引用的 authority
    #[serde(default = "default_provider_authority")]
    pub provider_authority: String,
    /// 媒体存储通道名
    #[serde(default = "default_media_store_channel")]
    pub media_store_channel: String,
    /// 文件管理通道名
    #[serde(default = "default_file_manager_channel")]
    pub file_manager_channel: String,
    /// 分享主题前缀
    #[serde(default = "default_share_subject_prefix")]
    pub share_subject_prefix: String,
    /// 分享正文
    #[serde(default = "default_share_body")]
    pub share_body: String,
    /// 分享选择器标题
    #[serde(default = "default_chooser_title")]
    pub chooser_title: String,
    /// 写入后是否通知重新索引
    #[serde(default = "default_reindex_enabled")]
    pub reindex_enabled: bool,
}

fn default_public_root() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("public_storage")
}

fn default_app_namespace() -> String {
    "MediaBridge".to_string()
}

fn default_capability_level() -> CapabilityLevel {
    CapabilityLevel::BROKERED_WRITES
}

fn default_provider_authority() -> String {
    "storage_bridge.fileprovider".to_string()
}

fn default_media_store_channel() -> String {
    "storage_bridge/media_store".to_string()
}

fn default_file_manager_channel() -> String {
    "storage_bridge/file_manager".to_string()
}

fn default_share_subject_prefix() -> String {
    "Backup".to_string()
}

fn default_share_body() -> String {
    format!("File exported from {}", default_app_namespace())
}

fn default_chooser_title() -> String {
    "Share file".to_string()
}

fn default_reindex_enabled() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_root: default_public_root(),
            app_namespace: default_app_namespace(),
            capability_level: default_capability_level(),
            provider_authority: default_provider_authority(),
            media_store_channel: default_media_store_channel(),
            file_manager_channel: default_file_manager_channel(),
            share_subject_prefix: default_share_subject_prefix(),
            share_body: default_share_body(),
            chooser_title: default_chooser_title(),
            reindex_enabled: default_reindex_enabled(),
        }
    }
}

impl StorageConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        let ns = self.app_namespace.trim_matches('/');
        if ns.contains('/') || ns.contains('\\') || ns == "." || ns == ".." {
            anyhow::bail!("应用命名空间必须是单个目录名: {:?}", self.app_namespace);
        }

        if self.capability_level.0 == 0 {
            anyhow::bail!("平台能力等级必须大于 0");
        }

        if self.media_store_channel.is_empty() || self.file_manager_channel.is_empty() {
            anyhow::bail!("通道名不能为空");
        }

        if self.media_store_channel == self.file_manager_channel {
            anyhow::bail!("媒体存储通道与文件管理通道不能同名: {}", self.media_store_channel);
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config
            .storage
            .validate()
            .context("配置文件中的公共存储配置无效")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.storage
            .validate()
            .context("保存配置失败：公共存储配置无效")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                let default_config = Self::default();

                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {:#}", e);
                }

                default_config
            }
        }
    }
}
