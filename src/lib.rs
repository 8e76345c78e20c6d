// Public Storage Bridge Library
// 公共存储桥核心库：保存到共享存储、分享文件、打开文件夹

// 配置管理模块
pub mod config;

// 日志系统
pub mod logging;

// 平台协作方（目录服务、分享、目录选择、重新索引）
pub mod platform;

// 公共存储核心逻辑
pub mod storage;

// 方法通道
pub mod bridge;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use bridge::{BridgeRegistry, MethodCall, MethodCallHandler, MethodResult};
pub use config::{AppConfig, StorageConfig};
pub use platform::{ContentCatalog, HostEvent, HostEventSender, LocalCatalog};
pub use server::AppState;
pub use storage::{
    CapabilityLevel, OpenFolderOutcome, PublicStorageService, PublishedArtifact, StorageError,
    StorageErrorCode, StorageRequest, WriteProtocol,
};
