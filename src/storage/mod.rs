// 公共存储模块
//
// 解析公共存储位置、写入并发布文件、定位最近文件、交接给外部分享

mod locator;
mod resolver;
mod service;
mod share;
mod types;
mod writer;

pub use locator::LatestFileLocator;
pub use resolver::StoragePathResolver;
pub use service::{Collaborators, OpenFolderOutcome, PublicStorageService};
pub use share::{file_uri, mime_type_for_path, ShareHandoff, ShareTexts, FALLBACK_MIME_TYPE};
pub use types::*;
pub use writer::{PublishingWriter, WriteProtocol};
