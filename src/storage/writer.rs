// 公共存储写入
//
// 两种写入协议，按平台能力等级在构造时选定：
// - Indirect：登记 pending 条目 → 打开写入通道 → 写入并刷新 → 清除 pending
// - Direct：创建目录 → 写入暂存文件并落盘 → 重命名到目标文件名

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::platform::{CatalogEntryId, ContentCatalog, ReindexNotifier};

use super::types::*;

/// 写入协议
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProtocol {
    /// 经目录服务中转
    Indirect,
    /// 直接写文件系统
    Direct,
}

impl WriteProtocol {
    pub fn for_level(level: CapabilityLevel) -> Self {
        if level.requires_brokered_writes() {
            Self::Indirect
        } else {
            Self::Direct
        }
    }
}

/// 公共存储写入器
pub struct PublishingWriter {
    protocol: WriteProtocol,
    /// Direct 协议下的公共存储根目录
    public_root: PathBuf,
    catalog: Arc<dyn ContentCatalog>,
    notifier: Arc<dyn ReindexNotifier>,
    /// 暂存文件序号
    next_staging: AtomicU64,
}

/// 暂存写入目标
trait StagingSink: Write {
    /// 刷新并落盘
    fn sync(&mut self) -> io::Result<()>;
}

impl StagingSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl PublishingWriter {
    pub fn new(
        level: CapabilityLevel,
        public_root: impl Into<PathBuf>,
        catalog: Arc<dyn ContentCatalog>,
        notifier: Arc<dyn ReindexNotifier>,
    ) -> Self {
        Self {
            protocol: WriteProtocol::for_level(level),
            public_root: public_root.into(),
            catalog,
            notifier,
            next_staging: AtomicU64::new(1),
        }
    }

    pub fn protocol(&self) -> WriteProtocol {
        self.protocol
    }

    /// 写入并发布文件
    ///
    /// 文件名无效时在任何 I/O 之前返回 `InvalidInput`。
    /// 同名重复写入：Direct 覆盖旧文件，Indirect 生成新的独立条目。
    pub fn publish(
        &self,
        destination: &ResolvedDestination,
        file_name: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<PublishedArtifact, StorageError> {
        validate_file_name(file_name)?;
        validate_relative_path(&destination.relative_path)?;

        let artifact = match self.protocol {
            WriteProtocol::Indirect => {
                self.publish_indirect(destination, file_name, mime_type, payload)?
            }
            WriteProtocol::Direct => {
                self.publish_direct(destination, file_name, mime_type, payload)?
            }
        };

        info!(
            "文件已发布: {} ({} 字节, 协议={:?})",
            artifact.reference,
            payload.len(),
            self.protocol
        );
        Ok(artifact)
    }

    fn publish_indirect(
        &self,
        destination: &ResolvedDestination,
        file_name: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<PublishedArtifact, StorageError> {
        // 1. 登记 pending 条目
        let id = self
            .catalog
            .insert_pending_entry(
                file_name,
                mime_type,
                &destination.relative_path,
                destination.collection(),
            )
            .map_err(|e| {
                StorageError::new(StorageErrorCode::CatalogInsertFailed)
                    .with_message(format!("创建目录条目失败: {}", e))
                    .with_path(format!("{}/{}", destination.relative_path, file_name))
            })?;

        let mut artifact = PublishedArtifact::pending(id.to_string());

        // 2-3. 写入内容；失败时 pending 条目保留为未完成状态，不做回滚
        if let Err(e) = self.stream_into_entry(&id, payload) {
            warn!("写入中断，遗留未完成的 pending 条目: {}, 错误: {}", id, e);
            return Err(e);
        }

        // 4. 清除 pending，对外可见
        self.catalog.clear_pending(&id).map_err(|e| {
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("发布目录条目失败: {}", e))
                .with_path(id.to_string())
        })?;
        artifact.is_pending = false;

        if let Some(path) = self.catalog.query_direct_path(&id) {
            self.notify_reindex(&path, mime_type);
        } else {
            debug!("目录条目没有可用的真实路径，跳过重新索引: {}", id);
        }

        Ok(artifact)
    }

    fn stream_into_entry(&self, id: &CatalogEntryId, payload: &[u8]) -> Result<(), StorageError> {
        let mut sink = self.catalog.open_write_channel(id).map_err(|e| {
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("打开写入通道失败: {}", e))
                .with_path(id.to_string())
        })?;

        sink.write_all(payload)
            .and_then(|_| sink.flush())
            .map_err(|e| {
                StorageError::new(StorageErrorCode::WriteFailed)
                    .with_message(format!("写入失败: {}", e))
                    .with_path(id.to_string())
            })?;

        debug!("已写入 {} 字节: {}", payload.len(), id);
        Ok(())
    }

    fn publish_direct(
        &self,
        destination: &ResolvedDestination,
        file_name: &str,
        mime_type: &str,
        payload: &[u8],
    ) -> Result<PublishedArtifact, StorageError> {
        // 1. 确保目标目录存在
        let dir = self.public_root.join(&destination.relative_path);
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("创建目录失败: {}", e))
                .with_path(dir.to_string_lossy().to_string())
        })?;

        // 2. 写入暂存文件，完整落盘后才重命名到目标文件名（同名文件被替换）
        let path = dir.join(file_name);
        let staging = self.staging_path(file_name)?;
        let file = File::create(&staging).map_err(|e| {
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("创建暂存文件失败: {}", e))
                .with_path(staging.to_string_lossy().to_string())
        })?;

        // 3. 写入、落盘、发布
        commit_staged(file, payload, &staging, &path)?;

        let absolute = dunce::canonicalize(&path).unwrap_or(path);

        // 4. 重新索引（建议性）
        self.notify_reindex(&absolute, mime_type);

        Ok(PublishedArtifact::published(
            absolute.to_string_lossy().to_string(),
        ))
    }

    /// 在公共存储根目录下的暂存目录中分配暂存文件路径
    fn staging_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let staging_dir = self.public_root.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).map_err(|e| {
            StorageError::new(StorageErrorCode::StorageUnavailable)
                .with_message(format!("创建暂存目录失败: {}", e))
                .with_path(staging_dir.to_string_lossy().to_string())
        })?;

        let n = self.next_staging.fetch_add(1, Ordering::SeqCst);
        Ok(staging_dir.join(format!("direct-{}-{}-{}", std::process::id(), n, file_name)))
    }

    fn notify_reindex(&self, path: &Path, mime_type: &str) {
        match self.notifier.notify(path, mime_type) {
            Ok(()) => debug!("已通知重新索引: {:?}", path),
            Err(e) => warn!("重新索引通知失败（已忽略）: {:?}, 错误: {}", path, e),
        }
    }
}

/// 把内容写入暂存文件并重命名到目标路径
///
/// 任何一步失败都删除暂存文件，目标路径保持原状。
fn commit_staged<S: StagingSink>(
    mut sink: S,
    payload: &[u8],
    staging: &Path,
    target: &Path,
) -> Result<(), StorageError> {
    let written = sink.write_all(payload).and_then(|_| sink.sync());
    // 重命名前关闭句柄
    drop(sink);

    let result = written
        .map_err(|e| {
            StorageError::new(StorageErrorCode::WriteFailed)
                .with_message(format!("写入失败: {}", e))
                .with_path(target.to_string_lossy().to_string())
        })
        .and_then(|_| {
            fs::rename(staging, target).map_err(|e| {
                StorageError::new(StorageErrorCode::StorageUnavailable)
                    .with_message(format!("发布文件失败: {}", e))
                    .with_path(target.to_string_lossy().to_string())
            })
        });

    if result.is_err() {
        if let Err(e) = fs::remove_file(staging) {
            warn!("删除暂存文件失败: {:?}, 错误: {}", staging, e);
        } else {
            debug!("已丢弃未完成的暂存文件: {:?}", staging);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_support::RecordingDispatcher;
    use crate::platform::{CatalogError, LocalCatalog, NoopReindexNotifier, WriteChannel};
    use crate::storage::StoragePathResolver;
    use std::io;
    use tempfile::TempDir;

    const LEGACY: CapabilityLevel = CapabilityLevel(28);
    const SCOPED: CapabilityLevel = CapabilityLevel(29);

    fn setup(level: CapabilityLevel) -> (TempDir, Arc<LocalCatalog>, PublishingWriter) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = Arc::new(LocalCatalog::new(temp_dir.path(), "bridge.test"));
        let writer = PublishingWriter::new(
            level,
            temp_dir.path(),
            catalog.clone(),
            Arc::new(NoopReindexNotifier),
        );
        (temp_dir, catalog, writer)
    }

    fn pdf_destination() -> ResolvedDestination {
        StoragePathResolver::new("App").resolve("application/pdf", Some("Invoices"))
    }

    fn count_files(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| {
                let p = e.path();
                if p.is_dir() {
                    count_files(&p)
                } else {
                    1
                }
            })
            .sum()
    }

    #[test]
    fn test_protocol_selection() {
        assert_eq!(WriteProtocol::for_level(LEGACY), WriteProtocol::Direct);
        assert_eq!(WriteProtocol::for_level(SCOPED), WriteProtocol::Indirect);
        assert_eq!(setup(SCOPED).2.protocol(), WriteProtocol::Indirect);
    }

    #[test]
    fn test_direct_round_trip() {
        let (temp_dir, _catalog, writer) = setup(LEGACY);
        let payload = b"%PDF-1.7 fake".to_vec();

        let artifact = writer
            .publish(&pdf_destination(), "report.pdf", "application/pdf", &payload)
            .unwrap();

        assert!(!artifact.is_pending);
        assert!(Path::new(&artifact.reference).is_absolute());
        assert!(artifact.reference.ends_with("report.pdf"));
        assert_eq!(fs::read(&artifact.reference).unwrap(), payload);
        assert!(temp_dir
            .path()
            .join("Documents/App/Invoices/report.pdf")
            .exists());
    }

    #[test]
    fn test_direct_overwrites() {
        let (temp_dir, _catalog, writer) = setup(LEGACY);
        let dest = pdf_destination();

        let first = writer
            .publish(&dest, "report.pdf", "application/pdf", b"first payload, longer")
            .unwrap();
        let second = writer
            .publish(&dest, "report.pdf", "application/pdf", b"second")
            .unwrap();

        assert_eq!(first.reference, second.reference);
        assert_eq!(fs::read(&second.reference).unwrap(), b"second");
        assert_eq!(count_files(&temp_dir.path().join("Documents/App/Invoices")), 1);
    }

    #[test]
    fn test_empty_file_name_rejected_before_io() {
        for level in [LEGACY, SCOPED] {
            let (temp_dir, _catalog, writer) = setup(level);
            let err = writer
                .publish(&pdf_destination(), "", "application/pdf", b"data")
                .unwrap_err();
            assert_eq!(err.code, StorageErrorCode::InvalidInput);
            assert_eq!(count_files(temp_dir.path()), 0);
            assert!(!temp_dir.path().join("Documents").exists());
        }
    }

    #[test]
    fn test_indirect_round_trip() {
        let (_temp_dir, catalog, writer) = setup(SCOPED);
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let dest = StoragePathResolver::new("App").resolve("image/png", None);

        let artifact = writer
            .publish(&dest, "chart.png", "image/png", &payload)
            .unwrap();

        assert!(!artifact.is_pending);
        assert!(artifact.reference.starts_with("content://bridge.test/images/"));

        let path = catalog
            .query_direct_path(&CatalogEntryId::new(artifact.reference.clone()))
            .unwrap();
        assert!(path.ends_with("Pictures/App/chart.png"));
        assert_eq!(fs::read(path).unwrap(), payload);
    }

    #[test]
    fn test_indirect_is_not_idempotent() {
        let (temp_dir, _catalog, writer) = setup(SCOPED);
        let dest = pdf_destination();

        let a = writer.publish(&dest, "r.pdf", "application/pdf", b"a").unwrap();
        let b = writer.publish(&dest, "r.pdf", "application/pdf", b"b").unwrap();

        assert_ne!(a.reference, b.reference);
        assert_eq!(count_files(&temp_dir.path().join("Documents/App/Invoices")), 2);
    }

    #[test]
    fn test_reindex_notified_and_failure_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Arc::new(LocalCatalog::new(temp_dir.path(), "bridge.test"));

        let recorder = Arc::new(RecordingDispatcher::default());
        let writer = PublishingWriter::new(SCOPED, temp_dir.path(), catalog.clone(), recorder.clone());
        writer.publish(&pdf_destination(), "a.pdf", "application/pdf", b"x").unwrap();
        let reindexed = recorder.reindexed.lock().clone();
        assert_eq!(reindexed.len(), 1);
        assert_eq!(reindexed[0].1, "application/pdf");

        let failing = Arc::new(RecordingDispatcher::failing());
        let writer = PublishingWriter::new(LEGACY, temp_dir.path(), catalog, failing.clone());
        let artifact = writer
            .publish(&pdf_destination(), "b.pdf", "application/pdf", b"y")
            .unwrap();
        assert_eq!(fs::read(&artifact.reference).unwrap(), b"y");
        assert_eq!(failing.reindexed.lock().len(), 1);
    }

    #[test]
    fn test_escaping_destination_rejected_before_io() {
        let outside = TempDir::new().unwrap();
        let root = outside.path().join("public");
        fs::create_dir(&root).unwrap();

        for level in [LEGACY, SCOPED] {
            let catalog = Arc::new(LocalCatalog::new(&root, "bridge.test"));
            let writer =
                PublishingWriter::new(level, &root, catalog, Arc::new(NoopReindexNotifier));
            let dest = StoragePathResolver::new("App").resolve("text/plain", Some("../../../escaped"));

            let err = writer
                .publish(&dest, "evil.txt", "text/plain", b"x")
                .unwrap_err();
            assert_eq!(err.code, StorageErrorCode::InvalidInput, "{:?}", level);
            assert!(!outside.path().join("escaped").exists());
            assert_eq!(count_files(outside.path()), 0);
        }
    }

    #[test]
    fn test_direct_staging_is_not_listed_with_published_files() {
        let (temp_dir, _catalog, writer) = setup(LEGACY);
        writer
            .publish(&pdf_destination(), "report.pdf", "application/pdf", b"done")
            .unwrap();

        let staging_dir = temp_dir.path().join(STAGING_DIR);
        assert_eq!(count_files(&staging_dir), 0);
        assert_eq!(count_files(&temp_dir.path().join("Documents/App/Invoices")), 1);
    }

    /// 写入若干字节后报错的暂存文件
    struct PartialSink {
        file: File,
        remaining: usize,
    }

    impl Write for PartialSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "磁盘已满"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl StagingSink for PartialSink {
        fn sync(&mut self) -> io::Result<()> {
            self.file.sync()
        }
    }

    #[test]
    fn test_direct_write_failure_discards_staging_and_keeps_target() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("staged.tmp");
        let target = temp_dir.path().join("report.pdf");
        fs::write(&target, b"previous version").unwrap();

        let sink = PartialSink {
            file: File::create(&staging).unwrap(),
            remaining: 4,
        };
        let err = commit_staged(sink, b"new payload that will not fit", &staging, &target)
            .unwrap_err();

        assert_eq!(err.code, StorageErrorCode::WriteFailed);
        assert!(!staging.exists());
        assert_eq!(fs::read(&target).unwrap(), b"previous version");
    }

    #[test]
    fn test_direct_write_failure_leaves_no_target() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("staged.tmp");
        let target = temp_dir.path().join("fresh.bin");

        let sink = PartialSink {
            file: File::create(&staging).unwrap(),
            remaining: 1,
        };
        let err = commit_staged(sink, b"abc", &staging, &target).unwrap_err();

        assert_eq!(err.code, StorageErrorCode::WriteFailed);
        assert!(!staging.exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_direct_publish_failure_discards_staging() {
        let (temp_dir, _catalog, writer) = setup(LEGACY);
        // 目标名被非空目录占用，重命名失败
        let occupied = temp_dir.path().join("Documents/App/Invoices/report.pdf");
        fs::create_dir_all(&occupied).unwrap();
        fs::write(occupied.join("keep.txt"), b"k").unwrap();

        let err = writer
            .publish(&pdf_destination(), "report.pdf", "application/pdf", b"data")
            .unwrap_err();

        assert_eq!(err.code, StorageErrorCode::StorageUnavailable);
        assert_eq!(count_files(&temp_dir.path().join(STAGING_DIR)), 0);
        assert!(occupied.join("keep.txt").exists());
    }

    /// 在指定步骤注入失败
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fault {
        Insert,
        Channel,
        Write,
        Clear,
    }

    /// 可按步骤注入失败的目录服务
    struct FaultyCatalog {
        inner: LocalCatalog,
        fault: Fault,
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "设备已移除"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ContentCatalog for FaultyCatalog {
        fn insert_pending_entry(
            &self,
            name: &str,
            mime_type: &str,
            relative_path: &str,
            collection: crate::storage::Collection,
        ) -> Result<CatalogEntryId, CatalogError> {
            if self.fault == Fault::Insert {
                return Err(CatalogError::InsertRejected("配额已满".to_string()));
            }
            self.inner
                .insert_pending_entry(name, mime_type, relative_path, collection)
        }

        fn open_write_channel(&self, id: &CatalogEntryId) -> Result<WriteChannel, CatalogError> {
            match self.fault {
                Fault::Channel => Err(CatalogError::Unavailable("服务断开".to_string())),
                Fault::Write => Ok(Box::new(BrokenSink)),
                _ => self.inner.open_write_channel(id),
            }
        }

        fn clear_pending(&self, id: &CatalogEntryId) -> Result<(), CatalogError> {
            if self.fault == Fault::Clear {
                return Err(CatalogError::Unavailable("服务断开".to_string()));
            }
            self.inner.clear_pending(id)
        }

        fn query_direct_path(&self, id: &CatalogEntryId) -> Option<PathBuf> {
            self.inner.query_direct_path(id)
        }

        fn reference_for_file(&self, path: &Path) -> Result<String, CatalogError> {
            self.inner.reference_for_file(path)
        }
    }

    fn faulty_publish(temp_dir: &TempDir, fault: Fault) -> StorageError {
        let catalog = FaultyCatalog {
            inner: LocalCatalog::new(temp_dir.path(), "bridge.test"),
            fault,
        };
        let writer = PublishingWriter::new(
            SCOPED,
            temp_dir.path(),
            Arc::new(catalog),
            Arc::new(NoopReindexNotifier),
        );
        writer
            .publish(&pdf_destination(), "r.pdf", "application/pdf", b"x")
            .unwrap_err()
    }

    #[test]
    fn test_indirect_insert_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = faulty_publish(&temp_dir, Fault::Insert);
        assert_eq!(err.code, StorageErrorCode::CatalogInsertFailed);
    }

    #[test]
    fn test_indirect_channel_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = faulty_publish(&temp_dir, Fault::Channel);
        assert_eq!(err.code, StorageErrorCode::StorageUnavailable);
    }

    #[test]
    fn test_indirect_clear_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = faulty_publish(&temp_dir, Fault::Clear);
        assert_eq!(err.code, StorageErrorCode::StorageUnavailable);
        assert!(!temp_dir.path().join("Documents/App/Invoices/r.pdf").exists());
    }

    #[test]
    fn test_indirect_write_failure_leaves_nothing_visible() {
        let temp_dir = TempDir::new().unwrap();
        let err = faulty_publish(&temp_dir, Fault::Write);
        assert_eq!(err.code, StorageErrorCode::WriteFailed);

        let dir = temp_dir.path().join("Documents/App/Invoices");
        assert_eq!(count_files(&dir), 0);
        // 遗留的 pending 占位文件留在暂存目录，不会被清理
        assert_eq!(count_files(&temp_dir.path().join(STAGING_DIR)), 1);
    }
}
