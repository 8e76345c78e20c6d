// 本地目录服务
//
// 以文件系统模拟共享存储的目录服务：pending 条目写入根目录下暂存目录中的临时文件，
// 清除 pending 时重命名到目标目录下的最终文件名。

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::storage::{is_confined_relative_path, Collection, STAGING_DIR};

use super::{CatalogEntryId, CatalogError, ContentCatalog, WriteChannel};

/// 已发布条目的路径缓存容量
const PUBLISHED_CACHE_CAPACITY: usize = 256;

#[derive(Debug)]
struct PendingEntry {
    final_path: PathBuf,
    pending_path: PathBuf,
}

#[derive(Debug, Default)]
struct EntryTable {
    /// 尚未发布的条目
    pending: HashMap<u64, PendingEntry>,
    /// 最近发布的条目（序号, 最终路径），超出容量时淘汰最早的
    published: VecDeque<(u64, PathBuf)>,
}

/// 本地目录服务
pub struct LocalCatalog {
    /// 公共存储根目录
    root: PathBuf,
    /// 引用前缀中的 authority
    authority: String,
    next_id: AtomicU64,
    entries: Mutex<EntryTable>,
}

impl LocalCatalog {
    pub fn new(root: impl Into<PathBuf>, authority: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            authority: authority.into(),
            next_id: AtomicU64::new(1),
            entries: Mutex::new(EntryTable::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_uri(&self, collection: Collection, n: u64) -> String {
        format!("content://{}/{}/{}", self.authority, collection.as_str(), n)
    }

    /// 从条目标识中取出序号
    fn parse_id(&self, id: &CatalogEntryId) -> Option<u64> {
        let prefix = format!("content://{}/", self.authority);
        let rest = id.as_str().strip_prefix(&prefix)?;
        let (collection, n) = rest.split_once('/')?;
        if collection != Collection::Images.as_str() && collection != Collection::Files.as_str() {
            return None;
        }
        n.parse().ok()
    }

    /// 选出目录下未被占用的显示名：`name`、`name (1).ext`、`name (2).ext` ...
    fn unique_display_name(
        dir: &Path,
        name: &str,
        pending: &HashMap<u64, PendingEntry>,
    ) -> String {
        let taken = |candidate: &str| {
            let path = dir.join(candidate);
            path.exists() || pending.values().any(|e| e.final_path == path)
        };

        if !taken(name) {
            return name.to_string();
        }

        let as_path = Path::new(name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        let ext = as_path.extension().map(|e| e.to_string_lossy().to_string());

        let mut n = 1u32;
        loop {
            let candidate = match &ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    #[cfg(test)]
    fn table_sizes(&self) -> (usize, usize) {
        let entries = self.entries.lock();
        (entries.pending.len(), entries.published.len())
    }
}

impl ContentCatalog for LocalCatalog {
    fn insert_pending_entry(
        &self,
        name: &str,
        mime_type: &str,
        relative_path: &str,
        collection: Collection,
    ) -> Result<CatalogEntryId, CatalogError> {
        if !is_confined_relative_path(relative_path) {
            return Err(CatalogError::InsertRejected(format!(
                "相对路径越界: {}",
                relative_path
            )));
        }

        let dir = self.root.join(relative_path);
        let staging_dir = self.root.join(STAGING_DIR);
        for d in [&dir, &staging_dir] {
            fs::create_dir_all(d)
                .map_err(|e| CatalogError::Unavailable(format!("无法创建目录 {:?}: {}", d, e)))?;
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();

        let display_name = Self::unique_display_name(&dir, name, &entries.pending);
        let final_path = dir.join(&display_name);
        let pending_path = staging_dir.join(format!("{}-{}", n, display_name));

        File::create(&pending_path).map_err(|e| {
            CatalogError::InsertRejected(format!("无法创建占位文件 {:?}: {}", pending_path, e))
        })?;

        entries.pending.insert(
            n,
            PendingEntry {
                final_path,
                pending_path,
            },
        );

        let uri = self.entry_uri(collection, n);
        debug!(
            "已登记 pending 条目: {} (name={}, mime={}, path={})",
            uri, display_name, mime_type, relative_path
        );
        Ok(CatalogEntryId::new(uri))
    }

    fn open_write_channel(&self, id: &CatalogEntryId) -> Result<WriteChannel, CatalogError> {
        let n = self
            .parse_id(id)
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))?;

        let pending_path = self
            .entries
            .lock()
            .pending
            .get(&n)
            .map(|entry| entry.pending_path.clone())
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))?;

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&pending_path)?;
        Ok(Box::new(file))
    }

    fn clear_pending(&self, id: &CatalogEntryId) -> Result<(), CatalogError> {
        let n = self
            .parse_id(id)
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))?;

        let mut entries = self.entries.lock();
        let entry = entries
            .pending
            .remove(&n)
            .ok_or_else(|| CatalogError::EntryNotFound(id.to_string()))?;

        // 登记后目标名被其他写入者占用时，重新选择显示名
        let mut final_path = entry.final_path.clone();
        if final_path.exists() {
            if let (Some(dir), Some(name)) = (entry.final_path.parent(), entry.final_path.file_name()) {
                let name = name.to_string_lossy().to_string();
                let renamed = dir.join(Self::unique_display_name(dir, &name, &entries.pending));
                warn!("目标文件已被占用，改用新名称: {:?} -> {:?}", final_path, renamed);
                final_path = renamed;
            }
        }

        if let Err(e) = fs::rename(&entry.pending_path, &final_path) {
            entries.pending.insert(n, entry);
            return Err(e.into());
        }

        debug!("条目已发布: {} -> {:?}", id, final_path);
        if entries.published.len() >= PUBLISHED_CACHE_CAPACITY {
            entries.published.pop_front();
        }
        entries.published.push_back((n, final_path));
        Ok(())
    }

    fn query_direct_path(&self, id: &CatalogEntryId) -> Option<PathBuf> {
        let n = self.parse_id(id)?;
        let entries = self.entries.lock();
        entries
            .published
            .iter()
            .rev()
            .find(|(k, _)| *k == n)
            .map(|(_, path)| path.clone())
    }

    fn reference_for_file(&self, path: &Path) -> Result<String, CatalogError> {
        let canonical = dunce::canonicalize(path)
            .map_err(|_| CatalogError::EntryNotFound(path.to_string_lossy().to_string()))?;
        let root = dunce::canonicalize(&self.root)
            .map_err(|e| CatalogError::Unavailable(format!("公共存储根目录不可用: {}", e)))?;

        let relative = canonical
            .strip_prefix(&root)
            .map_err(|_| CatalogError::EntryNotFound(format!("文件不在公共存储中: {:?}", path)))?;

        let encoded: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(seg) => Some(urlencoding::encode(&seg.to_string_lossy()).into_owned()),
                _ => None,
            })
            .collect();

        Ok(format!("content://{}/root/{}", self.authority, encoded.join("/")))
    }
}
