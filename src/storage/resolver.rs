// 公共存储路径解析
//
// 纯函数：根据 MIME 类型和可选子目录决定目标分类与相对路径，不做任何 I/O

use crate::config::StorageConfig;

use super::types::{Category, ResolvedDestination};

/// 公共存储路径解析器
#[derive(Debug, Clone)]
pub struct StoragePathResolver {
    /// 应用命名空间（分类根目录下的应用专属目录）
    app_namespace: String,
}

impl StoragePathResolver {
    pub fn new(app_namespace: impl Into<String>) -> Self {
        let app_namespace: String = app_namespace.into();
        Self {
            app_namespace: app_namespace.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.app_namespace.clone())
    }

    pub fn app_namespace(&self) -> &str {
        &self.app_namespace
    }

    /// 按 MIME 类型分类：`image/*` 归入图片，其余（含空值）归入文档
    pub fn classify(mime_type: &str) -> Category {
        let mime = mime_type.trim();
        let is_image = mime
            .get(..6)
            .map(|prefix| prefix.eq_ignore_ascii_case("image/"))
            .unwrap_or(false);

        if is_image {
            Category::Pictures
        } else {
            Category::Documents
        }
    }

    /// 解析目标位置
    ///
    /// 相对路径 = 分类根目录 + "/" + 命名空间 + ("/" + 子目录)
    pub fn resolve(&self, mime_type: &str, subfolder: Option<&str>) -> ResolvedDestination {
        let category = Self::classify(mime_type);

        let mut relative_path = category.root_dir().to_string();
        if !self.app_namespace.is_empty() {
            relative_path.push('/');
            relative_path.push_str(&self.app_namespace);
        }

        // 空白子目录视为未提供
        if let Some(sub) = subfolder.map(|s| s.trim_matches('/')).filter(|s| !s.trim().is_empty()) {
            relative_path.push('/');
            relative_path.push_str(sub);
        }

        ResolvedDestination {
            category,
            relative_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver() -> StoragePathResolver {
        StoragePathResolver::new("MediaBridge")
    }

    #[test]
    fn test_classify() {
        assert_eq!(StoragePathResolver::classify("image/png"), Category::Pictures);
        assert_eq!(StoragePathResolver::classify("IMAGE/JPEG"), Category::Pictures);
        assert_eq!(StoragePathResolver::classify("application/pdf"), Category::Documents);
        assert_eq!(StoragePathResolver::classify("text/plain"), Category::Documents);
        assert_eq!(StoragePathResolver::classify(""), Category::Documents);
        assert_eq!(StoragePathResolver::classify("image"), Category::Documents);
    }

    #[test]
    fn test_resolve_without_subfolder() {
        let dest = resolver().resolve("image/png", None);
        assert_eq!(dest.category, Category::Pictures);
        assert_eq!(dest.relative_path, "Pictures/MediaBridge");
    }

    #[test]
    fn test_resolve_with_subfolder() {
        let dest = resolver().resolve("application/pdf", Some("Invoices"));
        assert_eq!(dest.category, Category::Documents);
        assert_eq!(dest.relative_path, "Documents/MediaBridge/Invoices");
    }

    #[test]
    fn test_blank_subfolder_is_ignored() {
        assert_eq!(
            resolver().resolve("application/pdf", Some("  ")).relative_path,
            "Documents/MediaBridge"
        );
        assert_eq!(
            resolver().resolve("application/pdf", Some("/")).relative_path,
            "Documents/MediaBridge"
        );
    }

    #[test]
    fn test_empty_namespace() {
        let dest = StoragePathResolver::new("").resolve("image/gif", Some("Scans"));
        assert_eq!(dest.relative_path, "Pictures/Scans");
    }

    proptest! {
        #[test]
        fn image_mime_types_go_to_pictures(subtype in "[a-z0-9.+-]{1,20}") {
            let dest = resolver().resolve(&format!("image/{}", subtype), None);
            prop_assert_eq!(dest.category, Category::Pictures);
            prop_assert!(dest.relative_path.starts_with("Pictures/"));
        }

        #[test]
        fn other_mime_types_go_to_documents(
            top in "(application|text|audio|video|font)",
            subtype in "[a-z0-9.+-]{1,20}",
        ) {
            let dest = resolver().resolve(&format!("{}/{}", top, subtype), None);
            prop_assert_eq!(dest.category, Category::Documents);
        }

        #[test]
        fn subfolder_is_last_segment(sub in "sub_[A-Za-z0-9_]{1,12}") {
            let with = resolver().resolve("application/pdf", Some(&sub));
            let expected_suffix = format!("/{}", sub);
            prop_assert!(with.relative_path.ends_with(&expected_suffix));

            let without = resolver().resolve("application/pdf", None);
            prop_assert!(!without.relative_path.split('/').any(|seg| seg == sub));
        }
    }
}
