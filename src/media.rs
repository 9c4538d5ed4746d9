//! Media categories and the items listed for them.
//!
//! Every category owns a path prefix inside the bucket, a set of accepted
//! extensions and a cache key. The retention limit and size caps come from
//! configuration and are folded into a [`CategoryPolicy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::config::RetentionConfig;
use crate::storage::StoredObject;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Video,
    Archive,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Video, Category::Archive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Archive => "archive",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Video => "videos/",
            Category::Archive => "archives/",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Video => &["mp4", "mov", "webm", "mkv", "avi"],
            Category::Archive => &["zip", "rar"],
        }
    }

    /// Content types accepted for uploads. A trailing `/*` matches any subtype.
    pub fn content_types(&self) -> &'static [&'static str] {
        match self {
            Category::Video => &["video/*"],
            Category::Archive => &[
                "application/zip",
                "application/x-zip-compressed",
                "application/x-rar-compressed",
                "application/vnd.rar",
            ],
        }
    }

    pub fn cache_key(&self) -> &'static str {
        match self {
            Category::Video => "videos",
            Category::Archive => "archives",
        }
    }

    /// Finds the category whose path pattern matches `pathname`.
    pub fn for_pathname(pathname: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.matches(pathname))
    }

    /// Finds the category accepting files with this name's extension.
    pub fn for_file_name(file_name: &str) -> Option<Category> {
        let (_, ext) = file_name.rsplit_once('.')?;
        Category::ALL
            .into_iter()
            .find(|c| c.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// `^<prefix>.+\.(<ext>)$`, extension compared case-insensitively.
    pub fn matches(&self, pathname: &str) -> bool {
        let Some(rest) = pathname.strip_prefix(self.prefix()) else {
            return false;
        };
        match rest.rsplit_once('.') {
            Some((stem, ext)) => {
                !stem.is_empty() && self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
            }
            None => false,
        }
    }

    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.content_types().iter().any(|allowed| match allowed.strip_suffix("/*") {
            Some(major) => content_type
                .split_once('/')
                .is_some_and(|(m, sub)| m == major && !sub.is_empty()),
            None => content_type == *allowed,
        })
    }

    pub fn policy(self, config: &RetentionConfig) -> CategoryPolicy {
        let max_size_mb = match self {
            Category::Video => config.max_video_size_mb,
            Category::Archive => config.max_archive_size_mb,
        };
        CategoryPolicy {
            category: self,
            limit: config.limit,
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" | "videos" => Ok(Category::Video),
            "archive" | "archives" => Ok(Category::Archive),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Resolves where an upload should live.
///
/// A path already inside a category prefix is kept as is. A bare file name
/// (or a path outside every prefix) is placed under the prefix of the
/// category its extension belongs to.
pub fn upload_pathname(requested: &str) -> Option<(Category, String)> {
    let requested = requested.trim().trim_start_matches('/');
    if let Some(category) = Category::for_pathname(requested) {
        return Some((category, requested.to_string()));
    }
    let file_name = requested.rsplit('/').next()?;
    let category = Category::for_file_name(file_name)?;
    let pathname = format!("{}{}", category.prefix(), file_name);
    category.matches(&pathname).then_some((category, pathname))
}

/// A category together with its configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub category: Category,
    pub limit: usize,
    pub max_size_bytes: u64,
}

impl CategoryPolicy {
    pub fn matches(&self, pathname: &str) -> bool {
        self.category.matches(pathname)
    }
}

/// An item as reported to clients and stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    /// Upload time in epoch milliseconds.
    pub created_at: i64,
    pub size: u64,
    pub pathname: String,
    pub category: Category,
}

impl MediaItem {
    pub fn from_object(object: StoredObject, category: Category) -> Self {
        Self {
            url: object.url,
            created_at: object.uploaded_at.timestamp_millis(),
            size: object.size,
            pathname: object.pathname,
            category,
        }
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }
}

/// Newest first; ties broken by pathname so listings are stable.
pub fn newest_first(a: &MediaItem, b: &MediaItem) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.pathname.cmp(&a.pathname))
}

/// Newest-first list of retained items for one category.
pub type KeptList = Vec<MediaItem>;
