//! Per-user storage statistics.

use std::collections::HashMap;

use crate::db::Database;
use crate::Result;

use super::media::{self, Category};
use super::metadata::FileRepository;

/// How close a user is to the storage quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    /// At most 80% used.
    Ok,
    /// Above 80% used.
    Warning,
    /// Above 95% used.
    Critical,
}

impl WarningLevel {
    /// Classify a usage percentage.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage > 95.0 {
            WarningLevel::Critical
        } else if percentage > 80.0 {
            WarningLevel::Warning
        } else {
            WarningLevel::Ok
        }
    }
}

/// Storage statistics for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUsage {
    /// Bytes used by all owned files.
    pub used_bytes: u64,
    /// Quota in bytes.
    pub limit_bytes: u64,
    /// Bytes per category, every category present.
    pub by_category: HashMap<Category, u64>,
    /// Number of owned files.
    pub file_count: usize,
    /// Number of owned files with at least one recipient.
    pub shared_file_count: usize,
}

impl StorageUsage {
    /// Compute the statistics for `owner_id` against `limit_bytes`.
    pub async fn compute(db: &Database, owner_id: i64, limit_bytes: u64) -> Result<Self> {
        let files = FileRepository::new(db.pool());
        let owned = files.list_by_owner(owner_id).await?;
        let shared = files.count_shared_by_owner(owner_id).await?;

        let mut by_category: HashMap<Category, u64> =
            Category::ALL.iter().map(|c| (*c, 0)).collect();
        let mut used_bytes = 0u64;
        for file in &owned {
            let size = file.size_bytes();
            used_bytes += size;
            *by_category
                .entry(media::classify(&file.stored_name).category)
                .or_default() += size;
        }

        Ok(Self {
            used_bytes,
            limit_bytes,
            by_category,
            file_count: owned.len(),
            shared_file_count: shared.max(0) as usize,
        })
    }

    /// Percentage of the quota in use.
    pub fn percentage(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 100.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64 * 100.0
    }

    /// Bytes left before the quota is reached.
    pub fn remaining_bytes(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.used_bytes)
    }

    /// Warning level for the current usage.
    pub fn warning_level(&self) -> WarningLevel {
        WarningLevel::from_percentage(self.percentage())
    }

    /// Check if a file of `size` bytes still fits.
    pub fn can_store(&self, size: u64) -> bool {
        self.used_bytes.saturating_add(size) <= self.limit_bytes
    }

    /// Bytes used in one category.
    pub fn category_bytes(&self, category: Category) -> u64 {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}
