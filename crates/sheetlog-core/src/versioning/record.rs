//! Change log and import session types.
//!
//! Records are append-only: a row is written only for the version in which
//! its business key changed. The state of a dataset at version V is the most
//! recent record per key with `version_no <= V`, unless that record is a
//! deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a business key changed in a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Key was not present in the prior snapshot
    Inserted,
    /// Key was present with different content
    Updated,
    /// Key was present in the prior snapshot but not in the upload
    Deleted,
}

impl ChangeType {
    /// Convert to string for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inserted" => Some(Self::Inserted),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted change log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub dataset_name: String,
    pub business_key: String,
    pub version_no: u32,
    pub change_type: ChangeType,
    /// Canonical row JSON; `None` for deletions
    pub data_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One successful import of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: Uuid,
    pub dataset_name: String,
    pub new_version_no: u32,
    pub previous_version_no: u32,
    pub inserted_count: u32,
    pub updated_count: u32,
    pub deleted_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_mr: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-type change counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub inserted: u32,
    pub updated: u32,
    pub deleted: u32,
}

impl ChangeCounts {
    /// Count one change
    pub fn record(&mut self, change_type: ChangeType) {
        match change_type {
            ChangeType::Inserted => self.inserted += 1,
            ChangeType::Updated => self.updated += 1,
            ChangeType::Deleted => self.deleted += 1,
        }
    }

    /// Total number of changed keys
    pub fn total(&self) -> u32 {
        self.inserted + self.updated + self.deleted
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A change to be written, before the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChange {
    pub business_key: String,
    pub change_type: ChangeType,
    pub data_json: Option<String>,
}

impl RowChange {
    /// Key absent from the prior snapshot
    pub fn inserted(business_key: impl Into<String>, data_json: impl Into<String>) -> Self {
        Self {
            business_key: business_key.into(),
            change_type: ChangeType::Inserted,
            data_json: Some(data_json.into()),
        }
    }

    /// Key present with different content
    pub fn updated(business_key: impl Into<String>, data_json: impl Into<String>) -> Self {
        Self {
            business_key: business_key.into(),
            change_type: ChangeType::Updated,
            data_json: Some(data_json.into()),
        }
    }

    /// Key no longer present
    pub fn deleted(business_key: impl Into<String>) -> Self {
        Self {
            business_key: business_key.into(),
            change_type: ChangeType::Deleted,
            data_json: None,
        }
    }
}

/// Bilingual release notes for a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr: Option<String>,
}

impl ReleaseNotes {
    /// Notes in both languages
    pub fn new(en: impl Into<String>, mr: impl Into<String>) -> Self {
        Self {
            en: Some(en.into()),
            mr: Some(mr.into()),
        }
    }

    /// Whether neither language is present
    pub fn is_empty(&self) -> bool {
        self.en.is_none() && self.mr.is_none()
    }
}

/// Everything a single import writes, committed atomically
#[derive(Debug, Clone)]
pub struct VersionCommit {
    pub dataset_name: String,
    /// Version the delta was computed against
    pub previous_version_no: u32,
    pub new_version_no: u32,
    pub changes: Vec<RowChange>,
    pub counts: ChangeCounts,
    pub notes: ReleaseNotes,
}

/// Aggregate statistics over a dataset's sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset_name: String,
    pub latest_version: u32,
    pub session_count: usize,
    pub total_inserted: u64,
    pub total_updated: u64,
    pub total_deleted: u64,
    pub first_import: DateTime<Utc>,
    pub last_import: DateTime<Utc>,
}
