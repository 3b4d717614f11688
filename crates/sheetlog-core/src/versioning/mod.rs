//! Dataset versioning: the append-only change log and import sessions.
//!
//! Every successful import allocates the next version of its dataset and
//! records only the keys that changed, so any past snapshot can be rebuilt.

mod record;
mod store;

pub use record::{
    ChangeCounts, ChangeType, DatasetRecord, DatasetSummary, ImportSession, ReleaseNotes,
    RowChange, VersionCommit,
};
pub use store::{RecordStore, SqliteRecordStore};
