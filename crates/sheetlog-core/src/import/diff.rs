//! Snapshot comparison.

use std::collections::{BTreeMap, HashSet};

use sheetlog_extractors::ExtractedRow;

use crate::versioning::{ChangeCounts, RowChange};

/// Difference between a stored snapshot and an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Inserts and updates in upload order, then deletions in key order.
    pub changes: Vec<RowChange>,
    pub counts: ChangeCounts,
    /// Keys whose canonical JSON is byte-identical to the prior value.
    pub unchanged: usize,
}

impl Delta {
    /// Whether the upload matches the prior snapshot exactly.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Classify every key of `rows` against `prior`.
///
/// Only the first row for a key is considered. Keys of `prior` that do not
/// appear in `rows` are deletions.
pub fn compute_delta(prior: &BTreeMap<String, String>, rows: &[ExtractedRow]) -> Delta {
    let mut delta = Delta::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());

    for row in rows {
        if !seen.insert(row.business_key.as_str()) {
            continue;
        }
        let change = match prior.get(&row.business_key) {
            None => RowChange::inserted(&row.business_key, &row.data_json),
            Some(previous) if *previous == row.data_json => {
                delta.unchanged += 1;
                continue;
            }
            Some(_) => RowChange::updated(&row.business_key, &row.data_json),
        };
        delta.counts.record(change.change_type);
        delta.changes.push(change);
    }

    for key in prior.keys() {
        if !seen.contains(key.as_str()) {
            let change = RowChange::deleted(key);
            delta.counts.record(change.change_type);
            delta.changes.push(change);
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::ChangeType;

    fn row(key: &str, json: &str) -> ExtractedRow {
        ExtractedRow {
            row_number: 0,
            business_key: key.to_string(),
            data_json: json.to_string(),
        }
    }

    fn prior(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_first_import_inserts_everything() {
        let delta = compute_delta(&BTreeMap::new(), &[row("a", "1"), row("b", "2")]);
        assert_eq!(delta.counts.inserted, 2);
        assert_eq!(delta.counts.total(), 2);
        assert_eq!(delta.unchanged, 0);
    }

    #[test]
    fn test_mixed_changes_keep_upload_order() {
        let delta = compute_delta(
            &prior(&[("a", "1"), ("b", "2"), ("c", "3")]),
            &[row("d", "4"), row("a", "9"), row("c", "3")],
        );

        let summary: Vec<_> = delta
            .changes
            .iter()
            .map(|c| (c.business_key.as_str(), c.change_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("d", ChangeType::Inserted),
                ("a", ChangeType::Updated),
                ("b", ChangeType::Deleted),
            ]
        );
        assert_eq!(delta.unchanged, 1);
        assert!(delta.changes[2].data_json.is_none());
    }

    #[test]
    fn test_identical_upload_is_empty() {
        let delta = compute_delta(&prior(&[("a", "1")]), &[row("a", "1")]);
        assert!(delta.is_empty());
        assert_eq!(delta.unchanged, 1);
    }

    #[test]
    fn test_repeated_key_counts_once() {
        let delta = compute_delta(&BTreeMap::new(), &[row("a", "1"), row("a", "2")]);
        assert_eq!(delta.counts.inserted, 1);
        assert_eq!(delta.changes[0].data_json.as_deref(), Some("1"));
    }

    #[test]
    fn test_counts_equal_keys_in_symmetric_difference() {
        let before = prior(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        let rows = vec![row("b", "2"), row("c", "x"), row("e", "5"), row("f", "6")];
        let delta = compute_delta(&before, &rows);

        let before_pairs: HashSet<(&str, &str)> =
            before.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let after_pairs: HashSet<(&str, &str)> = rows
            .iter()
            .map(|r| (r.business_key.as_str(), r.data_json.as_str()))
            .collect();
        let changed_keys: HashSet<&str> = before_pairs
            .symmetric_difference(&after_pairs)
            .map(|(k, _)| *k)
            .collect();

        assert_eq!(delta.counts.total() as usize, changed_keys.len());
        assert_eq!(delta.counts.updated, 1);
        assert_eq!(delta.counts.inserted, 2);
        assert_eq!(delta.counts.deleted, 2);
    }
}
