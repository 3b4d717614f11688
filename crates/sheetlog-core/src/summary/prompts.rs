//! Prompt templates for release note generation.

use crate::traits::SummaryRequest;

/// System prompt for the release note writer.
pub const RELEASE_NOTES_SYSTEM_PROMPT: &str = "You are a helpful release notes writer for \
versioned spreadsheet datasets. Write a short bullet summary of what changed in the new \
version, once in English and once in Marathi (Devanagari script). Respond with a JSON object \
of the form {\"en\": \"...\", \"mr\": \"...\"} and nothing else.";

/// User prompt describing one version's changes.
pub fn release_notes_prompt(request: &SummaryRequest) -> String {
    format!(
        "Dataset: {}. Previous version: {}. New version: {}. Inserted: {}. Updated: {}. \
         Deleted: {}. Unchanged: {}.\nRespond with {{\"en\": \"...\", \"mr\": \"...\"}}.",
        request.dataset_name,
        request.previous_version_no,
        request.new_version_no,
        request.counts.inserted,
        request.counts.updated,
        request.counts.deleted,
        request.unchanged,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::ChangeCounts;

    #[test]
    fn test_prompt_mentions_counts() {
        let prompt = release_notes_prompt(&SummaryRequest {
            dataset_name: "members".to_string(),
            previous_version_no: 1,
            new_version_no: 2,
            counts: ChangeCounts {
                inserted: 1,
                updated: 2,
                deleted: 3,
            },
            unchanged: 7,
        });
        assert!(prompt.starts_with("Dataset: members. Previous version: 1. New version: 2."));
        assert!(prompt.contains("Inserted: 1. Updated: 2. Deleted: 3. Unchanged: 7."));
        assert!(prompt.ends_with(r#"Respond with {"en": "...", "mr": "..."}."#));
    }
}
