//! Parsing of bilingual release notes out of free-form LLM output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::versioning::ReleaseNotes;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z0-9]*\n?([\s\S]*?)\n?```$").unwrap());

static EMBEDDED_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

static THINK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static MARATHI_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)marathi").unwrap());

/// Strip a surrounding code fence and any reasoning tags.
pub fn remove_code_blocks(content: &str) -> String {
    let content = content.trim();
    let content = CODE_FENCE
        .captures(content)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim()))
        .unwrap_or(content);
    THINK_TAGS.replace_all(content, "").trim().to_string()
}

/// Pull the body out of the first fenced block, or return the text as-is.
pub fn extract_json(text: &str) -> String {
    let text = text.trim();
    EMBEDDED_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| text.to_string())
}

#[derive(Debug, Deserialize)]
struct NotesJson {
    #[serde(default, alias = "english")]
    en: Option<String>,
    #[serde(default, alias = "marathi")]
    mr: Option<String>,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Trim leftover heading punctuation such as `:`, `**` or `#` from a section.
fn clean_section(text: &str) -> Option<String> {
    let trimmed = text
        .trim()
        .trim_start_matches(|c: char| c == ':' || c == '*' || c == '#' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse release notes from an LLM response.
///
/// Prefers a JSON object with `en` and `mr` fields. Otherwise the text is
/// split at its first "Marathi" heading; when there is none, the whole text
/// is used for both languages. Blank responses yield empty notes.
pub fn parse_release_notes(response: &str) -> ReleaseNotes {
    let cleaned = remove_code_blocks(response);
    if cleaned.is_empty() {
        return ReleaseNotes::default();
    }

    let json_str = extract_json(&cleaned);
    if let Ok(parsed) = serde_json::from_str::<NotesJson>(&json_str) {
        let notes = ReleaseNotes {
            en: non_blank(parsed.en),
            mr: non_blank(parsed.mr),
        };
        if !notes.is_empty() {
            return notes;
        }
    }

    if let Some(heading) = MARATHI_HEADING.find(&cleaned) {
        let en = clean_section(&cleaned[..heading.start()]);
        let mr = clean_section(&cleaned[heading.end()..]);
        if en.is_some() && mr.is_some() {
            return ReleaseNotes { en, mr };
        }
    }

    ReleaseNotes {
        en: Some(cleaned.clone()),
        mr: Some(cleaned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_notes() {
        let notes = parse_release_notes(r#"{"en": "3 rows added", "mr": "३ नोंदी जोडल्या"}"#);
        assert_eq!(notes.en.as_deref(), Some("3 rows added"));
        assert_eq!(notes.mr.as_deref(), Some("३ नोंदी जोडल्या"));
    }

    #[test]
    fn test_parse_fenced_json_notes() {
        let input = "```json\n{\"en\": \"- 1 updated\", \"mr\": \"- १ बदलली\"}\n```";
        let notes = parse_release_notes(input);
        assert_eq!(notes.en.as_deref(), Some("- 1 updated"));
        assert_eq!(notes.mr.as_deref(), Some("- १ बदलली"));
    }

    #[test]
    fn test_split_at_marathi_heading() {
        let input = "English:\n- 2 rows inserted\n\n**Marathi:**\n- २ नोंदी जोडल्या";
        let notes = parse_release_notes(input);
        assert_eq!(notes.en.as_deref(), Some("English:\n- 2 rows inserted"));
        assert_eq!(notes.mr.as_deref(), Some("- २ नोंदी जोडल्या"));
    }

    #[test]
    fn test_unsplittable_text_fills_both() {
        let notes = parse_release_notes("Version 4 removed one row.");
        assert_eq!(notes.en, notes.mr);
        assert_eq!(notes.en.as_deref(), Some("Version 4 removed one row."));
    }

    #[test]
    fn test_blank_response() {
        assert!(parse_release_notes("   ").is_empty());
        assert!(parse_release_notes("<think>hmm</think>").is_empty());
    }

    #[test]
    fn test_remove_code_blocks() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(remove_code_blocks(input), r#"{"key": "value"}"#);
    }
}
