//! Parsing of vision service responses into typed page payloads.
//!
//! Models wrap JSON in markdown fences, emit numbers as strings, and drop
//! fields; everything here is lenient except the one thing that matters:
//! a record without an id card number is unusable and is discarded.

use regex::Regex;
use serde::de::Deserializer;
use serde::Deserialize;

use super::error::ExtractError;
use super::{PageKind, PagePayload};

/// Header page metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderMetadata {
    #[serde(default)]
    pub roll_title: Option<String>,
    #[serde(default)]
    pub assembly_constituency: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub part_number: Option<i64>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub polling_station: Option<String>,
}

/// One extracted voter entry from a records page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordEntry {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub serial_no: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub relative_name: Option<String>,
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub house_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub id_card_no: Option<String>,
    #[serde(default)]
    pub status_type: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
    /// 1-based page number, stamped by the pipeline after extraction.
    #[serde(skip)]
    pub page_no: Option<i64>,
    /// Position of this entry on its page, stamped by the pipeline.
    #[serde(skip)]
    pub box_no_on_page: Option<i64>,
}

/// Footer summary page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FooterSummary {
    #[serde(default)]
    pub assembly_constituency: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub part_number: Option<i64>,
    #[serde(default)]
    pub rows: Vec<FooterRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FooterRow {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub male_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub female_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub other_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub total_count: Option<i64>,
}

/// Accepts a JSON number, a numeric string, or null.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// Canonicalizes a reported gender to male/female/other.
pub fn normalize_gender(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "m" | "male" => Some("male".to_string()),
        "f" | "female" => Some("female".to_string()),
        "o" | "other" | "third" | "third gender" => Some("other".to_string()),
        "" => None,
        _ => Some(lowered),
    }
}

fn normalize_relation_type(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim().to_uppercase();
    match value.as_str() {
        "F" | "H" | "M" => Some(value),
        "" => None,
        _ => Some("O".to_string()),
    }
}

/// Parses raw response text into a typed page payload.
pub struct ResponseParser {
    object_re: Regex,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            // Outermost brace pair, dot matching newlines.
            object_re: Regex::new(r"(?s)\{.*\}").expect("object regex is valid"),
        }
    }

    pub fn parse(&self, kind: PageKind, text: &str) -> Result<PagePayload, ExtractError> {
        match kind {
            PageKind::Header => Ok(PagePayload::Header(self.parse_object(text)?)),
            PageKind::Footer => Ok(PagePayload::Footer(self.parse_object(text)?)),
            PageKind::Records => Ok(PagePayload::Records(self.parse_records(text)?)),
        }
    }

    /// Extracts and deserializes the outermost JSON object.
    fn parse_object<T: for<'de> Deserialize<'de>>(&self, text: &str) -> Result<T, ExtractError> {
        let cleaned = strip_code_fences(text);
        let object = self
            .object_re
            .find(cleaned)
            .ok_or_else(|| ExtractError::Malformed("no JSON object in response".to_string()))?;
        serde_json::from_str(object.as_str())
            .map_err(|e| ExtractError::Malformed(format!("invalid JSON object: {}", e)))
    }

    /// Parses JSON-lines record output. Lines that fail to parse are
    /// logged and skipped; entries without an id card number are dropped.
    /// Fails only when nothing in a non-empty response parses.
    pub fn parse_records(&self, text: &str) -> Result<Vec<RecordEntry>, ExtractError> {
        let cleaned = strip_code_fences(text);
        let mut records = Vec::new();
        let mut bad_lines = 0usize;
        let mut dropped = 0usize;

        for (line_no, line) in cleaned.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("```") {
                continue;
            }
            let mut entry: RecordEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("line {}: unparseable record line: {}", line_no + 1, e);
                    bad_lines += 1;
                    continue;
                }
            };

            match entry.id_card_no.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => {}
                _ => {
                    log::warn!(
                        "line {}: dropping record without id card number (name: {:?})",
                        line_no + 1,
                        entry.full_name
                    );
                    dropped += 1;
                    continue;
                }
            }

            entry.gender = entry.gender.as_deref().and_then(normalize_gender);
            entry.relation_type = normalize_relation_type(entry.relation_type.as_deref());
            if entry.status_type.as_deref().map_or(true, str::is_empty) {
                entry.status_type = Some("N".to_string());
            }
            records.push(entry);
        }

        if records.is_empty() && bad_lines > 0 && dropped == 0 {
            return Err(ExtractError::Malformed(format!(
                "no parseable record lines ({} rejected)",
                bad_lines
            )));
        }

        Ok(records)
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips a leading ```json fence and a trailing ``` fence, if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ResponseParser {
        ResponseParser::new()
    }

    #[test]
    fn test_parse_header_with_fences() {
        let text = "```json\n{\"assembly_constituency\": \"42-North\", \"part_number\": \"86\", \"publication_date\": \"2025-04-10\"}\n```";
        let payload = parser().parse(PageKind::Header, text).unwrap();
        match payload {
            PagePayload::Header(header) => {
                assert_eq!(header.assembly_constituency.as_deref(), Some("42-North"));
                // Numeric string is accepted.
                assert_eq!(header.part_number, Some(86));
            }
            _ => panic!("expected header payload"),
        }
    }

    #[test]
    fn test_parse_header_with_preamble() {
        let text = "Here is the extracted data:\n{\"roll_title\": \"Electoral Roll 2025\"}";
        let payload = parser().parse(PageKind::Header, text).unwrap();
        match payload {
            PagePayload::Header(header) => {
                assert_eq!(header.roll_title.as_deref(), Some("Electoral Roll 2025"));
            }
            _ => panic!("expected header payload"),
        }
    }

    #[test]
    fn test_parse_header_without_object_fails() {
        let result = parser().parse(PageKind::Header, "no json here");
        assert!(matches!(result, Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn test_parse_footer_rows() {
        let text = r#"{"assembly_constituency": "42-North", "part_number": 86,
            "rows": [{"description": "Original roll", "male_count": 584,
                      "female_count": 459, "other_count": 0, "total_count": 1043}]}"#;
        let payload = parser().parse(PageKind::Footer, text).unwrap();
        match payload {
            PagePayload::Footer(footer) => {
                assert_eq!(footer.rows.len(), 1);
                assert_eq!(footer.rows[0].total_count, Some(1043));
            }
            _ => panic!("expected footer payload"),
        }
    }

    #[test]
    fn test_parse_records_jsonl() {
        let text = r#"{"serial_no": 1, "full_name": "A B", "id_card_no": "XYZ0000001", "gender": "M", "age": "47", "relation_type": "f", "section_name": "Ward 4"}
{"serial_no": 2, "full_name": "C D", "id_card_no": "XYZ0000002", "gender": "female", "age": 33, "relation_type": "spouse", "section_name": "Ward 4"}"#;
        let records = parser().parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gender.as_deref(), Some("male"));
        assert_eq!(records[0].age, Some(47));
        assert_eq!(records[0].relation_type.as_deref(), Some("F"));
        assert_eq!(records[0].status_type.as_deref(), Some("N"));
        assert_eq!(records[1].gender.as_deref(), Some("female"));
        // Unknown relation labels collapse to "O".
        assert_eq!(records[1].relation_type.as_deref(), Some("O"));
    }

    #[test]
    fn test_parse_records_skips_bad_lines() {
        let text = r#"{"serial_no": 1, "id_card_no": "OK00000001"}
not json at all
{"serial_no": 3, "id_card_no": "OK00000003"}"#;
        let records = parser().parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_records_drops_missing_id_card() {
        let text = r#"{"serial_no": 1, "full_name": "No Id"}
{"serial_no": 2, "id_card_no": "  "}
{"serial_no": 3, "id_card_no": "OK00000003"}"#;
        let records = parser().parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id_card_no.as_deref(), Some("OK00000003"));
    }

    #[test]
    fn test_parse_records_all_bad_lines_is_malformed() {
        let result = parser().parse_records("garbage\nmore garbage");
        assert!(matches!(result, Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn test_parse_records_empty_text_is_empty_list() {
        let records = parser().parse_records("").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_normalize_gender() {
        assert_eq!(normalize_gender("M"), Some("male".to_string()));
        assert_eq!(normalize_gender(" Female "), Some("female".to_string()));
        assert_eq!(normalize_gender("third gender"), Some("other".to_string()));
        assert_eq!(normalize_gender(""), None);
        // Unrecognized values are kept, lowercased, rather than discarded.
        assert_eq!(normalize_gender("Unknown"), Some("unknown".to_string()));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
    }
}
