//! Normalizes free-form LLM output into [`AnalysisResult`]
//!
//! Model output is untrusted: it may be bare JSON, JSON inside a Markdown
//! fence, JSON surrounded by commentary, or nothing parseable at all. The
//! coercer never fails; unrecoverable input becomes the all-empty schema.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::types::AnalysisResult;

/// Default cap on a summary synthesized from a non-string value
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 500;

/// Ways of locating a JSON object in model output, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseStrategy {
    /// Whole text is a JSON object
    Direct,
    /// Interior of a ``` or ```json fence
    Fenced,
    /// Substring from the first `{` to the last `}`
    OuterBraces,
}

const STRATEGIES: [ParseStrategy; 3] = [
    ParseStrategy::Direct,
    ParseStrategy::Fenced,
    ParseStrategy::OuterBraces,
];

impl ParseStrategy {
    fn parse(&self, text: &str) -> Option<Map<String, Value>> {
        match self {
            Self::Direct => parse_object(text),
            Self::Fenced => fence_regex()
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| parse_object(m.as_str())),
            Self::OuterBraces => {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                if start < end {
                    parse_object(&text[start..=end])
                } else {
                    None
                }
            }
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
    })
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Coerces raw model text into the canonical analysis schema
#[derive(Debug, Clone)]
pub struct ResultCoercer {
    summary_max_chars: usize,
}

impl Default for ResultCoercer {
    fn default() -> Self {
        Self {
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
        }
    }
}

impl ResultCoercer {
    pub fn new(summary_max_chars: usize) -> Self {
        Self { summary_max_chars }
    }

    /// Extract and normalize an analysis from `raw`
    pub fn coerce(&self, raw: &str) -> AnalysisResult {
        let object = extract_object(raw).unwrap_or_else(|| {
            tracing::warn!(
                "No JSON object recoverable from model output ({} chars)",
                raw.len()
            );
            Map::new()
        });
        self.normalize(&object)
    }

    /// Normalize an already-parsed object
    pub fn normalize(&self, object: &Map<String, Value>) -> AnalysisResult {
        AnalysisResult {
            summary: self.summary(object.get("summary")),
            pros: string_list(object.get("pros")),
            cons: string_list(object.get("cons")),
            loopholes: string_list(object.get("loopholes")),
        }
    }

    fn summary(&self, value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => truncate_chars(&other.to_string(), self.summary_max_chars)
                .trim()
                .to_string(),
        }
    }
}

/// Coerce with default settings
pub fn coerce(raw: &str) -> AnalysisResult {
    ResultCoercer::default().coerce(raw)
}

/// First JSON object found by the ordered strategies
fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    STRATEGIES.iter().find_map(|strategy| {
        let found = strategy.parse(raw);
        if found.is_some() {
            tracing::debug!("Model output parsed with {:?} strategy", strategy);
        }
        found
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(stringify)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_delimited(s),
        Some(other) => {
            let s = other.to_string();
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Split a single string on newline/comma/semicolon and strip bullets
fn split_delimited(s: &str) -> Vec<String> {
    s.split(['\n', ',', ';'])
        .map(strip_decoration)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_decoration(piece: &str) -> &str {
    piece.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '*' | '\u{2022}' | '\u{00B7}' | '\u{2013}' | '\u{2014}')
    })
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> AnalysisResult {
        AnalysisResult {
            summary: "S".to_string(),
            pros: vec!["P".to_string()],
            cons: vec!["C".to_string()],
            loopholes: vec!["L".to_string()],
        }
    }

    const CANONICAL: &str = r#"{"summary": "S", "pros": ["P"], "cons": ["C"], "loopholes": ["L"]}"#;

    #[test]
    fn test_direct_json() {
        assert_eq!(coerce(CANONICAL), expected());
    }

    #[test]
    fn test_fenced_json_with_commentary() {
        let raw = format!("Sure! Here is the analysis:\n```json\n{}\n```\nLet me know.", CANONICAL);
        assert_eq!(coerce(&raw), expected());
    }

    #[test]
    fn test_untagged_fence() {
        let raw = format!("```\n{}\n```", CANONICAL);
        assert_eq!(coerce(&raw), expected());
    }

    #[test]
    fn test_embedded_object() {
        let raw = format!("The result is {} and that is all.", CANONICAL);
        assert_eq!(coerce(&raw), expected());
    }

    #[test]
    fn test_nested_braces_inside_strings() {
        let raw = r#"Result: {"summary": "Clause {a} applies", "pros": [], "cons": [], "loopholes": []} done"#;
        assert_eq!(coerce(raw).summary, "Clause {a} applies");
    }

    #[test]
    fn test_garbage_yields_empty_schema() {
        assert_eq!(coerce("I cannot help with that."), AnalysisResult::default());
        assert_eq!(coerce(""), AnalysisResult::default());
        assert_eq!(coerce("{ not json }"), AnalysisResult::default());
        assert_eq!(coerce("[1, 2, 3]"), AnalysisResult::default());
    }

    #[test]
    fn test_missing_keys_default() {
        let result = coerce(r#"{"summary": "  Only a summary.  "}"#);
        assert_eq!(result.summary, "Only a summary.");
        assert!(result.pros.is_empty());
        assert!(result.cons.is_empty());
        assert!(result.loopholes.is_empty());
    }

    #[test]
    fn test_non_string_summary_is_serialized_and_truncated() {
        let result = coerce(r#"{"summary": {"overview": "Lease agreement"}}"#);
        assert_eq!(result.summary, r#"{"overview":"Lease agreement"}"#);

        let long = format!(r#"{{"summary": ["{}"]}}"#, "x".repeat(2000));
        let result = ResultCoercer::new(500).coerce(&long);
        assert_eq!(result.summary.chars().count(), 500);

        let result = coerce(r#"{"summary": null}"#);
        assert_eq!(result.summary, "");
    }

    #[test]
    fn test_list_entries_trimmed_and_blank_dropped() {
        let result = coerce(r#"{"pros": ["  Clear terms ", "", "   ", null, 42, true]}"#);
        assert_eq!(result.pros, vec!["Clear terms", "42", "true"]);
    }

    #[test]
    fn test_string_list_is_split_and_debulleted() {
        let result = coerce(
            r#"{"cons": "- Complex language\n* Ambiguous timelines; • No cap on liability, \t- Auto renewal"}"#,
        );
        assert_eq!(
            result.cons,
            vec![
                "Complex language",
                "Ambiguous timelines",
                "No cap on liability",
                "Auto renewal"
            ]
        );
    }

    #[test]
    fn test_scalar_list_value_is_wrapped() {
        let result = coerce(r#"{"loopholes": 3, "pros": {"a": 1}}"#);
        assert_eq!(result.loopholes, vec!["3"]);
        assert_eq!(result.pros, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn test_output_always_has_non_empty_entries() {
        let inputs = [
            CANONICAL,
            r#"{"pros": " , ; \n - "}"#,
            r#"{"cons": ["", " "]}"#,
            "nothing here",
        ];
        for input in inputs {
            let result = coerce(input);
            for list in [&result.pros, &result.cons, &result.loopholes] {
                assert!(list.iter().all(|s| !s.trim().is_empty()), "input: {}", input);
            }
        }
    }

    #[test]
    fn test_first_parseable_fence_wins() {
        let raw = format!("```json\n{{broken\n```\nthen\n```json\n{}\n```", CANONICAL);
        assert_eq!(coerce(&raw), expected());
    }
}
