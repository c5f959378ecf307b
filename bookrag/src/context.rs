//! Turning retrieved items into prompt context and source labels.
//!
//! Everything here is pure: no I/O, no failure path.

use serde_json::Value;

use crate::document::{Payload, RetrievedItem};

/// Payload keys checked, in order, for the human-readable text of an item.
pub const TEXT_KEYS: [&str; 5] = ["text", "chunk", "content", "page_content", "body"];

/// Label used when an item's payload names no source.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Extract human-readable text from a payload.
///
/// Returns the first string-valued field among [`TEXT_KEYS`]. If none is
/// present, every payload value is converted to a string (strings verbatim,
/// anything else as compact JSON) and the results are joined with single
/// spaces in insertion order.
///
/// ```
/// use bookrag::context::payload_text;
/// use serde_json::json;
///
/// let payload = json!({"content": "A", "text": "B"});
/// assert_eq!(payload_text(payload.as_object().unwrap()), "B");
/// ```
pub fn payload_text(payload: &Payload) -> String {
    for key in TEXT_KEYS {
        if let Some(Value::String(text)) = payload.get(key) {
            return text.clone();
        }
    }
    payload.values().map(value_to_string).collect::<Vec<_>>().join(" ")
}

/// Source label of a payload: `source`, else `file`, else [`UNKNOWN_SOURCE`].
pub fn source_label(payload: &Payload) -> String {
    ["source", "file"]
        .iter()
        .filter_map(|key| payload.get(*key))
        .filter(|value| !value.is_null())
        .map(value_to_string)
        .find(|label| !label.is_empty())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Source labels for a result set, in result order.
pub fn sources(results: &[RetrievedItem]) -> Vec<String> {
    results.iter().map(|item| source_label(&item.payload)).collect()
}

/// Build the context blob handed to the answer generator.
///
/// Each item becomes `"<n>. <text>"`, where `n` is its 1-based position in
/// `results`; entries are separated by a blank line. Items whose text is blank
/// are left out without renumbering the rest, so labels keep matching the
/// positions in [`sources`]. An empty result set yields an empty string.
pub fn build_context(results: &[RetrievedItem]) -> String {
    results
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let text = payload_text(&item.payload);
            if text.trim().is_empty() { None } else { Some(format!("{}. {text}", idx + 1)) }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn item(score: f32, value: Value) -> RetrievedItem {
        RetrievedItem::new(score, payload(value))
    }

    #[test]
    fn text_key_beats_content() {
        assert_eq!(payload_text(&payload(json!({"content": "A", "text": "B"}))), "B");
    }

    #[test]
    fn non_string_preferred_key_is_skipped() {
        let p = payload(json!({"text": 42, "content": "from content"}));
        assert_eq!(payload_text(&p), "from content");
    }

    #[test]
    fn falls_back_to_values_in_insertion_order() {
        assert_eq!(payload_text(&payload(json!({"foo": "x", "bar": "y"}))), "x y");
    }

    #[test]
    fn fallback_renders_non_strings_as_json() {
        let p = payload(json!({"page": 3, "meta": {"type": "text"}}));
        assert_eq!(payload_text(&p), r#"3 {"type":"text"}"#);
    }

    #[test]
    fn source_label_precedence() {
        assert_eq!(source_label(&payload(json!({"source": "ch1.md"}))), "ch1.md");
        assert_eq!(source_label(&payload(json!({"file": "ch2.md"}))), "ch2.md");
        assert_eq!(source_label(&payload(json!({"source": "a.md", "file": "b.md"}))), "a.md");
        assert_eq!(source_label(&payload(json!({"source": "", "file": "b.md"}))), "b.md");
        assert_eq!(source_label(&payload(json!({}))), "Unknown");
    }

    #[test]
    fn context_is_numbered_and_separated_by_blank_lines() {
        let results = vec![
            item(0.9, json!({"content": "Robots are machines."})),
            item(0.5, json!({"text": "Sensors measure the world."})),
        ];
        assert_eq!(
            build_context(&results),
            "1. Robots are machines.\n\n2. Sensors measure the world."
        );
    }

    #[test]
    fn blank_items_are_skipped_without_renumbering() {
        let results = vec![
            item(0.9, json!({"text": "   "})),
            item(0.8, json!({"text": "Actuators move joints."})),
        ];
        assert_eq!(build_context(&results), "2. Actuators move joints.");
    }

    #[test]
    fn empty_results_give_empty_context() {
        assert_eq!(build_context(&[]), "");
    }
}
