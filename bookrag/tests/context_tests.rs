//! Property tests for context building and source labelling.

use bookrag::RetrievedItem;
use bookrag::context::{build_context, payload_text, sources};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Items with a single `text` field, possibly blank.
fn arb_items() -> impl Strategy<Value = Vec<RetrievedItem>> {
    proptest::collection::vec(
        (
            prop_oneof![
                Just(String::new()),
                Just("   ".to_string()),
                "[a-zA-Z][a-zA-Z .]{0,40}",
            ],
            0.0f32..1.0,
        ),
        0..12,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(text, score)| {
                let mut payload = Map::new();
                payload.insert("text".to_string(), Value::String(text));
                RetrievedItem::new(score, payload)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every non-blank item appears exactly once, labelled with its position.
    #[test]
    fn entries_keep_result_positions(items in arb_items()) {
        let context = build_context(&items);
        let expected: Vec<String> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| !payload_text(&item.payload).trim().is_empty())
            .map(|(i, item)| format!("{}. {}", i + 1, payload_text(&item.payload)))
            .collect();

        prop_assert_eq!(context, expected.join("\n\n"));
    }

    /// Context is empty exactly when no item carries text.
    #[test]
    fn empty_iff_all_blank(items in arb_items()) {
        let all_blank = items.iter().all(|item| payload_text(&item.payload).trim().is_empty());
        prop_assert_eq!(build_context(&items).is_empty(), all_blank);
    }

    /// One source label per item, whatever the payload.
    #[test]
    fn one_source_per_item(items in arb_items()) {
        let labels = sources(&items);
        prop_assert_eq!(labels.len(), items.len());
        prop_assert!(labels.iter().all(|label| label == "Unknown"));
    }

    /// The first preferred key wins regardless of insertion order.
    #[test]
    fn preferred_key_wins(
        text in "[a-z]{1,10}",
        content in "[a-z]{1,10}",
        content_first in any::<bool>(),
    ) {
        let mut payload = Map::new();
        if content_first {
            payload.insert("content".to_string(), Value::String(content.clone()));
            payload.insert("text".to_string(), Value::String(text.clone()));
        } else {
            payload.insert("text".to_string(), Value::String(text.clone()));
            payload.insert("content".to_string(), Value::String(content));
        }
        prop_assert_eq!(payload_text(&payload), text);
    }
}

#[test]
fn fallback_join_keeps_insertion_order() {
    let mut payload = Map::new();
    payload.insert("foo".to_string(), Value::String("x".into()));
    payload.insert("bar".to_string(), Value::String("y".into()));
    assert_eq!(payload_text(&payload), "x y");
}
