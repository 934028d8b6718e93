//! SSE delta deduplication seen through the public event stream.

use ralph_adapters::Normalizer;
use ralph_core::AgentEvent;
use serde_json::json;

// Cumulative part updates surface as suffix-only message events, and
// concatenating them reproduces the final text.
#[test]
fn cumulative_sse_frames_dedupe_to_suffixes() {
    let mut normalizer = Normalizer::new();
    let frames = ["Hel", "Hello", "Hello world"];

    let mut emitted = Vec::new();
    for text in frames {
        let frame = json!({
            "type": "message.part.updated",
            "properties": {"part": {"id": "prt_1", "messageID": "msg_1", "text": text}}
        });
        if let Some(AgentEvent::Message { text }) = normalizer.normalize(&frame) {
            emitted.push(text);
        }
    }

    assert_eq!(emitted, vec!["Hel", "lo", " world"]);
    assert_eq!(emitted.concat(), "Hello world");
}

#[test]
fn re_emitted_identical_frames_are_dropped_entirely() {
    let mut normalizer = Normalizer::new();
    let frame = json!({
        "type": "message.part.updated",
        "properties": {"part": {"id": "prt_1", "text": "stable"}}
    });
    assert!(normalizer.normalize(&frame).is_some());
    assert!(normalizer.normalize(&frame).is_none());
    assert!(normalizer.normalize(&frame).is_none());
}

#[test]
fn reasoning_streams_dedupe_independently_of_messages() {
    let mut normalizer = Normalizer::new();

    let reasoning = |text: &str| {
        json!({"type": "item.completed", "item": {"type": "reasoning", "text": text}})
    };
    let message = |text: &str| {
        json!({"type": "item.completed", "item": {"type": "agent_message", "text": text}})
    };

    assert_eq!(
        normalizer.normalize(&reasoning("think")),
        Some(AgentEvent::Reasoning {
            text: "think".to_string()
        })
    );
    // the same text arriving as a message is not a duplicate
    assert_eq!(
        normalizer.normalize(&message("think")),
        Some(AgentEvent::Message {
            text: "think".to_string()
        })
    );
    // but extending the reasoning stream only forwards the new tail
    assert_eq!(
        normalizer.normalize(&reasoning("think harder")),
        Some(AgentEvent::Reasoning {
            text: " harder".to_string()
        })
    );
}
