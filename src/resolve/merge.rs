//! Payload merging for the `Merge` strategy

use serde_json::Value;

use crate::events::EventPayload;

/// Shallow union of two payloads, local fields winning on key collision
///
/// Returns `None` when the payloads are not of the same event type or the
/// union no longer decodes as that type; callers keep the local event then.
pub(crate) fn merge_payloads(local: &EventPayload, remote: &EventPayload) -> Option<EventPayload> {
    if local.event_type() != remote.event_type() {
        return None;
    }

    let merged = merge_json(&remote.to_value().ok()?, &local.to_value().ok()?)?;
    EventPayload::from_value(local.event_type(), merged).ok()
}

/// Merge two JSON objects, preferring local for conflicting keys
fn merge_json(remote: &Value, local: &Value) -> Option<Value> {
    match (remote, local) {
        (Value::Object(remote_map), Value::Object(local_map)) => {
            let mut merged = remote_map.clone();
            for (key, value) in local_map {
                merged.insert(key.clone(), value.clone());
            }
            Some(Value::Object(merged))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DeletedEntity, Highlight};
    use chrono::{TimeZone, Utc};

    fn highlight(note: Option<&str>, chapter: Option<&str>) -> EventPayload {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        EventPayload::HighlightCreated(Highlight {
            id: "hl-1".to_string(),
            book_id: "book-1".to_string(),
            cfi: "epubcfi(/6/4!/4/2/1:10)".to_string(),
            text: "call me Ishmael".to_string(),
            chapter: chapter.map(str::to_string),
            page_percent: None,
            color: "#ffff00".to_string(),
            annotation: note.map(str::to_string),
            tags: vec![],
            created_at: at,
            updated_at: at,
        })
    }

    #[test]
    fn test_merge_json() {
        let remote = serde_json::json!({
            "color": "red",
            "note": "remote note"
        });
        let local = serde_json::json!({
            "note": "local note",
            "tags": ["a", "b"]
        });

        let merged = merge_json(&remote, &local).unwrap();

        assert_eq!(merged["color"], "red");
        assert_eq!(merged["note"], "local note"); // Local wins
        assert_eq!(merged["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_merge_json_non_objects() {
        assert!(merge_json(&serde_json::json!([1]), &serde_json::json!({})).is_none());
    }

    #[test]
    fn test_remote_only_fields_preserved() {
        let local = highlight(Some("mine"), None);
        let remote = highlight(Some("theirs"), Some("Loomings"));

        let merged = merge_payloads(&local, &remote).unwrap();
        match merged {
            EventPayload::HighlightCreated(h) => {
                assert_eq!(h.annotation.as_deref(), Some("mine"));
                assert_eq!(h.chapter.as_deref(), Some("Loomings"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_different_types_do_not_merge() {
        let local = highlight(None, None);
        let remote = EventPayload::HighlightDeleted(DeletedEntity {
            id: "hl-1".to_string(),
        });
        assert!(merge_payloads(&local, &remote).is_none());
    }
}
