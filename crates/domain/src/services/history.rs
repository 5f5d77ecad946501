//! Change-history computations that do not touch the database.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{HistoryRecord, RecordChangeSummary};

/// Keys whose JSON serialization differs between the two snapshots.
///
/// A key present on one side only counts as changed. When one snapshot is
/// missing (insert or delete) every key of the other side is changed.
/// Non-object snapshots are compared as a whole under the key `"value"`.
/// The result is sorted.
pub fn changed_fields(old: Option<&JsonValue>, new: Option<&JsonValue>) -> Vec<String> {
    let old_map = old.map(as_fields);
    let new_map = new.map(as_fields);

    let keys: BTreeSet<&String> = old_map
        .iter()
        .chain(new_map.iter())
        .flat_map(|m| m.keys())
        .collect();

    keys.into_iter()
        .filter(|key| {
            let before = old_map.as_ref().and_then(|m| m.get(*key)).map(|v| v.to_string());
            let after = new_map.as_ref().and_then(|m| m.get(*key)).map(|v| v.to_string());
            before != after
        })
        .cloned()
        .collect()
}

fn as_fields(value: &JsonValue) -> BTreeMap<String, &JsonValue> {
    match value {
        JsonValue::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        other => BTreeMap::from([("value".to_string(), other)]),
    }
}

/// Summarize a record's change timeline.
pub fn summarize(
    table_name: &str,
    record_id: &str,
    records: &[HistoryRecord],
) -> RecordChangeSummary {
    let mut summary = RecordChangeSummary {
        table_name: table_name.to_string(),
        record_id: record_id.to_string(),
        total_changes: records.len(),
        ..Default::default()
    };

    let mut contributors = BTreeSet::new();
    for record in records {
        summary.first_changed_at = Some(match summary.first_changed_at {
            Some(first) if first <= record.changed_at => first,
            _ => record.changed_at,
        });
        summary.last_changed_at = Some(match summary.last_changed_at {
            Some(last) if last >= record.changed_at => last,
            _ => record.changed_at,
        });

        if let Some(ref user) = record.changed_by {
            contributors.insert(user.clone());
        }
        for field in &record.changed_fields {
            *summary.field_change_counts.entry(field.clone()).or_insert(0) += 1;
        }
        *summary
            .action_counts
            .entry(record.action.to_string())
            .or_insert(0) += 1;
    }
    summary.contributors = contributors.into_iter().collect();

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryAction;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_changed_fields_single_difference() {
        let old = json!({"a": 1, "b": 2});
        let new = json!({"a": 1, "b": 3});
        assert_eq!(changed_fields(Some(&old), Some(&new)), vec!["b"]);
    }

    #[test]
    fn test_changed_fields_added_and_removed_keys() {
        let old = json!({"a": 1, "gone": true});
        let new = json!({"a": 1, "added": "x"});
        assert_eq!(changed_fields(Some(&old), Some(&new)), vec!["added", "gone"]);
    }

    #[test]
    fn test_changed_fields_nested_values_compare_serialized() {
        let old = json!({"hours": {"mon": "9-5"}, "tags": [1, 2]});
        let new = json!({"hours": {"mon": "9-6"}, "tags": [1, 2]});
        assert_eq!(changed_fields(Some(&old), Some(&new)), vec!["hours"]);
    }

    #[test]
    fn test_changed_fields_insert_marks_all_keys() {
        let new = json!({"key": "site_name", "value": "Shop"});
        assert_eq!(changed_fields(None, Some(&new)), vec!["key", "value"]);
    }

    #[test]
    fn test_changed_fields_delete_marks_all_keys() {
        let old = json!({"id": 4, "name": "x"});
        assert_eq!(changed_fields(Some(&old), None), vec!["id", "name"]);
    }

    #[test]
    fn test_changed_fields_identical() {
        let row = json!({"a": 1});
        assert!(changed_fields(Some(&row), Some(&row)).is_empty());
        assert!(changed_fields(None, None).is_empty());
    }

    #[test]
    fn test_changed_fields_null_vs_missing() {
        let old = json!({"a": null});
        let new = json!({});
        assert_eq!(changed_fields(Some(&old), Some(&new)), vec!["a"]);
    }

    #[test]
    fn test_changed_fields_scalar_snapshots() {
        assert_eq!(changed_fields(Some(&json!(1)), Some(&json!(2))), vec!["value"]);
    }

    fn entry(
        action: HistoryAction,
        fields: &[&str],
        by: Option<&str>,
        minutes_ago: i64,
    ) -> HistoryRecord {
        HistoryRecord {
            id: Uuid::new_v4(),
            table_name: "settings".into(),
            record_id: "r1".into(),
            action,
            old_data: None,
            new_data: Some(json!({})),
            changed_fields: fields.iter().map(|f| f.to_string()).collect(),
            changed_by: by.map(str::to_string),
            changed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            entry(HistoryAction::Update, &["value"], Some("alice"), 1),
            entry(HistoryAction::Update, &["value", "description"], Some("bob"), 5),
            entry(HistoryAction::Insert, &["key", "value"], Some("alice"), 60),
        ];

        let summary = summarize("settings", "r1", &records);
        assert_eq!(summary.total_changes, 3);
        assert_eq!(summary.contributors, vec!["alice", "bob"]);
        assert_eq!(summary.field_change_counts.get("value"), Some(&3));
        assert_eq!(summary.field_change_counts.get("description"), Some(&1));
        assert_eq!(summary.action_counts.get("update"), Some(&2));
        assert_eq!(summary.first_changed_at, Some(records[2].changed_at));
        assert_eq!(summary.last_changed_at, Some(records[0].changed_at));
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize("settings", "missing", &[]);
        assert_eq!(summary.total_changes, 0);
        assert!(summary.first_changed_at.is_none());
        assert!(summary.contributors.is_empty());
    }
}
