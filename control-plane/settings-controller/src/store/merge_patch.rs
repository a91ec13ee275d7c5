//! Building RFC 7386 merge patches. Applying them is `json_patch::merge`.

use serde_json::{Map, Value};

/// Compute the merge patch that turns `before` into `after`.
pub fn diff(before: &Value, after: &Value) -> Value {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut out = Map::new();
            for (k, bv) in b {
                match a.get(k) {
                    None => {
                        out.insert(k.clone(), Value::Null);
                    }
                    Some(av) if av != bv => {
                        out.insert(k.clone(), diff(bv, av));
                    }
                    Some(_) => {}
                }
            }
            for (k, av) in a {
                if !b.contains_key(k) {
                    out.insert(k.clone(), av.clone());
                }
            }
            Value::Object(out)
        }
        _ => after.clone(),
    }
}

pub fn is_empty(patch: &Value) -> bool {
    matches!(patch, Value::Object(m) if m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_only_carries_changed_fields() {
        let before = json!({
            "metadata": {"name": "s", "labels": {"a": "1"}},
            "status": {"conditions": [{"type": "A", "status": "Unknown"}]}
        });
        let mut after = before.clone();
        after["status"]["conditions"][0]["status"] = json!("True");
        let patch = diff(&before, &after);
        assert_eq!(
            patch,
            json!({"status": {"conditions": [{"type": "A", "status": "True"}]}})
        );
    }

    #[test]
    fn diff_nulls_removed_keys() {
        let patch = diff(
            &json!({"spec": {"egress": [], "policyTypes": ["Egress"]}}),
            &json!({"spec": {"policyTypes": ["Egress"]}}),
        );
        assert_eq!(patch, json!({"spec": {"egress": null}}));
    }

    #[test]
    fn identical_values_produce_empty_patch() {
        let v = json!({"a": {"b": [1, 2]}});
        assert!(is_empty(&diff(&v, &v)));
        assert!(!is_empty(&json!({"a": 1})));
    }

    #[test]
    fn merged_diff_reaches_target_and_keeps_foreign_fields() {
        let before = json!({"spec": {"hard": {"pods": "10"}, "scopes": ["A"]}});
        let after = json!({"spec": {"hard": {"pods": "20", "cpu": "4"}}});
        let patch = diff(&before, &after);

        let mut live = before.clone();
        live["metadata"] = json!({"labels": {"owner": "someone-else"}});
        json_patch::merge(&mut live, &patch);

        assert_eq!(live["spec"], after["spec"]);
        assert_eq!(live["metadata"]["labels"]["owner"], "someone-else");
    }
}
