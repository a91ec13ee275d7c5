use super::conditions::{merge_all, merge_condition};
use crate::crd::settings::{Condition, ConditionStatus};

fn cond(t: &str, status: ConditionStatus, reason: &str, msg: &str) -> Condition {
    Condition::new(t, status, reason, msg)
}

#[test]
fn appends_new_types_in_order() {
    let mut list = vec![];
    assert!(merge_condition(&mut list, cond("A", ConditionStatus::Unknown, "Unknown", "")));
    assert!(merge_condition(&mut list, cond("B", ConditionStatus::Unknown, "Unknown", "")));
    let types: Vec<_> = list.iter().map(|c| c.type_.as_str()).collect();
    assert_eq!(types, ["A", "B"]);
}

#[test]
fn message_and_timestamp_changes_are_not_changes() {
    let mut list = vec![cond("A", ConditionStatus::True, "Created", "old message")];
    let mut next = cond("A", ConditionStatus::True, "Created", "new message");
    next.last_transition_time = "2030-01-01T00:00:00Z".into();
    assert!(!merge_condition(&mut list, next));
    assert_eq!(list[0].message, "old message");
}

#[test]
fn status_or_reason_change_replaces_in_place() {
    let mut list = vec![
        cond("A", ConditionStatus::Unknown, "Unknown", ""),
        cond("B", ConditionStatus::Unknown, "Unknown", ""),
    ];
    assert!(merge_condition(&mut list, cond("B", ConditionStatus::False, "Error", "boom")));
    assert!(merge_condition(&mut list, cond("A", ConditionStatus::Unknown, "Pending", "")));
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].reason, "Pending");
    assert_eq!(list[1].status, ConditionStatus::False);
}

#[test]
fn merge_all_updates_every_type_in_one_pass() {
    let mut list = vec![
        cond("A", ConditionStatus::Unknown, "Unknown", ""),
        cond("B", ConditionStatus::Unknown, "Unknown", ""),
    ];
    let changed = merge_all(
        &mut list,
        [
            cond("A", ConditionStatus::True, "ACreated", ""),
            cond("B", ConditionStatus::True, "BCreated", ""),
        ],
    );
    assert!(changed);
    assert!(list.iter().all(|c| c.status == ConditionStatus::True));

    let unchanged = merge_all(
        &mut list,
        [
            cond("A", ConditionStatus::True, "ACreated", "x"),
            cond("B", ConditionStatus::True, "BCreated", "y"),
        ],
    );
    assert!(!unchanged);
}

#[test]
fn types_stay_unique_under_repeated_merges() {
    let mut list = vec![];
    let statuses = [ConditionStatus::Unknown, ConditionStatus::True, ConditionStatus::False];
    for round in 0..9 {
        for t in ["A", "B", "C"] {
            let s = statuses[(round + t.len()) % 3];
            merge_condition(&mut list, cond(t, s, "R", ""));
        }
    }
    let mut types: Vec<_> = list.iter().map(|c| c.type_.clone()).collect();
    types.sort();
    types.dedup();
    assert_eq!(types.len(), list.len());
    assert_eq!(list.len(), 3);
}
