use crate::crd::settings::Condition;

/// Fold `incoming` into `conditions`, keyed by type.
///
/// An existing entry is replaced only when its status or reason differ;
/// message and timestamp churn alone never count as a change. Unknown types
/// are appended. Returns whether the list changed.
pub fn merge_condition(conditions: &mut Vec<Condition>, incoming: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == incoming.type_) {
        Some(existing)
            if existing.status != incoming.status
                || existing.reason != incoming.reason =>
        {
            *existing = incoming;
            true
        }
        Some(_) => false,
        None => {
            conditions.push(incoming);
            true
        }
    }
}

/// Merge every condition; each type is handled independently.
pub fn merge_all(
    conditions: &mut Vec<Condition>,
    incoming: impl IntoIterator<Item = Condition>,
) -> bool {
    incoming
        .into_iter()
        .fold(false, |changed, c| merge_condition(conditions, c) | changed)
}
