//! Comparing a desired spec against what the API server stored.
//!
//! The server defaults fields we never set (a NetworkPolicy port's
//! `protocol`, for one) and canonicalises quantities (`1000m` comes back
//! as `1`). A raw equality check would call every such object drifted.
//!
//! Keys present in `stored` but absent from `desired` are treated as
//! server-owned, so an optional field dropped from the desired spec is not
//! pruned until some other field in the spec changes.

use serde_json::Value;

/// True when `stored` already carries everything `desired` asks for.
pub fn spec_matches(stored: &Value, desired: &Value) -> bool {
    match (stored, desired) {
        (Value::Object(s), Value::Object(d)) => d.iter().all(|(k, dv)| match s.get(k) {
            Some(sv) => spec_matches(sv, dv),
            None => dv.is_null(),
        }),
        (Value::Array(s), Value::Array(d)) => {
            s.len() == d.len() && s.iter().zip(d).all(|(sv, dv)| spec_matches(sv, dv))
        }
        (Value::String(s), Value::String(d)) => {
            s == d || matches!((quantity(s), quantity(d)), (Some(a), Some(b)) if a == b)
        }
        _ => stored == desired,
    }
}

// Scale of each suffix in nano units.
const SUFFIXES: &[(&str, i128)] = &[
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
    ("n", 1),
    ("u", 1_000),
    ("m", 1_000_000),
    ("k", 1_000_000_000_000),
    ("M", 1_000_000_000_000_000),
    ("G", 1_000_000_000_000_000_000),
    ("T", 1_000_000_000_000_000_000_000),
    ("P", 1_000_000_000_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000_000_000_000),
];

const NANO: i128 = 1_000_000_000;

/// Value of a Kubernetes quantity in units of 1e-18, or None when `s` is not
/// a plain decimal quantity.
fn quantity(s: &str) -> Option<i128> {
    let (number, scale) = SUFFIXES
        .iter()
        .find_map(|(suffix, scale)| {
            let scale = if suffix.ends_with('i') { scale * NANO } else { *scale };
            s.strip_suffix(suffix).map(|n| (n, scale))
        })
        .unwrap_or((s, NANO));

    let (int, frac) = number.split_once('.').unwrap_or((number, ""));
    if int.is_empty()
        || frac.len() > 9
        || !int.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let int: i128 = int.parse().ok()?;
    let frac: i128 = if frac.is_empty() {
        0
    } else {
        frac.parse::<i128>().ok()? * 10i128.pow(9 - frac.len() as u32)
    };
    int.checked_mul(NANO)?.checked_add(frac)?.checked_mul(scale)
}
