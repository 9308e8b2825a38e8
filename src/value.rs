//! The record type shared by every pipeline stage.
//!
//! A [`Record`] is an order-preserving string-keyed map of [`Value`]s. Both
//! are thin aliases over `serde_json`'s types; `serde_json` is built with
//! the `preserve_order` feature so `Map` is backed by `indexmap` and
//! insertion order survives the whole pipeline, which spec §3 requires of
//! metadata keys.

pub use serde_json::Value;

/// An order-preserving string-keyed map of [`Value`]s.
pub type Record = serde_json::Map<String, Value>;

/// Merge `overlay` into `base`, with `overlay` winning on key collisions.
/// Existing key order in `base` is preserved; new keys from `overlay` are
/// appended in their own order. Used throughout the logger to compose
/// bindings, context, and call metadata (spec §4.7 step 2).
pub fn merge_into(base: &mut Record, overlay: Record) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Merge two records into a fresh one without mutating either input.
pub fn merged(base: &Record, overlay: &Record) -> Record {
    let mut out = base.clone();
    for (key, value) in overlay {
        out.insert(key.clone(), value.clone());
    }
    out
}
