//! Recursive JSON merging for snapshot assembly.
//!
//! Trajectory snapshots combine run metadata with whatever the model and
//! environment collaborators want to record about themselves. Map keys
//! combine recursively; non-map leaves from later values override earlier
//! ones.

use serde_json::Value;

/// Merge `overlay` into `base`, recursing through objects.
///
/// Non-object leaves in `overlay` win. Arrays are leaves: a later array
/// replaces an earlier one wholesale.
pub fn recursive_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => recursive_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold a sequence of values with [`recursive_merge`], left to right.
pub fn merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values
        .into_iter()
        .fold(Value::Object(serde_json::Map::new()), recursive_merge)
}
