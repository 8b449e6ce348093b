// ── Structural merge for query and state patches ──
//
// Shape-preserving: only keys present in the source are visited, and
// recursion happens only where the *target* already holds an object.
// Arrays and null count as scalars. Merging a scalar into an object
// target visits no keys and leaves the target as it was.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Merge `patch` into `target`, returning the merged value.
///
/// For each key in `patch`: if the target's existing value at that key is
/// itself an object, merge recursively; otherwise assign the patch value.
/// Keys absent from `patch` are untouched.
pub fn merge_values(target: &Value, patch: &Value) -> Value {
    match (target, patch) {
        (Value::Object(base), Value::Object(incoming)) => {
            let mut out = base.clone();
            for (key, value) in incoming {
                let merged = match out.get(key) {
                    Some(existing @ Value::Object(_)) => merge_values(existing, value),
                    _ => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        // Object target, scalar patch: nothing to visit.
        (Value::Object(base), _) => Value::Object(base.clone()),
        _ => patch.clone(),
    }
}

/// Merge a serializable patch into a typed target by round-tripping both
/// through `Value`. A `None` target merges into an empty object.
pub(crate) fn merge_patch<T, P>(target: Option<&T>, patch: &P) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
    P: Serialize + ?Sized,
{
    let base = match target {
        Some(t) => serde_json::to_value(t)?,
        None => Value::Object(Map::new()),
    };
    let patch = serde_json::to_value(patch)?;
    serde_json::from_value(merge_values(&base, &patch))
}
