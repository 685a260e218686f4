//! # Configuration Tree Primitives
//!
//! The configuration tree is a generic key/value mapping that has already been
//! parsed upstream. Paths address it with either `.` or `:` as separator, and
//! both separators may be mixed within one path.

use serde_json::{Map, Value};

/// A nested configuration mapping.
pub type ConfigTree = Map<String, Value>;

/// Free-form metadata attached to events and contributions.
pub type Metadata = Map<String, Value>;

/// The interchangeable path separators.
pub const PATH_SEPARATORS: [char; 2] = ['.', ':'];

/// Split a configuration path into its segments.
///
/// Empty segments are dropped, so `"a..b"` and `":a:b:"` both address `a.b`.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(|c| PATH_SEPARATORS.contains(&c))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Walk `tree` along `segments`.
///
/// Any intermediate segment that is not a map is a miss, never an error.
#[must_use]
pub fn lookup<'a>(tree: &'a ConfigTree, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = tree.get(*first)?;
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Deep-merge `overlay` into `base`.
///
/// Maps merge recursively; any other value in `overlay` replaces the value in
/// `base` at the same key.
pub fn deep_merge(base: &mut ConfigTree, overlay: ConfigTree) {
    for (key, incoming) in overlay {
        match (base.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, incoming) => {
                base.insert(key, incoming);
            }
        }
    }
}

/// Deep-merge `overlay` into the map at `segments` inside `tree`.
///
/// Missing maps on the path are created. A non-map value sitting on the path
/// is replaced by an empty map before merging.
pub fn merge_at(tree: &mut ConfigTree, segments: &[&str], overlay: ConfigTree) {
    let Some((first, rest)) = segments.split_first() else {
        deep_merge(tree, overlay);
        return;
    };
    let mut child = match tree.remove(*first) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merge_at(&mut child, rest, overlay);
    tree.insert((*first).to_string(), Value::Object(child));
}

/// Remove and return the value at `segments`, if the whole path exists.
pub fn remove_at(tree: &mut ConfigTree, segments: &[&str]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = tree;
    for segment in parents {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    current.remove(*last)
}
