use std::collections::HashMap;
use std::hash::Hash;

/// Distribute fetched rows over the requested keys.
///
/// Returns one `Vec` per entry of `keys`, in the same order; keys without rows get an empty
/// `Vec` so positions never shift.
pub fn group_by_keys<K, T, F>(keys: &[K], items: Vec<T>, key_of: F) -> Vec<Vec<T>>
where
    K: Eq + Hash,
    T: Clone,
    F: Fn(&T) -> K,
{
    let mut grouped: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        grouped.entry(key_of(&item)).or_default().push(item);
    }

    keys.iter()
        .map(|key| grouped.get(key).cloned().unwrap_or_default())
        .collect()
}
