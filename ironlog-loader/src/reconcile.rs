use crate::outcome::Outcome;
use ironlog_data::Key;
use std::collections::HashMap;

/// Map an unordered fetch result back onto the ordered key list.
///
/// Produces exactly one outcome per key, in the order of `keys`, with
/// `NotFound` for every key the fetch did not return. Callers zip the
/// result positionally against `keys`, so fetch order must never leak
/// through.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use ironlog_data::Key;
/// use ironlog_loader::reconcile;
///
/// let keys = [Key::exercise(1), Key::exercise(2), Key::exercise(3)];
/// let found = HashMap::from([(Key::exercise(3), "c"), (Key::exercise(1), "a")]);
///
/// let outcomes = reconcile(&keys, found);
/// assert_eq!(outcomes[0].value(), Some(&"a"));
/// assert!(outcomes[1].is_not_found());
/// assert_eq!(outcomes[2].value(), Some(&"c"));
/// ```
pub fn reconcile<V: Clone>(keys: &[Key], found: HashMap<Key, V>) -> Vec<Outcome<V>> {
    keys.iter()
        .map(|key| match found.get(key) {
            Some(value) => Outcome::Value(value.clone()),
            None => Outcome::NotFound,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_order_not_fetch_order() {
        let keys = [Key::exercise(10), Key::exercise(20), Key::exercise(30)];
        // Insertion order deliberately reversed.
        let mut found = HashMap::new();
        found.insert(Key::exercise(30), 30);
        found.insert(Key::exercise(10), 10);
        found.insert(Key::exercise(20), 20);

        let values: Vec<i32> = reconcile(&keys, found)
            .into_iter()
            .filter_map(Outcome::into_value)
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn test_extra_keys_in_result_are_ignored() {
        let keys = [Key::exercise(1)];
        let found = HashMap::from([(Key::exercise(1), 1), (Key::set_entry(1), 2)]);
        let outcomes = reconcile(&keys, found);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].value(), Some(&1));
    }

    #[test]
    fn test_empty_result_is_all_not_found() {
        let keys = [Key::exercise(1), Key::exercise(2)];
        let outcomes = reconcile::<i32>(&keys, HashMap::new());
        assert!(outcomes.iter().all(Outcome::is_not_found));
    }
}
