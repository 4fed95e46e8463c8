//! Candidate resolution against a field index

use std::collections::BTreeSet;

use super::criteria::Operator;
use super::filters::KeyMatcher;
use crate::index::FieldIndex;

/// IDs of one field index satisfying `matcher`.
///
/// `universe` is every ID in the index; only `IsNull` needs it, since null
/// values have no bucket.
pub fn resolve_indexed(
    index: &FieldIndex,
    matcher: &KeyMatcher,
    universe: Option<&BTreeSet<String>>,
) -> BTreeSet<String> {
    match matcher.operator() {
        Operator::IsNotNull => index.all_ids(),
        Operator::IsNull => {
            let present = index.all_ids();
            universe
                .map(|all| all.difference(&present).cloned().collect())
                .unwrap_or_default()
        }
        _ => {
            if let Some(key) = matcher.exact_lookup_key() {
                return index.lookup_eq(key).cloned().unwrap_or_default();
            }
            index
                .iter()
                .filter(|(key, _)| matcher.matches_key(key))
                .flat_map(|(_, ids)| ids.iter().cloned())
                .collect()
        }
    }
}

/// Left-to-right intersection step. Returns the new candidate set.
pub fn intersect(current: Option<BTreeSet<String>>, next: BTreeSet<String>) -> BTreeSet<String> {
    match current {
        None => next,
        Some(current) => {
            let (small, large) = if current.len() <= next.len() {
                (current, next)
            } else {
                (next, current)
            };
            small.into_iter().filter(|id| large.contains(id)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DataType;
    use crate::query::SearchCriterion;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn city_index() -> FieldIndex {
        let mut index = FieldIndex::new();
        index.insert("Aden", "p1");
        index.insert("Aden", "p2");
        index.insert("Sanaa", "p3");
        index
    }

    fn resolve(c: SearchCriterion, universe: Option<&BTreeSet<String>>) -> BTreeSet<String> {
        let matcher = KeyMatcher::new(&c, DataType::Auto).unwrap();
        resolve_indexed(&city_index(), &matcher, universe)
    }

    #[test]
    fn test_exact_case_insensitive_scan() {
        assert_eq!(resolve(SearchCriterion::eq("city", "aden"), None), set(&["p1", "p2"]));
        assert_eq!(
            resolve(SearchCriterion::eq("city", "aden").case_sensitive(), None),
            set(&[])
        );
        assert_eq!(
            resolve(SearchCriterion::eq("city", "Sanaa").case_sensitive(), None),
            set(&["p3"])
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            resolve(SearchCriterion::in_list("city", ["aden", "sanaa"]), None),
            set(&["p1", "p2", "p3"])
        );
        assert_eq!(
            resolve(SearchCriterion::not_in_list("city", ["Aden"]), None),
            set(&["p3"])
        );
    }

    #[test]
    fn test_null_operators() {
        let universe = set(&["p1", "p2", "p3", "p4"]);
        assert_eq!(
            resolve(SearchCriterion::is_null("city"), Some(&universe)),
            set(&["p4"])
        );
        assert_eq!(
            resolve(SearchCriterion::is_not_null("city"), None),
            set(&["p1", "p2", "p3"])
        );
    }

    #[test]
    fn test_intersect() {
        assert_eq!(intersect(None, set(&["a"])), set(&["a"]));
        assert_eq!(
            intersect(Some(set(&["a", "b", "c"])), set(&["b", "c", "d"])),
            set(&["b", "c"])
        );
        assert!(intersect(Some(set(&["a"])), set(&["b"])).is_empty());
    }
}
