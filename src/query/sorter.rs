//! Ordering of candidate IDs
//!
//! Sorting works on IDs plus pre-fetched sort keys, so the whole candidate
//! set can be ordered before pagination without loading documents. Each
//! column settles on one comparison type before sorting, which keeps the
//! order total even when a field mixes numbers and text.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::compare::{column_type, parse_number};
use super::criteria::{SortCriterion, SortDirection};
use crate::index::{parse_bool, parse_date, DataType};

/// One key parsed under its column's comparison type.
///
/// Keys that do not parse under an explicit type become `Text` and order
/// after every parsed key.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    Text { folded: String, raw: String },
}

impl SortKey {
    fn parse(raw: &str, data_type: DataType) -> Self {
        let typed = match data_type {
            DataType::Number => parse_number(raw).map(SortKey::Number),
            DataType::Date => parse_date(raw).map(SortKey::Date),
            DataType::Boolean => parse_bool(raw).map(SortKey::Boolean),
            DataType::String | DataType::Auto => None,
        };
        typed.unwrap_or_else(|| SortKey::Text {
            folded: raw.to_lowercase(),
            raw: raw.to_string(),
        })
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) | SortKey::Date(_) | SortKey::Boolean(_) => 0,
            SortKey::Text { .. } => 1,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Boolean(a), SortKey::Boolean(b)) => a.cmp(b),
            (
                SortKey::Text { folded: fa, raw: ra },
                SortKey::Text { folded: fb, raw: rb },
            ) => fa.cmp(fb).then_with(|| ra.cmp(rb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Sort keys of one sort criterion, keyed by document ID
#[derive(Debug, Clone)]
pub struct SortColumn {
    direction: SortDirection,
    data_type: DataType,
    keys: HashMap<String, SortKey>,
}

impl SortColumn {
    /// Builds a column from stringified keys. The comparison type is chosen
    /// once from all of `raw`.
    pub fn new(criterion: &SortCriterion, raw: &HashMap<String, String>) -> Self {
        let data_type = column_type(raw.values().map(String::as_str), criterion.data_type);
        let keys = raw
            .iter()
            .map(|(id, key)| (id.clone(), SortKey::parse(key, data_type)))
            .collect();
        Self {
            direction: criterion.direction,
            data_type,
            keys,
        }
    }

    /// The comparison type the column settled on
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// A missing key sorts before any present key
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let ordering = match (self.keys.get(a), self.keys.get(b)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.total_cmp(b),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Sorts candidate IDs deterministically
pub struct ResultSorter;

impl ResultSorter {
    /// Orders by each column in turn, then by ID ascending.
    pub fn sort_by_columns(ids: &mut [String], columns: &[SortColumn]) {
        ids.sort_by(|a, b| {
            columns
                .iter()
                .map(|c| c.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.cmp(b))
        });
    }

    /// Orders by score descending, then by ID ascending.
    pub fn sort_by_score(ids: &mut [String], scores: &HashMap<String, f64>) {
        ids.sort_by(|a, b| {
            let sa = scores.get(a).copied().unwrap_or(0.0);
            let sb = scores.get(b).copied().unwrap_or(0.0);
            sb.partial_cmp(&sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn column(criterion: SortCriterion, pairs: &[(&str, &str)]) -> SortColumn {
        let raw = pairs
            .iter()
            .map(|(id, key)| (id.to_string(), key.to_string()))
            .collect();
        SortColumn::new(&criterion, &raw)
    }

    #[test]
    fn test_sort_ascending_numeric() {
        let mut list = ids(&["c", "a", "b"]);
        let col = column(SortCriterion::asc("price"), &[("a", "100"), ("b", "20"), ("c", "3")]);
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["c", "b", "a"]));
    }

    #[test]
    fn test_sort_descending() {
        let mut list = ids(&["c", "a", "b"]);
        let col = column(SortCriterion::desc("price"), &[("a", "100"), ("b", "20"), ("c", "3")]);
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_missing_values_first_ascending() {
        let mut list = ids(&["a", "b", "c"]);
        let col = column(SortCriterion::asc("rating"), &[("a", "4"), ("c", "3")]);
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["b", "c", "a"]));
    }

    #[test]
    fn test_secondary_column_and_id_tiebreak() {
        let mut list = ids(&["d", "c", "b", "a"]);
        let city = column(
            SortCriterion::asc("city"),
            &[("a", "Aden"), ("b", "Aden"), ("c", "Aden"), ("d", "Sanaa")],
        );
        let price = column(SortCriterion::desc("price"), &[("a", "10"), ("b", "10"), ("c", "50")]);
        ResultSorter::sort_by_columns(&mut list, &[city, price]);
        assert_eq!(list, ids(&["c", "a", "b", "d"]));
    }

    #[test]
    fn test_mixed_column_sorts_as_text() {
        let mut list = ids(&["a", "b", "c", "d"]);
        let col = column(
            SortCriterion::asc("code"),
            &[("a", "9"), ("b", "10"), ("c", "5a"), ("d", "100")],
        );
        assert_eq!(col.data_type(), DataType::String);
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["b", "d", "c", "a"]));
    }

    #[test]
    fn test_numeric_column_sorts_numerically() {
        let mut list = ids(&["a", "b", "c"]);
        let col = column(SortCriterion::asc("code"), &[("a", "9"), ("b", "10"), ("c", "120.0")]);
        assert_eq!(col.data_type(), DataType::Number);
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_explicit_type_puts_unparsable_keys_last() {
        let mut list = ids(&["a", "b", "c", "d"]);
        let col = column(
            SortCriterion::asc("price").with_data_type(DataType::Number),
            &[("a", "n/a"), ("b", "30"), ("c", "4"), ("d", "abc")],
        );
        ResultSorter::sort_by_columns(&mut list, &[col]);
        assert_eq!(list, ids(&["c", "b", "d", "a"]));
    }

    #[test]
    fn test_sort_by_score() {
        let mut list = ids(&["a", "b", "c"]);
        let scores = HashMap::from([("a".to_string(), 0.1), ("b".to_string(), 0.9), ("c".to_string(), 0.1)]);
        ResultSorter::sort_by_score(&mut list, &scores);
        assert_eq!(list, ids(&["b", "a", "c"]));
    }
}
