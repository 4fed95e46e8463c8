//! Criterion evaluation against stringified keys
//!
//! The same matcher decides bucket keys during an index scan and field
//! values during a full document scan, so both paths agree on every
//! operator.

use std::cmp::Ordering;

use regex::Regex;

use super::compare::compare_keys;
use super::criteria::{Operator, SearchCriterion};
use crate::index::{DataType, IndexError, IndexResult};

/// Minimum similarity for a fuzzy match
pub const FUZZY_THRESHOLD: f64 = 0.7;

/// `1 - levenshtein / max_len`, measured in characters
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// A criterion compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    operator: Operator,
    case_sensitive: bool,
    data_type: DataType,
    value: Option<String>,
    values: Vec<String>,
    min: Option<String>,
    max: Option<String>,
    regex: Option<Regex>,
}

impl KeyMatcher {
    /// Compiles `criterion`. `declared` is the field's configured type and
    /// applies when the criterion does not name one.
    pub fn new(criterion: &SearchCriterion, declared: DataType) -> IndexResult<Self> {
        criterion.validate()?;

        let data_type = match criterion.data_type {
            DataType::Auto => declared,
            explicit => explicit,
        };

        let regex = if criterion.operator == Operator::RegularExpression {
            let pattern = criterion.operand()?;
            let source = if criterion.case_sensitive {
                pattern.to_string()
            } else {
                format!("(?i){}", pattern)
            };
            let compiled = Regex::new(&source).map_err(|e| {
                IndexError::Search(format!("invalid regular expression '{}': {}", pattern, e))
            })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            operator: criterion.operator,
            case_sensitive: criterion.case_sensitive,
            data_type,
            value: criterion.value.clone(),
            values: criterion.values.clone(),
            min: criterion.min.clone(),
            max: criterion.max.clone(),
            regex,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Operand usable for a direct bucket lookup, when the lookup is exact
    pub fn exact_lookup_key(&self) -> Option<&str> {
        let value = self.value.as_deref()?;
        let numeric = self.data_type != DataType::String && parse_number(value).is_some();
        (self.operator == Operator::ExactMatch && self.case_sensitive && !numeric).then_some(value)
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }

    fn equals(&self, key: &str, operand: &str) -> bool {
        if self.data_type != DataType::String {
            if let (Some(a), Some(b)) = (parse_number(key), parse_number(operand)) {
                return a == b;
            }
        }
        if self.case_sensitive {
            key == operand
        } else {
            key.to_lowercase() == operand.to_lowercase()
        }
    }

    fn compare(&self, key: &str, operand: &str) -> Ordering {
        compare_keys(key, operand, self.data_type)
    }

    /// Evaluates a present key
    pub fn matches_key(&self, key: &str) -> bool {
        let value = self.value.as_deref().unwrap_or_default();
        match self.operator {
            Operator::ExactMatch => self.equals(key, value),
            Operator::Contains => self.fold(key).contains(&self.fold(value)),
            Operator::StartsWith => self.fold(key).starts_with(&self.fold(value)),
            Operator::EndsWith => self.fold(key).ends_with(&self.fold(value)),
            Operator::GreaterThan => self.compare(key, value) == Ordering::Greater,
            Operator::GreaterThanOrEqual => self.compare(key, value) != Ordering::Less,
            Operator::LessThan => self.compare(key, value) == Ordering::Less,
            Operator::LessThanOrEqual => self.compare(key, value) != Ordering::Greater,
            Operator::InRange => match (self.min.as_deref(), self.max.as_deref()) {
                (Some(min), Some(max)) => {
                    self.compare(key, min) != Ordering::Less
                        && self.compare(key, max) != Ordering::Greater
                }
                _ => false,
            },
            Operator::InList => self.values.iter().any(|v| self.equals(key, v)),
            Operator::NotInList => !self.values.iter().any(|v| self.equals(key, v)),
            Operator::IsNull => false,
            Operator::IsNotNull => true,
            Operator::RegularExpression => self.regex.as_ref().is_some_and(|r| r.is_match(key)),
            Operator::FuzzySearch => similarity(&self.fold(key), &self.fold(value)) >= FUZZY_THRESHOLD,
        }
    }

    /// Evaluates a field value given as its key; `None` is a null value.
    ///
    /// Null only matches `IsNull`.
    pub fn matches_value(&self, key: Option<&str>) -> bool {
        match key {
            None => self.operator == Operator::IsNull,
            Some(key) => self.matches_key(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(c: SearchCriterion) -> KeyMatcher {
        KeyMatcher::new(&c, DataType::Auto).unwrap()
    }

    #[test]
    fn test_exact_match_case_modes() {
        assert!(matcher(SearchCriterion::eq("city", "aden")).matches_key("Aden"));
        assert!(!matcher(SearchCriterion::eq("city", "aden").case_sensitive()).matches_key("Aden"));
        assert!(matcher(SearchCriterion::eq("price", "120.0")).matches_key("120"));
    }

    #[test]
    fn test_exact_lookup_key() {
        let m = matcher(SearchCriterion::eq("city", "Aden").case_sensitive());
        assert_eq!(m.exact_lookup_key(), Some("Aden"));
        assert_eq!(matcher(SearchCriterion::eq("city", "Aden")).exact_lookup_key(), None);
        let m = matcher(SearchCriterion::eq("price", 120).case_sensitive());
        assert_eq!(m.exact_lookup_key(), None);
    }

    #[test]
    fn test_string_operators() {
        assert!(matcher(SearchCriterion::contains("name", "VILLA")).matches_key("Sea Villa"));
        assert!(matcher(SearchCriterion::starts_with("name", "sea")).matches_key("Sea Villa"));
        assert!(matcher(SearchCriterion::ends_with("name", "villa")).matches_key("Sea Villa"));
        assert!(!matcher(SearchCriterion::ends_with("name", "sea")).matches_key("Sea Villa"));
    }

    #[test]
    fn test_numeric_ranges() {
        assert!(matcher(SearchCriterion::gt("price", 99)).matches_key("100"));
        assert!(!matcher(SearchCriterion::gt("price", 100)).matches_key("100"));
        assert!(matcher(SearchCriterion::gte("price", 100)).matches_key("100"));
        assert!(matcher(SearchCriterion::lt("price", 100)).matches_key("99.5"));
        let range = matcher(SearchCriterion::between("price", 100, 200));
        assert!(range.matches_key("100"));
        assert!(range.matches_key("200"));
        assert!(!range.matches_key("200.5"));
        // numeric, not lexical
        assert!(!range.matches_key("1000"));
    }

    #[test]
    fn test_lists_and_nulls() {
        let list = matcher(SearchCriterion::in_list("city", ["Aden", "Sanaa"]));
        assert!(list.matches_key("sanaa"));
        assert!(!list.matches_key("Taiz"));

        let not_list = matcher(SearchCriterion::not_in_list("city", ["Aden"]));
        assert!(not_list.matches_value(Some("Taiz")));
        assert!(!not_list.matches_value(None));

        assert!(matcher(SearchCriterion::is_null("rating")).matches_value(None));
        assert!(!matcher(SearchCriterion::is_null("rating")).matches_value(Some("4")));
        assert!(matcher(SearchCriterion::is_not_null("rating")).matches_value(Some("4")));
    }

    #[test]
    fn test_regex() {
        assert!(matcher(SearchCriterion::regex("code", "^ab[0-9]+$")).matches_key("AB12"));
        assert!(!matcher(SearchCriterion::regex("code", "^ab[0-9]+$").case_sensitive()).matches_key("AB12"));

        let err = KeyMatcher::new(&SearchCriterion::regex("code", "(unclosed"), DataType::Auto).unwrap_err();
        assert_eq!(err.code(), "SEARCH_ERROR");
    }

    #[test]
    fn test_fuzzy_threshold() {
        let m = matcher(SearchCriterion::fuzzy("city", "Sanaa"));
        assert!(m.matches_key("Sanaa"));
        // one edit over five characters: 0.8
        assert!(m.matches_key("Sanna"));
        // three edits over five: 0.4
        assert!(!m.matches_key("Aden"));
        assert!((similarity("abcde", "abcdx") - 0.8).abs() < 1e-9);
        assert!((similarity("", "") - 1.0).abs() < 1e-9);
    }
}
