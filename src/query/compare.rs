//! Type-aware comparison of stringified keys

use std::cmp::Ordering;

use crate::index::{parse_bool, parse_date, DataType};

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn compare_as_number(a: &str, b: &str) -> Option<Ordering> {
    parse_number(a)?.partial_cmp(&parse_number(b)?)
}

fn compare_as_date(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_date(a)?.cmp(&parse_date(b)?))
}

fn compare_as_bool(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_bool(a)?.cmp(&parse_bool(b)?))
}

/// Case-insensitive first, byte order as tiebreak so the order is total
fn compare_as_string(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Compares two keys.
///
/// With `Auto` the first interpretation both keys support wins: number,
/// date, boolean, then string. An explicit type whose parse fails falls back
/// to string comparison.
pub fn compare_keys(a: &str, b: &str, data_type: DataType) -> Ordering {
    let typed = match data_type {
        DataType::Number => compare_as_number(a, b),
        DataType::Date => compare_as_date(a, b),
        DataType::Boolean => compare_as_bool(a, b),
        DataType::String => None,
        DataType::Auto => compare_as_number(a, b)
            .or_else(|| compare_as_date(a, b))
            .or_else(|| compare_as_bool(a, b)),
    };
    typed.unwrap_or_else(|| compare_as_string(a, b))
}

/// Picks the single comparison type for a column of keys.
///
/// `Auto` resolves to the first of number, date and boolean that every key
/// parses as, else string. Explicit types are kept as given.
pub fn column_type<'a, I>(keys: I, requested: DataType) -> DataType
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    if requested != DataType::Auto {
        return requested;
    }
    if keys.clone().into_iter().all(|k| parse_number(k).is_some()) {
        DataType::Number
    } else if keys.clone().into_iter().all(|k| parse_date(k).is_some()) {
        DataType::Date
    } else if keys.into_iter().all(|k| parse_bool(k).is_some()) {
        DataType::Boolean
    } else {
        DataType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_numerically() {
        assert_eq!(compare_keys("9", "10", DataType::Auto), Ordering::Less);
        assert_eq!(compare_keys("120", "120.0", DataType::Auto), Ordering::Equal);
        assert_eq!(compare_keys("-5", "3", DataType::Number), Ordering::Less);
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            compare_keys("2024-05-01", "2024-04-30T23:00:00Z", DataType::Auto),
            Ordering::Greater
        );
    }

    #[test]
    fn test_string_fallback_is_case_insensitive() {
        assert_eq!(compare_keys("aden", "Sanaa", DataType::Auto), Ordering::Less);
        assert_eq!(compare_keys("10", "9", DataType::String), Ordering::Less);
        assert_eq!(compare_keys("abc", "10", DataType::Number), Ordering::Greater);
    }

    #[test]
    fn test_column_type_needs_every_key() {
        assert_eq!(column_type(["9", "10", "120.5"], DataType::Auto), DataType::Number);
        assert_eq!(column_type(["9", "10", "5a"], DataType::Auto), DataType::String);
        assert_eq!(
            column_type(["2024-05-01", "2024-04-30T23:00:00Z"], DataType::Auto),
            DataType::Date
        );
        assert_eq!(column_type(["true", "FALSE"], DataType::Auto), DataType::Boolean);
        assert_eq!(column_type(["9", "x"], DataType::Number), DataType::Number);
    }
}
