//! Search request model
//!
//! Criterion operands are stored as stringified keys, the same form the
//! field indices use, so a criterion can be evaluated against bucket keys
//! and against documents without conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::index::{DataType, FieldValue, IndexError, IndexResult};

/// Comparison operator of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    ExactMatch,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    InRange,
    InList,
    NotInList,
    IsNull,
    IsNotNull,
    RegularExpression,
    FuzzySearch,
}

impl Operator {
    /// Short form used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::ExactMatch => "eq",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts",
            Operator::EndsWith => "ends",
            Operator::GreaterThan => "gt",
            Operator::GreaterThanOrEqual => "gte",
            Operator::LessThan => "lt",
            Operator::LessThanOrEqual => "lte",
            Operator::InRange => "range",
            Operator::InList => "in",
            Operator::NotInList => "nin",
            Operator::IsNull => "null",
            Operator::IsNotNull => "notnull",
            Operator::RegularExpression => "regex",
            Operator::FuzzySearch => "fuzzy",
        }
    }

    /// Parse the short form
    pub fn parse(s: &str) -> Option<Self> {
        let op = match s.to_ascii_lowercase().as_str() {
            "eq" => Operator::ExactMatch,
            "contains" => Operator::Contains,
            "starts" => Operator::StartsWith,
            "ends" => Operator::EndsWith,
            "gt" => Operator::GreaterThan,
            "gte" => Operator::GreaterThanOrEqual,
            "lt" => Operator::LessThan,
            "lte" => Operator::LessThanOrEqual,
            "range" => Operator::InRange,
            "in" => Operator::InList,
            "nin" => Operator::NotInList,
            "null" => Operator::IsNull,
            "notnull" => Operator::IsNotNull,
            "regex" => Operator::RegularExpression,
            "fuzzy" => Operator::FuzzySearch,
            _ => return None,
        };
        Some(op)
    }

    fn needs_value(&self) -> bool {
        !matches!(
            self,
            Operator::InRange
                | Operator::InList
                | Operator::NotInList
                | Operator::IsNull
                | Operator::IsNotNull
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn key_of(value: impl Into<FieldValue>) -> String {
    value.into().to_key().unwrap_or_default()
}

/// One filter condition. Criteria in a request are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriterion {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub data_type: DataType,
}

impl SearchCriterion {
    pub fn new(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            values: Vec::new(),
            min: None,
            max: None,
            case_sensitive: false,
            data_type: DataType::Auto,
        }
    }

    fn with_value(field: impl Into<String>, operator: Operator, value: impl Into<FieldValue>) -> Self {
        let mut c = Self::new(field, operator);
        c.value = Some(key_of(value));
        c
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::ExactMatch, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::Contains, value)
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::StartsWith, value)
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::EndsWith, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::GreaterThan, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::GreaterThanOrEqual, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::LessThan, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::LessThanOrEqual, value)
    }

    pub fn regex(field: impl Into<String>, pattern: &str) -> Self {
        Self::with_value(field, Operator::RegularExpression, pattern)
    }

    pub fn fuzzy(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::with_value(field, Operator::FuzzySearch, value)
    }

    /// Inclusive range
    pub fn between(
        field: impl Into<String>,
        min: impl Into<FieldValue>,
        max: impl Into<FieldValue>,
    ) -> Self {
        let mut c = Self::new(field, Operator::InRange);
        c.min = Some(key_of(min));
        c.max = Some(key_of(max));
        c
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let mut c = Self::new(field, Operator::InList);
        c.values = values.into_iter().map(key_of).collect();
        c
    }

    pub fn not_in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        let mut c = Self::in_list(field, values);
        c.operator = Operator::NotInList;
        c
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull)
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// The single operand, or a validation error naming the criterion
    pub fn operand(&self) -> IndexResult<&str> {
        self.value.as_deref().ok_or_else(|| {
            IndexError::validation(format!(
                "criterion '{} {}' needs a value",
                self.field, self.operator
            ))
        })
    }

    /// Checks that the operands required by the operator are present
    pub fn validate(&self) -> IndexResult<()> {
        if self.field.trim().is_empty() {
            return Err(IndexError::validation("criterion field must not be blank"));
        }
        if self.operator.needs_value() {
            self.operand()?;
        }
        if self.operator == Operator::InRange && (self.min.is_none() || self.max.is_none()) {
            return Err(IndexError::validation(format!(
                "range criterion on '{}' needs min and max",
                self.field
            )));
        }
        Ok(())
    }
}

/// Parses `field:op[:value]`.
///
/// `range` takes `min..max`; `in` and `nin` take `a|b|c`.
impl FromStr for SearchCriterion {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let field = parts.next().unwrap_or_default().trim();
        let op_raw = parts.next().ok_or_else(|| {
            IndexError::validation(format!("expected field:op[:value], got '{}'", s))
        })?;
        let operator = Operator::parse(op_raw.trim())
            .ok_or_else(|| IndexError::validation(format!("unknown operator '{}'", op_raw)))?;
        let raw = parts.next();
        let missing = || IndexError::validation(format!("operator '{}' needs a value in '{}'", operator, s));

        let mut c = SearchCriterion::new(field, operator);
        match operator {
            Operator::IsNull | Operator::IsNotNull => {}
            _ if raw.is_none() => return Err(missing()),
            Operator::InRange => {
                let raw = raw.unwrap_or_default();
                let (min, max) = raw.split_once("..").ok_or_else(|| {
                    IndexError::validation(format!("range expects min..max, got '{}'", raw))
                })?;
                c.min = Some(min.to_string());
                c.max = Some(max.to_string());
            }
            Operator::InList | Operator::NotInList => {
                c.values = raw.unwrap_or_default().split('|').map(str::to_string).collect();
            }
            _ => c.value = raw.map(str::to_string),
        }
        c.validate()?;
        Ok(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key. Lower `priority` sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortCriterion {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub data_type: DataType,
}

impl SortCriterion {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
            priority: 0,
            data_type: DataType::Auto,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            direction: SortDirection::Desc,
            ..Self::asc(field)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// Parses `field[:asc|desc]`
impl FromStr for SortCriterion {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.rsplit_once(':') {
            Some((field, dir)) => match dir.to_ascii_lowercase().as_str() {
                "asc" => (field, SortDirection::Asc),
                "desc" => (field, SortDirection::Desc),
                other => {
                    return Err(IndexError::validation(format!(
                        "unknown sort direction '{}'",
                        other
                    )))
                }
            },
            None => (s, SortDirection::Asc),
        };
        if field.trim().is_empty() {
            return Err(IndexError::validation("sort field must not be blank"));
        }
        Ok(SortCriterion {
            direction,
            ..SortCriterion::asc(field.trim())
        })
    }
}

/// A complete query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub criteria: Vec<SearchCriterion>,
    #[serde(default)]
    pub sort: Vec<SortCriterion>,
    /// 1-based
    #[serde(default = "default_page_number")]
    pub page_number: usize,
    /// 0 returns every match
    #[serde(default)]
    pub page_size: usize,
    #[serde(default)]
    pub text_query: Option<String>,
}

fn default_page_number() -> usize {
    1
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            sort: Vec::new(),
            page_number: 1,
            page_size: 0,
            text_query: None,
        }
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, criterion: SearchCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn sort_by(mut self, sort: SortCriterion) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn page(mut self, page_number: usize, page_size: usize) -> Self {
        self.page_number = page_number;
        self.page_size = page_size;
        self
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.text_query = Some(query.into());
        self
    }

    /// Text query, if it holds anything besides whitespace
    pub fn text_query(&self) -> Option<&str> {
        self.text_query.as_deref().filter(|q| !q.trim().is_empty())
    }

    /// Sort criteria in priority order (stable for equal priorities)
    pub fn ordered_sort(&self) -> Vec<&SortCriterion> {
        let mut sort: Vec<&SortCriterion> = self.sort.iter().collect();
        sort.sort_by_key(|s| s.priority);
        sort
    }

    /// Zero-based offset of the first hit on the requested page
    pub fn offset(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.page_number.saturating_sub(1).saturating_mul(self.page_size)
        }
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.page_number == 0 {
            return Err(IndexError::validation("page numbers start at 1"));
        }
        for criterion in &self.criteria {
            criterion.validate()?;
        }
        Ok(())
    }
}
