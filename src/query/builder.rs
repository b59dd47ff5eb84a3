//! Translates request parameters into a [Predicate] and the request's control values.
//!
//! Every endpoint that accepts field filters goes through [build_filter], so the rules for
//! turning `?key=value` pairs into clauses live in one place.

use crate::{
    pagination::{PageWindow, PaginationConfig},
    query::predicate::{Condition, FieldPath, Predicate, Scalar},
    transaction::{DATE_FIELD, STATUS_FIELD, VALIDATED_STATUSES},
};

/// Fields that are compared as numbers when the request value parses as one.
const NUMERIC_FIELDS: [&str; 4] = [
    "currency_amount",
    "store_amount",
    "discount_percentage",
    "o2o",
];

/// The field that is compared as a boolean when the request value is `true` or `false`.
const BOOLEAN_FIELD: &str = "Approval";

/// A request parameter value.
///
/// Query strings only ever produce [ParamValue::Text]; the typed variants are exact-match
/// values supplied by callers that already know the type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A raw string value.
    Text(String),
    /// A number.
    Number(f64),
    /// A boolean.
    Bool(bool),
}

impl ParamValue {
    fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

/// The direction to sort records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort in order of increasing value.
    Ascending,
    /// Sort in order of decreasing value.
    Descending,
}

/// The field and direction to sort a listing by.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    /// The field to sort by.
    pub field: FieldPath,
    /// The sort direction.
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: FieldPath::new(DATE_FIELD),
            order: SortOrder::Descending,
        }
    }
}

/// The result of parsing a request's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    /// The field clauses, without any date clauses.
    pub predicate: Predicate,
    /// The page of results to return.
    pub page: PageWindow,
    /// How to sort listed records.
    pub sort: SortSpec,
    /// The raw `startDate` value, resolved separately.
    pub start_date: Option<String>,
    /// The raw `endDate` value, resolved separately.
    pub end_date: Option<String>,
}

/// Collapse repeated keys so that the last value wins, keeping first-seen key order.
pub fn collapse_params(pairs: Vec<(String, String)>) -> Vec<(String, ParamValue)> {
    let mut params: Vec<(String, ParamValue)> = Vec::with_capacity(pairs.len());

    for (key, value) in pairs {
        match params.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, existing_value)) => *existing_value = ParamValue::Text(value),
            None => params.push((key, ParamValue::Text(value))),
        }
    }

    params
}

/// Build the filter for a request from its parameters.
///
/// Keys are handled by the first matching rule:
/// 1. `page`, `limit`, `startDate`, `endDate`, `sort` and `sortOrder` are control values.
/// 2. `isValidated=true|false` filters on membership of the validated statuses.
/// 3. Numeric fields with a numeric value are compared as numbers.
/// 4. `Approval=true|false` is compared as a boolean.
/// 5. Dotted keys are exact matches on a nested field.
/// 6. Other text values are case-insensitive substring matches.
/// 7. Other typed values are exact matches.
///
/// Values that fail to coerce fall through to the next rule; this function never fails.
pub fn build_filter(params: &[(String, ParamValue)], config: &PaginationConfig) -> FilterQuery {
    let mut predicate = Predicate::new();
    let mut raw_page = None;
    let mut raw_limit = None;
    let mut start_date = None;
    let mut end_date = None;
    let mut sort = SortSpec::default();

    for (key, value) in params {
        match key.as_str() {
            "" => {}
            "page" => raw_page = control_text(value),
            "limit" => raw_limit = control_text(value),
            "startDate" => start_date = control_text(value).filter(|date| !date.is_empty()),
            "endDate" => end_date = control_text(value).filter(|date| !date.is_empty()),
            "sort" => {
                if let Some(field) = value.as_text().filter(|field| !field.trim().is_empty()) {
                    sort.field = FieldPath::new(field.trim());
                }
            }
            "sortOrder" => {
                if let Some(order) = value.as_text().and_then(parse_sort_order) {
                    sort.order = order;
                }
            }
            "isValidated" => {
                if let Some(condition) = validated_condition(value) {
                    predicate.push(FieldPath::new(STATUS_FIELD), condition);
                }
            }
            _ => predicate.push(FieldPath::new(key), field_condition(key, value)),
        }
    }

    FilterQuery {
        predicate,
        page: PageWindow::from_raw(raw_page.as_deref(), raw_limit.as_deref(), config),
        sort,
        start_date,
        end_date,
    }
}

fn control_text(value: &ParamValue) -> Option<String> {
    match value {
        ParamValue::Text(text) => Some(text.trim().to_owned()),
        ParamValue::Number(number) => Some(number.to_string()),
        ParamValue::Bool(_) => None,
    }
}

fn parse_sort_order(raw: &str) -> Option<SortOrder> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asc" | "ascending" | "1" => Some(SortOrder::Ascending),
        "desc" | "descending" | "-1" => Some(SortOrder::Descending),
        _ => None,
    }
}

fn validated_condition(value: &ParamValue) -> Option<Condition> {
    let is_validated = match value {
        ParamValue::Text(text) if text == "true" => true,
        ParamValue::Text(text) if text == "false" => false,
        ParamValue::Bool(flag) => *flag,
        _ => return None,
    };

    let statuses = VALIDATED_STATUSES.map(str::to_owned).to_vec();

    Some(if is_validated {
        Condition::InSet(statuses)
    } else {
        Condition::NotInSet(statuses)
    })
}

fn field_condition(key: &str, value: &ParamValue) -> Condition {
    if NUMERIC_FIELDS.contains(&key) {
        let number = match value {
            ParamValue::Text(text) => text.trim().parse::<f64>().ok(),
            ParamValue::Number(number) => Some(*number),
            ParamValue::Bool(_) => None,
        };

        if let Some(number) = number.filter(|number| number.is_finite()) {
            return Condition::NumericEquals(number);
        }
    }

    if key == BOOLEAN_FIELD {
        match value {
            ParamValue::Text(text) if text == "true" => return Condition::BooleanEquals(true),
            ParamValue::Text(text) if text == "false" => return Condition::BooleanEquals(false),
            ParamValue::Bool(flag) => return Condition::BooleanEquals(*flag),
            _ => {}
        }
    }

    match value {
        ParamValue::Text(text) if key.contains('.') => {
            Condition::Equals(Scalar::Text(text.to_owned()))
        }
        ParamValue::Text(text) => Condition::RegexContains(text.to_owned()),
        ParamValue::Number(number) => Condition::Equals(Scalar::Number(*number)),
        ParamValue::Bool(flag) => Condition::Equals(Scalar::Bool(*flag)),
    }
}
