//! Turns request parameters into predicates, date filters and bucket plans.

pub mod builder;
pub mod date_range;
pub mod predicate;

pub use builder::{ParamValue, SortOrder, SortSpec, build_filter, collapse_params};
pub use date_range::{BucketPlan, BucketSize, DateFilter, DateInfo, DateRange};
pub use predicate::{Clause, Condition, FieldPath, Predicate, Scalar};

use crate::{Error, pagination::PageWindow};

use date_range::resolve_date_filter;

/// A fully resolved request: field and date clauses combined.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    /// The field clauses followed by the date clauses.
    pub predicate: Predicate,
    /// The requested date restriction.
    pub date_filter: DateFilter,
    /// The page of results to return.
    pub page: PageWindow,
    /// How to sort listed records.
    pub sort: SortSpec,
}

impl ResolvedQuery {
    /// The bucket plan of the requested date range, if the request named one.
    pub fn requested_plan(&self) -> Option<BucketPlan> {
        self.date_filter.range().map(BucketPlan::for_range)
    }
}

/// Build the filter for `params` and resolve its date parameters.
///
/// # Errors
/// Returns an error if the date parameters are malformed or out of order.
pub fn resolve_query(
    params: &[(String, ParamValue)],
    config: &crate::PaginationConfig,
) -> Result<ResolvedQuery, Error> {
    let filter = build_filter(params, config);
    let date_filter = resolve_date_filter(filter.start_date.as_deref(), filter.end_date.as_deref())?;

    let mut predicate = filter.predicate;
    date_filter.apply(&mut predicate);

    Ok(ResolvedQuery {
        predicate,
        date_filter,
        page: filter.page,
        sort: filter.sort,
    })
}

/// Parse a raw query string into request parameters, last value winning for repeated keys.
///
/// # Errors
/// Returns [Error::InvalidField] if the query string is not valid URL encoding.
pub fn params_from_query(raw_query: Option<&str>) -> Result<Vec<(String, ParamValue)>, Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw_query.unwrap_or_default())
        .map_err(|error| Error::InvalidField(format!("malformed query string: {error}")))?;

    Ok(collapse_params(pairs))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error, PaginationConfig,
        query::{Condition, DateFilter, DateRange, ParamValue},
    };

    use super::{params_from_query, resolve_query};

    #[test]
    fn query_string_is_decoded_and_collapsed() {
        let params = params_from_query(Some("Name=Rahim%20Uddin&gw=a&gw=b")).unwrap();

        assert_eq!(
            params,
            vec![
                ("Name".to_owned(), ParamValue::from("Rahim Uddin")),
                ("gw".to_owned(), ParamValue::from("b")),
            ]
        );
        assert!(params_from_query(None).unwrap().is_empty());
    }

    #[test]
    fn resolved_query_appends_date_clauses() {
        let params = params_from_query(Some(
            "status=VALID&startDate=2024-01-01&endDate=2024-01-03",
        ))
        .unwrap();

        let resolved = resolve_query(&params, &PaginationConfig::default()).unwrap();

        let conditions: Vec<_> = resolved
            .predicate
            .clauses()
            .iter()
            .map(|clause| clause.condition.clone())
            .collect();
        assert_eq!(
            conditions,
            vec![
                Condition::RegexContains("VALID".to_owned()),
                Condition::RangeGte("2024-01-01".to_owned()),
                Condition::RangeLte("2024-01-03 23:59:59.999".to_owned()),
            ]
        );
        assert_eq!(
            resolved.date_filter,
            DateFilter::Range(DateRange {
                start: date!(2024 - 01 - 01),
                end: date!(2024 - 01 - 03),
            })
        );
        assert_eq!(resolved.requested_plan().unwrap().keys().len(), 3);
    }

    #[test]
    fn bad_dates_fail_resolution() {
        let params = params_from_query(Some("startDate=2024-02-01&endDate=2024-01-01")).unwrap();

        assert!(matches!(
            resolve_query(&params, &PaginationConfig::default()),
            Err(Error::InvalidDateRange { .. })
        ));
    }
}
