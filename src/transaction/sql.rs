//! Renders predicates as SQLite `WHERE` clauses over the JSON documents.
//!
//! Field paths and values are always bound as parameters, never spliced into the SQL text.

use rusqlite::{
    Connection,
    functions::FunctionFlags,
    types::{Value as SqlValue, ValueRef},
};

use crate::query::{Clause, Condition, FieldPath, Predicate, Scalar};

/// The SQL function that lowercases text with Unicode case mapping.
const CASEFOLD_FUNCTION: &str = "casefold";

/// Register the SQL functions used by rendered predicates on `connection`.
///
/// # Errors
/// Returns an error if SQLite rejects the function.
pub(crate) fn register_functions(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            Ok(match context.get_raw(0) {
                ValueRef::Text(text) => Some(String::from_utf8_lossy(text).to_lowercase()),
                _ => None,
            })
        },
    )
}

/// A `WHERE` clause and the parameters it binds, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

impl SqlFilter {
    /// Append another condition with its parameters.
    pub fn and(mut self, clause: &str, params: impl IntoIterator<Item = SqlValue>) -> Self {
        self.clause = format!("({}) AND ({clause})", self.clause);
        self.params.extend(params);
        self
    }
}

/// The SQLite JSON path of a field, e.g. `$."Product"."Platform"`.
///
/// Returns `None` if a segment contains `"` or `\`, which quoted path labels cannot express.
pub(crate) fn json_path(field: &FieldPath) -> Option<String> {
    field
        .segments()
        .iter()
        .try_fold(String::from("$"), |mut path, segment| {
            if segment.contains(['"', '\\']) {
                return None;
            }

            path.push_str(&format!(".\"{segment}\""));
            Some(path)
        })
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for character in text.chars() {
        if matches!(character, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }

    escaped
}

/// Render `predicate` as a `WHERE` clause. The empty predicate renders as `1 = 1`.
pub(crate) fn render_predicate(predicate: &Predicate) -> SqlFilter {
    let mut clauses = Vec::with_capacity(predicate.clauses().len());
    let mut params = Vec::new();

    for clause in predicate.clauses() {
        clauses.push(render_clause(clause, &mut params));
    }

    let clause = if clauses.is_empty() {
        "1 = 1".to_owned()
    } else {
        clauses.join(" AND ")
    };

    SqlFilter { clause, params }
}

fn render_clause(clause: &Clause, params: &mut Vec<SqlValue>) -> String {
    let Some(path) = json_path(&clause.field) else {
        // A field that cannot be addressed is never present.
        return match clause.condition {
            Condition::NotInSet(_) => "1 = 1",
            _ => "0 = 1",
        }
        .to_owned();
    };
    let path = SqlValue::Text(path);
    let value = "json_extract(document, ?)";
    let json_type = "json_type(document, ?)";

    match &clause.condition {
        Condition::Equals(Scalar::Text(text)) => {
            params.extend([path, SqlValue::Text(text.clone())]);
            format!("{value} = ?")
        }
        Condition::Equals(Scalar::Number(number)) => {
            params.extend([path.clone(), path, SqlValue::Real(*number)]);
            format!("({json_type} IN ('integer', 'real') AND {value} = ?)")
        }
        Condition::NumericEquals(number) => {
            params.extend([
                path.clone(),
                path.clone(),
                SqlValue::Real(*number),
                path.clone(),
                path,
                SqlValue::Text(number.to_string()),
            ]);
            format!(
                "(({json_type} IN ('integer', 'real') AND {value} = ?) \
                OR ({json_type} = 'text' AND {value} = ?))"
            )
        }
        Condition::Equals(Scalar::Bool(flag)) | Condition::BooleanEquals(flag) => {
            params.extend([path, SqlValue::Text(flag.to_string())]);
            format!("{json_type} = ?")
        }
        Condition::InSet(members) if members.is_empty() => "0 = 1".to_owned(),
        Condition::InSet(members) => {
            params.push(path);
            params.extend(upper_members(members));
            format!("upper({value}) IN ({})", placeholders(members.len()))
        }
        Condition::NotInSet(members) if members.is_empty() => "1 = 1".to_owned(),
        Condition::NotInSet(members) => {
            params.extend([path.clone(), path]);
            params.extend(upper_members(members));
            format!(
                "({value} IS NULL OR upper({value}) NOT IN ({}))",
                placeholders(members.len())
            )
        }
        Condition::RangeGte(bound) => {
            params.extend([path, SqlValue::Text(bound.clone())]);
            format!("{value} >= ?")
        }
        Condition::RangeLte(bound) => {
            params.extend([path, SqlValue::Text(bound.clone())]);
            format!("{value} <= ?")
        }
        Condition::DayEquals(day) => {
            params.extend([path, SqlValue::Text(day.clone())]);
            format!("substr({value}, 1, 10) = ?")
        }
        Condition::RegexContains(text) => {
            params.extend([
                path.clone(),
                path,
                SqlValue::Text(format!("%{}%", escape_like(&text.to_lowercase()))),
            ]);
            format!("({json_type} = 'text' AND {CASEFOLD_FUNCTION}({value}) LIKE ? ESCAPE '\\')")
        }
    }
}

fn upper_members(members: &[String]) -> impl Iterator<Item = SqlValue> + '_ {
    members
        .iter()
        .map(|member| SqlValue::Text(member.to_ascii_uppercase()))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
