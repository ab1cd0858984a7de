//! API handlers and shared input validation.

pub mod admin;
pub mod auth;
pub mod health;
pub mod me;

use regex::Regex;
use tracing::{info_span, Span};

/// Span wrapped around a single SQL statement.
pub(crate) fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Calendar date in `YYYY-MM-DD` form, including month-length and leap-year checks.
pub fn valid_date(value: &str) -> bool {
    let Ok(re) = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$") else {
        return false;
    };
    let Some(captures) = re.captures(value) else {
        return false;
    };
    let parse = |index: usize| {
        captures
            .get(index)
            .and_then(|part| part.as_str().parse::<u32>().ok())
    };
    let (Some(year), Some(month), Some(day)) = (parse(1), parse(2), parse(3)) else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_month = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    year > 0 && (1..=days_in_month).contains(&day)
}

/// Trim an optional text input, mapping blank values to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
