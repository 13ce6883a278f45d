//! Parsing and formatting of Graph API date strings.
//!
//! The API emits several date shapes depending on the field; the long form
//! (`2024-03-01T12:30:00+0000`) is by far the most common and is the only
//! form written back out.

use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{GraphError, GraphResult};

const LONG: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);
const LONG_NO_TZ: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const LONG_NO_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");
const SHORT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const US_SHORT: &[BorrowedFormatItem<'static>] = format_description!("[month]/[day]/[year]");

/// Reads a date from a JSON string or an epoch-seconds number.
pub fn parse_value(value: &Value) -> GraphResult<OffsetDateTime> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| GraphError::mapping(format!("{n} is not a valid epoch timestamp")))
            .and_then(from_epoch),
        Value::String(s) => parse(s),
        other => Err(GraphError::mapping(format!("cannot convert {other} to a date"))),
    }
}

/// Parses any of the date forms the API is known to emit.
pub fn parse(text: &str) -> GraphResult<OffsetDateTime> {
    let text = text.trim();
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let secs = text
            .parse::<i64>()
            .map_err(|e| GraphError::mapping(format!("bad epoch timestamp {text:?}: {e}")))?;
        return from_epoch(secs);
    }
    if let Ok(dt) = OffsetDateTime::parse(text, LONG) {
        return Ok(dt);
    }
    for format in [LONG_NO_TZ, LONG_NO_SECONDS] {
        if let Ok(dt) = PrimitiveDateTime::parse(text, format) {
            return Ok(dt.assume_utc());
        }
    }
    for format in [SHORT, US_SHORT] {
        if let Ok(date) = Date::parse(text, format) {
            return Ok(date.midnight().assume_utc());
        }
    }
    if let Some(date) = parse_month_year(text) {
        return Ok(date.midnight().assume_utc());
    }
    Err(GraphError::mapping(format!("unrecognized date format: {text:?}")))
}

/// Formats `dt` in the long form, normalized to UTC.
pub fn format_long(dt: OffsetDateTime) -> GraphResult<String> {
    dt.to_offset(UtcOffset::UTC)
        .format(LONG)
        .map_err(|e| GraphError::mapping(format!("cannot format date: {e}")))
}

fn from_epoch(secs: i64) -> GraphResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| GraphError::mapping(format!("epoch {secs} out of range: {e}")))
}

/// `YYYY-MM`, mapped to the first of the month.
fn parse_month_year(text: &str) -> Option<Date> {
    let (year, month) = text.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, 1).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn parses_long_form_with_offset() {
        let dt = parse("2024-03-01T12:30:00+0000").unwrap();
        assert_eq!(dt, datetime!(2024-03-01 12:30:00 UTC));
        let dt = parse("2024-03-01T14:30:00+0200").unwrap();
        assert_eq!(dt, datetime!(2024-03-01 12:30:00 UTC));
    }

    #[test]
    fn parses_reduced_forms() {
        assert_eq!(parse("2024-03-01T12:30:15").unwrap(), datetime!(2024-03-01 12:30:15 UTC));
        assert_eq!(parse("2024-03-01T12:30").unwrap(), datetime!(2024-03-01 12:30:00 UTC));
        assert_eq!(parse("2024-03-01").unwrap(), datetime!(2024-03-01 0:00 UTC));
        assert_eq!(parse("03/01/2024").unwrap(), datetime!(2024-03-01 0:00 UTC));
        assert_eq!(parse("2024-03").unwrap(), datetime!(2024-03-01 0:00 UTC));
    }

    #[test]
    fn parses_epoch_numbers_and_strings() {
        assert_eq!(parse_value(&json!(0)).unwrap(), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(
            parse_value(&json!("1709296200")).unwrap(),
            datetime!(2024-03-01 12:30:00 UTC)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("yesterday").is_err());
        assert!(parse_value(&json!(true)).is_err());
    }

    #[test]
    fn formats_long_form_in_utc() {
        let dt = datetime!(2024-03-01 14:30:00 +02:00);
        assert_eq!(format_long(dt).unwrap(), "2024-03-01T12:30:00+0000");
    }
}
