use chrono::{DateTime, NaiveDate, Utc};
use rocket::form::{self, prelude::ErrorKind, FromFormField, ValueField};

/// A datetime submitted through a multipart form field.
///
/// Accepts RFC 3339 timestamps as well as bare `YYYY-MM-DD` dates (taken as
/// midnight UTC), matching what the frontend's date pickers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiDateTime(pub DateTime<Utc>);

impl ApiDateTime {
    fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
            return Some(datetime.with_timezone(&Utc));
        }
        value
            .parse::<NaiveDate>()
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| DateTime::from_utc(naive, Utc))
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for ApiDateTime {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        ApiDateTime::parse(field.value)
            .map(ApiDateTime)
            .ok_or_else(|| ErrorKind::Validation("invalid datetime".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_bare_dates() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(ApiDateTime::parse("2025-06-01T00:00:00Z"), Some(expected));
        assert_eq!(ApiDateTime::parse("2025-06-01"), Some(expected));
        assert_eq!(ApiDateTime::parse("yesterday"), None);
    }
}
