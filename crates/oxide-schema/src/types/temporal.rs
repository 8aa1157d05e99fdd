//! Date and time codecs backed by `chrono`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::{
    mismatch, BindArg, HasPersistentType, PersistentType, SqlType, SqlValue, StorageClass,
    ValueRef,
};
use crate::error::TypeError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// `DateTime<Utc>` stored as RFC 3339 TEXT with as many fractional digits
/// as needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTimeType;

fn parse_datetime(text: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidValue(format!("'{text}' is not an RFC 3339 timestamp: {e}")))
}

impl SqlType for DateTimeType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Text
    }
}

impl PersistentType for DateTimeType {
    type Value = DateTime<Utc>;

    fn to_bind_arg(&self, value: &DateTime<Utc>) -> BindArg {
        BindArg::Text(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<DateTime<Utc>, TypeError> {
        match value {
            ValueRef::Text(s) => parse_datetime(s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<DateTime<Utc>, TypeError> {
        match value {
            SqlValue::Text(s) => parse_datetime(&s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }
}

/// `NaiveDate` stored as `YYYY-MM-DD` TEXT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateType;

fn parse_date(text: &str) -> Result<NaiveDate, TypeError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| TypeError::InvalidValue(format!("'{text}' is not a date: {e}")))
}

impl SqlType for DateType {
    fn storage_class(&self) -> StorageClass {
        StorageClass::Text
    }
}

impl PersistentType for DateType {
    type Value = NaiveDate;

    fn to_bind_arg(&self, value: &NaiveDate) -> BindArg {
        BindArg::Text(value.format(DATE_FORMAT).to_string())
    }

    fn from_column(&self, value: ValueRef<'_>) -> Result<NaiveDate, TypeError> {
        match value {
            ValueRef::Text(s) => parse_date(s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }

    fn from_sql_value(&self, value: SqlValue) -> Result<NaiveDate, TypeError> {
        match value {
            SqlValue::Text(s) => parse_date(&s),
            other => Err(mismatch(StorageClass::Text, other.storage_class())),
        }
    }
}

impl HasPersistentType for DateTime<Utc> {
    type Codec = DateTimeType;
}

impl HasPersistentType for NaiveDate {
    type Codec = DateType;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_text_form() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(
            DateTimeType.to_bind_arg(&ts),
            BindArg::Text(String::from("2024-03-09T14:05:00Z"))
        );
        assert_eq!(DateTimeType.literal(&ts), "'2024-03-09T14:05:00Z'");
        assert_eq!(
            DateTimeType.from_column(ValueRef::Text("2024-03-09T14:05:00Z")),
            Ok(ts)
        );
    }

    #[test]
    fn test_date_text_form() {
        let day = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(
            DateType.to_bind_arg(&day),
            BindArg::Text(String::from("1999-12-31"))
        );
        assert_eq!(DateType.from_column(ValueRef::Text("1999-12-31")), Ok(day));
        assert!(matches!(
            DateType.from_column(ValueRef::Text("yesterday")),
            Err(TypeError::InvalidValue(_))
        ));
        assert!(DateType.from_column(ValueRef::Integer(19_991_231)).is_err());
    }
}
