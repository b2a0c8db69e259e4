//! Date and date-time decoders.
//!
//! Backed by chrono format strings. A decoder configured with a
//! date-only pattern yields `Date` values, a full pattern yields
//! `DateTime`.

use chrono::{NaiveDate, NaiveDateTime};

use super::{DecodeError, DecodedValue, TypeDecoder};

/// Format-driven temporal decoder.
pub struct DateDecoder {
    format: String,
    /// Pattern carries a time component.
    with_time: bool,
}

impl DateDecoder {
    /// Decoder for date-only values, e.g. `%Y-%m-%d`.
    pub fn date(format: impl Into<String>) -> Self {
        DateDecoder {
            format: format.into(),
            with_time: false,
        }
    }

    /// Decoder for date-time values, e.g. `%Y-%m-%d %H:%M:%S`.
    pub fn date_time(format: impl Into<String>) -> Self {
        DateDecoder {
            format: format.into(),
            with_time: true,
        }
    }
}

impl TypeDecoder for DateDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        let trimmed = value.trim();
        if self.with_time {
            NaiveDateTime::parse_from_str(trimmed, &self.format)
                .map(DecodedValue::DateTime)
                .map_err(|e| DecodeError::new(value, "DateTime", e.to_string()))
        } else {
            NaiveDate::parse_from_str(trimmed, &self.format)
                .map(DecodedValue::Date)
                .map_err(|e| DecodeError::new(value, "Date", e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_decoding() {
        let decoder = DateDecoder::date("%Y-%m-%d");
        let expected = NaiveDate::from_ymd_opt(2006, 11, 15).unwrap();
        assert_eq!(
            decoder.decode("2006-11-15").unwrap(),
            DecodedValue::Date(expected)
        );
    }

    #[test]
    fn test_date_time_decoding() {
        let decoder = DateDecoder::date_time("%d/%m/%Y %H:%M");
        match decoder.decode("15/11/2006 09:30").unwrap() {
            DecodedValue::DateTime(dt) => {
                assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2006-11-15 09:30");
            }
            other => panic!("expected date-time, got {other:?}"),
        }
    }

    #[test]
    fn test_format_mismatch_fails() {
        let decoder = DateDecoder::date("%Y-%m-%d");
        assert!(decoder.decode("15.11.2006").is_err());
    }
}
