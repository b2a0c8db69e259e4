//! Locale-aware numeric decoders.
//!
//! Numbers arrive formatted for a locale: `1.234,56` in much of Europe,
//! `1,234.56` elsewhere. A [`NumberFormat`] names the separators; the
//! decoders normalize to the plain form before parsing.

use super::{DecodeError, DecodedValue, TypeDecoder};

/// Decimal and grouping separators for one locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub group_separator: Option<char>,
}

impl NumberFormat {
    /// `1,234.56`
    pub const fn en() -> Self {
        NumberFormat {
            decimal_separator: '.',
            group_separator: Some(','),
        }
    }

    /// `1.234,56`
    pub const fn de() -> Self {
        NumberFormat {
            decimal_separator: ',',
            group_separator: Some('.'),
        }
    }

    /// Strip grouping and normalize the decimal separator to `.`.
    fn normalize(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.trim().chars() {
            if Some(c) == self.group_separator {
                continue;
            }
            if c == self.decimal_separator {
                out.push('.');
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::en()
    }
}

/// Integer decoder.
pub struct IntegerDecoder {
    format: NumberFormat,
}

impl IntegerDecoder {
    pub fn new() -> Self {
        IntegerDecoder {
            format: NumberFormat::default(),
        }
    }

    pub fn with_format(format: NumberFormat) -> Self {
        IntegerDecoder { format }
    }
}

impl Default for IntegerDecoder {
    fn default() -> Self {
        IntegerDecoder::new()
    }
}

impl TypeDecoder for IntegerDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        let normalized = self.format.normalize(value);
        normalized
            .parse::<i64>()
            .map(DecodedValue::Integer)
            .map_err(|e| DecodeError::new(value, "Integer", e.to_string()))
    }
}

/// Floating-point decoder.
pub struct FloatDecoder {
    format: NumberFormat,
}

impl FloatDecoder {
    pub fn new() -> Self {
        FloatDecoder {
            format: NumberFormat::default(),
        }
    }

    pub fn with_format(format: NumberFormat) -> Self {
        FloatDecoder { format }
    }
}

impl Default for FloatDecoder {
    fn default() -> Self {
        FloatDecoder::new()
    }
}

impl TypeDecoder for FloatDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        let normalized = self.format.normalize(value);
        normalized
            .parse::<f64>()
            .map(DecodedValue::Float)
            .map_err(|e| DecodeError::new(value, "Float", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_integer() {
        let decoder = IntegerDecoder::new();
        assert_eq!(decoder.decode(" 42 ").unwrap(), DecodedValue::Integer(42));
        assert!(decoder.decode("4.2").is_err());
    }

    #[test]
    fn test_grouped_integer() {
        let decoder = IntegerDecoder::with_format(NumberFormat::en());
        assert_eq!(
            decoder.decode("1,234,567").unwrap(),
            DecodedValue::Integer(1_234_567)
        );
    }

    #[test]
    fn test_locale_float() {
        let decoder = FloatDecoder::with_format(NumberFormat::de());
        assert_eq!(
            decoder.decode("1.234,56").unwrap(),
            DecodedValue::Float(1234.56)
        );
    }

    #[test]
    fn test_float_rejects_garbage() {
        assert!(FloatDecoder::new().decode("abc").is_err());
    }
}
