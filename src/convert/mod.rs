//! Type converter registry.
//!
//! Locale-aware, format-aware scalar decoders used by data-binding
//! visitors to turn element text into typed values. Independent of the
//! dispatch engine; registries are built once alongside the delivery
//! configuration and shared read-only across runs.

pub mod date;
pub mod number;

pub use date::DateDecoder;
pub use number::{FloatDecoder, IntegerDecoder, NumberFormat};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::error::FilterError;

/// A decoded scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Decoding failure for one value.
#[derive(Error, Debug)]
#[error("failed to decode '{value}' as {target}: {message}")]
pub struct DecodeError {
    pub value: String,
    pub target: &'static str,
    pub message: String,
}

impl DecodeError {
    pub fn new(value: &str, target: &'static str, message: impl Into<String>) -> Self {
        DecodeError {
            value: value.to_string(),
            target,
            message: message.into(),
        }
    }
}

/// A scalar decoder.
pub trait TypeDecoder: Send + Sync {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError>;
}

/// Registry of named decoders.
///
/// Registration is build-time configuration: a second decoder under an
/// already-taken name is a configuration error, never a silent override.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn TypeDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        DecoderRegistry::default()
    }

    /// A registry with the stock decoders under their conventional names.
    pub fn with_defaults() -> Self {
        let mut registry = DecoderRegistry::new();
        // Stock names cannot conflict in a fresh registry.
        let defaults: [(&str, Arc<dyn TypeDecoder>); 4] = [
            ("String", Arc::new(StringDecoder)),
            ("Boolean", Arc::new(BooleanDecoder)),
            ("Integer", Arc::new(IntegerDecoder::new())),
            ("Float", Arc::new(FloatDecoder::new())),
        ];
        for (name, decoder) in defaults {
            registry
                .register(name, decoder)
                .expect("fresh registry has no conflicts");
        }
        registry
    }

    /// Register a decoder under a type name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        decoder: Arc<dyn TypeDecoder>,
    ) -> Result<(), FilterError> {
        let name = name.into();
        if self.decoders.contains_key(&name) {
            return Err(FilterError::DecoderConflict(name));
        }
        self.decoders.insert(name, decoder);
        Ok(())
    }

    /// Look up a decoder by name.
    pub fn decoder(&self, name: &str) -> Option<&Arc<dyn TypeDecoder>> {
        self.decoders.get(name)
    }

    /// Decode a value with the named decoder.
    pub fn decode(&self, name: &str, value: &str) -> Result<DecodedValue, DecodeError> {
        match self.decoder(name) {
            Some(decoder) => decoder.decode(value),
            None => Err(DecodeError::new(value, "unknown", format!("no decoder named '{name}'"))),
        }
    }
}

/// Identity decoder.
pub struct StringDecoder;

impl TypeDecoder for StringDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        Ok(DecodedValue::String(value.to_string()))
    }
}

/// Boolean decoder accepting the common spellings.
pub struct BooleanDecoder;

impl TypeDecoder for BooleanDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(DecodedValue::Boolean(true)),
            "false" | "no" | "n" | "0" => Ok(DecodedValue::Boolean(false)),
            _ => Err(DecodeError::new(value, "Boolean", "not a recognized boolean")),
        }
    }
}

/// Decoder over a closed set of allowed values.
pub struct EnumDecoder {
    variants: Vec<String>,
}

impl EnumDecoder {
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnumDecoder {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

impl TypeDecoder for EnumDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        let trimmed = value.trim();
        if self.variants.iter().any(|v| v == trimmed) {
            Ok(DecodedValue::String(trimmed.to_string()))
        } else {
            Err(DecodeError::new(
                value,
                "Enum",
                format!("expected one of {:?}", self.variants),
            ))
        }
    }
}

/// Value-substitution decoder.
pub struct MappingDecoder {
    map: HashMap<String, String>,
    /// Pass unmapped values through instead of failing.
    strict: bool,
}

impl MappingDecoder {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MappingDecoder {
            map: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            strict: true,
        }
    }

    /// Unmapped values decode to themselves.
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }
}

impl TypeDecoder for MappingDecoder {
    fn decode(&self, value: &str) -> Result<DecodedValue, DecodeError> {
        match self.map.get(value.trim()) {
            Some(mapped) => Ok(DecodedValue::String(mapped.clone())),
            None if !self.strict => Ok(DecodedValue::String(value.to_string())),
            None => Err(DecodeError::new(value, "Mapping", "no mapping entry")),
        }
    }
}
