//! Type conversion registry.
//!
//! The pluggable lookup the compiler and parameter binder call to turn
//! runtime values into execution-ready SQL arguments. The default set covers
//! scalars plus chrono date/time mappings; anything richer is registered by
//! the caller. Exhaustive driver-level conversion tables are explicitly not
//! this crate's business.

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::param_object::ParamValue;
use crate::statement_compiler::parameter::JdbcType;

/// Opaque wire value handed to the external execution boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArgument {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl fmt::Display for SqlArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlArgument::Null => write!(f, "NULL"),
            SqlArgument::Bool(b) => write!(f, "{}", b),
            SqlArgument::Int(i) => write!(f, "{}", i),
            SqlArgument::Float(v) => write!(f, "{}", v),
            SqlArgument::Text(s) => write!(f, "{:?}", s),
            SqlArgument::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            SqlArgument::Date(d) => write!(f, "{}", d),
        }
    }
}

impl From<&SqlArgument> for ParamValue {
    fn from(arg: &SqlArgument) -> Self {
        match arg {
            SqlArgument::Null => ParamValue::Null,
            SqlArgument::Bool(b) => ParamValue::Bool(*b),
            SqlArgument::Int(i) => ParamValue::Int(*i),
            SqlArgument::Float(v) => ParamValue::Float(*v),
            SqlArgument::Text(s) => ParamValue::String(s.clone()),
            SqlArgument::Timestamp(ts) => ParamValue::String(ts.to_rfc3339()),
            SqlArgument::Date(d) => ParamValue::String(d.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConvertError {
    #[error("cannot convert {shape} value to {target}")]
    Incompatible {
        shape: &'static str,
        target: &'static str,
    },

    #[error("invalid {target} text '{text}': {detail}")]
    InvalidText {
        target: &'static str,
        text: String,
        detail: String,
    },
}

/// One value conversion strategy, registered under a type tag.
pub trait Converter: Send + Sync {
    fn type_tag(&self) -> &'static str;
    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError>;
}

struct NullConverter;
struct BoolConverter;
struct IntConverter;
struct FloatConverter;
struct StringConverter;
struct DateTimeConverter;
struct DateConverter;

impl Converter for NullConverter {
    fn type_tag(&self) -> &'static str {
        "null"
    }

    fn to_argument(&self, _value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        Ok(SqlArgument::Null)
    }
}

impl Converter for BoolConverter {
    fn type_tag(&self) -> &'static str {
        "bool"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::Bool(b) => Ok(SqlArgument::Bool(*b)),
            other => Err(incompatible(other, "bool")),
        }
    }
}

impl Converter for IntConverter {
    fn type_tag(&self) -> &'static str {
        "int"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::Int(i) => Ok(SqlArgument::Int(*i)),
            other => Err(incompatible(other, "int")),
        }
    }
}

impl Converter for FloatConverter {
    fn type_tag(&self) -> &'static str {
        "float"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::Float(v) => Ok(SqlArgument::Float(*v)),
            // Integers widen losslessly enough for binding purposes.
            ParamValue::Int(i) => Ok(SqlArgument::Float(*i as f64)),
            other => Err(incompatible(other, "float")),
        }
    }
}

impl Converter for StringConverter {
    fn type_tag(&self) -> &'static str {
        "string"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::String(s) => Ok(SqlArgument::Text(s.clone())),
            ParamValue::Bool(b) => Ok(SqlArgument::Text(b.to_string())),
            ParamValue::Int(i) => Ok(SqlArgument::Text(i.to_string())),
            ParamValue::Float(v) => Ok(SqlArgument::Text(v.to_string())),
            other => Err(incompatible(other, "string")),
        }
    }
}

impl Converter for DateTimeConverter {
    fn type_tag(&self) -> &'static str {
        "datetime"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| SqlArgument::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| ConvertError::InvalidText {
                    target: "datetime",
                    text: s.clone(),
                    detail: e.to_string(),
                }),
            // Unix epoch seconds.
            ParamValue::Int(secs) => DateTime::from_timestamp(*secs, 0)
                .map(SqlArgument::Timestamp)
                .ok_or_else(|| ConvertError::InvalidText {
                    target: "datetime",
                    text: secs.to_string(),
                    detail: "out of range timestamp".to_string(),
                }),
            other => Err(incompatible(other, "datetime")),
        }
    }
}

impl Converter for DateConverter {
    fn type_tag(&self) -> &'static str {
        "date"
    }

    fn to_argument(&self, value: &ParamValue) -> Result<SqlArgument, ConvertError> {
        match value {
            ParamValue::Null => Ok(SqlArgument::Null),
            ParamValue::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(SqlArgument::Date)
                .map_err(|e| ConvertError::InvalidText {
                    target: "date",
                    text: s.clone(),
                    detail: e.to_string(),
                }),
            other => Err(incompatible(other, "date")),
        }
    }
}

fn incompatible(value: &ParamValue, target: &'static str) -> ConvertError {
    ConvertError::Incompatible {
        shape: value.shape(),
        target,
    }
}

lazy_static! {
    static ref DEFAULT_CONVERTERS: Vec<Arc<dyn Converter>> = vec![
        Arc::new(NullConverter),
        Arc::new(BoolConverter),
        Arc::new(IntConverter),
        Arc::new(FloatConverter),
        Arc::new(StringConverter),
        Arc::new(DateTimeConverter),
        Arc::new(DateConverter),
    ];
}

/// Converter lookup by type tag, with database-type overrides.
pub struct ConverterRegistry {
    by_tag: HashMap<&'static str, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        ConverterRegistry {
            by_tag: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for converter in DEFAULT_CONVERTERS.iter() {
            registry.register(converter.clone());
        }
        registry
    }

    /// Register (or replace) the converter for its tag.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        self.by_tag.insert(converter.type_tag(), converter);
    }

    pub fn has(&self, type_tag: &str) -> bool {
        self.by_tag.contains_key(type_tag)
    }

    /// Look up by declared type tag, with the database type refining the
    /// choice: a string declared TIMESTAMP/DATE binds through the matching
    /// temporal converter instead of plain text.
    pub fn lookup(
        &self,
        type_tag: &str,
        jdbc_type: Option<JdbcType>,
    ) -> Option<Arc<dyn Converter>> {
        let effective = match (type_tag, jdbc_type) {
            ("string", Some(JdbcType::Timestamp)) => "datetime",
            ("string", Some(JdbcType::Date)) => "date",
            (tag, _) => tag,
        };
        self.by_tag.get(effective).cloned()
    }

    /// Infer the converter from a runtime value's own shape.
    pub fn for_value(
        &self,
        value: &ParamValue,
        jdbc_type: Option<JdbcType>,
    ) -> Option<Arc<dyn Converter>> {
        let tag = match value {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::String(_) => "string",
            // Lists, maps and records have no single-argument binding.
            _ => return None,
        };
        self.lookup(tag, jdbc_type)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
