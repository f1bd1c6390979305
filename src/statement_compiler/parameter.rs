//! Parameter descriptors extracted from `#{...}` tokens.
//!
//! Token syntax: a property expression optionally followed by
//! colon-separated attributes - `key=value` pairs for `type`, `jdbcType` and
//! `mode`, with a lone bare attribute shorthand meaning `jdbcType`:
//! `#{id}`, `#{id:BIGINT}`, `#{name:type=string:mode=IN}`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::errors::CompileError;
use crate::type_registry::Converter;

/// Declared parameter direction. OUT descriptors are skipped when writing
/// parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

impl FromStr for ParamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(ParamMode::In),
            "OUT" => Ok(ParamMode::Out),
            "INOUT" => Ok(ParamMode::InOut),
            other => Err(other.to_string()),
        }
    }
}

/// Database type tags accepted in placeholder attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JdbcType {
    Varchar,
    Char,
    Integer,
    Bigint,
    Smallint,
    Double,
    Float,
    Decimal,
    Boolean,
    Date,
    Time,
    Timestamp,
    Null,
    Other,
}

impl FromStr for JdbcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VARCHAR" => Ok(JdbcType::Varchar),
            "CHAR" => Ok(JdbcType::Char),
            "INTEGER" => Ok(JdbcType::Integer),
            "BIGINT" => Ok(JdbcType::Bigint),
            "SMALLINT" => Ok(JdbcType::Smallint),
            "DOUBLE" => Ok(JdbcType::Double),
            "FLOAT" => Ok(JdbcType::Float),
            "DECIMAL" => Ok(JdbcType::Decimal),
            "BOOLEAN" => Ok(JdbcType::Boolean),
            "DATE" => Ok(JdbcType::Date),
            "TIME" => Ok(JdbcType::Time),
            "TIMESTAMP" => Ok(JdbcType::Timestamp),
            "NULL" => Ok(JdbcType::Null),
            "OTHER" => Ok(JdbcType::Other),
            other => Err(other.to_string()),
        }
    }
}

/// One positional parameter of a compiled statement, in marker order.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub property: String,
    pub mode: ParamMode,
    pub type_tag: Option<String>,
    pub jdbc_type: Option<JdbcType>,
    /// Resolved eagerly when a type tag is declared; otherwise inferred from
    /// the runtime value at bind time.
    pub converter: Option<Arc<dyn Converter>>,
}

impl ParameterDescriptor {
    pub fn new(property: impl Into<String>) -> Self {
        ParameterDescriptor {
            property: property.into(),
            mode: ParamMode::In,
            type_tag: None,
            jdbc_type: None,
            converter: None,
        }
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("property", &self.property)
            .field("mode", &self.mode)
            .field("type_tag", &self.type_tag)
            .field("jdbc_type", &self.jdbc_type)
            .field("converter", &self.converter.as_ref().map(|c| c.type_tag()))
            .finish()
    }
}

impl PartialEq for ParameterDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.property == other.property
            && self.mode == other.mode
            && self.type_tag == other.type_tag
            && self.jdbc_type == other.jdbc_type
    }
}

/// Parse the body of one `#{...}` token into a descriptor.
pub fn parse_placeholder(content: &str) -> Result<ParameterDescriptor, CompileError> {
    let mut parts = content.split(':');
    let property = parts.next().unwrap_or_default().trim();
    if property.is_empty() {
        return Err(CompileError::BadPlaceholder {
            content: content.to_string(),
            detail: "empty property expression".to_string(),
        });
    }

    let mut descriptor = ParameterDescriptor::new(property);
    for attr in parts {
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(CompileError::BadPlaceholder {
                content: content.to_string(),
                detail: "empty attribute".to_string(),
            });
        }
        match attr.split_once('=') {
            Some((key, value)) => match key.trim() {
                "type" => descriptor.type_tag = Some(value.trim().to_string()),
                "jdbcType" => {
                    descriptor.jdbc_type = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(CompileError::UnknownJdbcType)?,
                    )
                }
                "mode" => {
                    descriptor.mode = value.trim().parse().map_err(CompileError::UnknownMode)?
                }
                other => {
                    return Err(CompileError::UnknownAttributeKey {
                        content: content.to_string(),
                        key: other.to_string(),
                    })
                }
            },
            // Bare attribute shorthand: a jdbcType name.
            None => {
                descriptor.jdbc_type = Some(attr.parse().map_err(CompileError::UnknownJdbcType)?)
            }
        }
    }
    Ok(descriptor)
}
