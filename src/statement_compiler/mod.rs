//! Statement/parameter compiler.
//!
//! Post-processes composed raw SQL: every `#{...}` token (balanced against
//! `\#{` escapes) becomes a single positional `?` marker plus an ordered
//! [`ParameterDescriptor`]; whitespace runs collapse to single spaces unless
//! shrinking is disabled by configuration. The result is an immutable
//! [`BoundStatement`].

use log::debug;

use crate::config::EngineConfig;
use crate::type_registry::{ConverterRegistry, SqlArgument};

pub mod bound_statement;
pub mod errors;
pub mod parameter;
pub mod sql_source;
pub mod token_parser;

pub use bound_statement::BoundStatement;
pub use errors::CompileError;
pub use parameter::{parse_placeholder, JdbcType, ParamMode, ParameterDescriptor};
pub use sql_source::{SourceError, SqlSource};

use token_parser::TokenParser;

/// Extract `#{...}` tokens from composed SQL, producing the final
/// parameterized text plus descriptors in marker order.
pub fn compile(
    raw_sql: &str,
    statement_id: &str,
    registry: &ConverterRegistry,
    config: &EngineConfig,
) -> Result<(String, Vec<ParameterDescriptor>), CompileError> {
    let mut descriptors: Vec<ParameterDescriptor> = Vec::new();
    let parser = TokenParser::new("#{", "}");
    let sql = parser.parse(raw_sql, &mut |content| {
        let mut descriptor = parse_placeholder(content)?;
        // A declared type tag must resolve its converter here, before use.
        if let Some(tag) = descriptor.type_tag.clone() {
            descriptor.converter = registry.lookup(&tag, descriptor.jdbc_type);
            if descriptor.converter.is_none() {
                return Err(CompileError::NoConverter {
                    statement_id: statement_id.to_string(),
                    expression: descriptor.property.clone(),
                    type_tag: tag,
                });
            }
        }
        descriptors.push(descriptor);
        Ok("?".to_string())
    })?;

    let sql = if config.shrink_whitespace {
        shrink_whitespace(&sql)
    } else {
        sql.trim().to_string()
    };
    debug!(
        "compiled statement '{}': {} parameter(s)",
        statement_id,
        descriptors.len()
    );
    Ok((sql, descriptors))
}

/// Collapse every whitespace run to a single space.
fn shrink_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Resolve and convert every IN/INOUT parameter of a bound statement, in
/// descriptor order. OUT parameters are skipped.
pub fn bind_arguments(
    bound: &BoundStatement,
    registry: &ConverterRegistry,
) -> Result<Vec<SqlArgument>, CompileError> {
    let mut args = Vec::with_capacity(bound.descriptors().len());
    for descriptor in bound.descriptors() {
        if descriptor.mode == ParamMode::Out {
            continue;
        }
        let value = bound.resolve_parameter(&descriptor.property)?;
        let converter = match &descriptor.converter {
            Some(converter) => converter.clone(),
            None => registry
                .for_value(&value, descriptor.jdbc_type)
                .ok_or_else(|| CompileError::NoConverter {
                    statement_id: bound.statement_id().to_string(),
                    expression: descriptor.property.clone(),
                    type_tag: value.shape().to_string(),
                })?,
        };
        let argument =
            converter
                .to_argument(&value)
                .map_err(|source| CompileError::Convert {
                    expression: descriptor.property.clone(),
                    source,
                })?;
        args.push(argument);
    }
    Ok(args)
}
