//! Raw vs dynamic compilation strategies.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use super::bound_statement::BoundStatement;
use super::errors::CompileError;
use super::parameter::ParameterDescriptor;
use super::compile;
use crate::config::EngineConfig;
use crate::param_object::ParamValue;
use crate::sql_composer::{compose, ComposeError};
use crate::template_parser::TemplateNode;
use crate::type_registry::ConverterRegistry;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// How a template's SQL is obtained per execution.
///
/// `Raw`: the template has no dynamic nodes, so its text and descriptor list
/// cannot depend on runtime values - both are computed once when the source
/// is built and reused for every call. `Dynamic`: loops and conditions can
/// change both the SQL and the parameter count between calls, so every
/// execution re-composes and re-compiles.
pub enum SqlSource {
    Raw {
        sql: String,
        descriptors: Vec<ParameterDescriptor>,
    },
    Dynamic {
        root: Arc<TemplateNode>,
    },
}

impl SqlSource {
    pub fn build(
        root: Arc<TemplateNode>,
        statement_id: &str,
        registry: &ConverterRegistry,
        config: &EngineConfig,
    ) -> Result<Self, SourceError> {
        if root.is_dynamic() {
            return Ok(SqlSource::Dynamic { root });
        }
        // Static trees compose identically for any parameter object.
        let composed = compose(&root, &ParamValue::Null, config)?;
        let (sql, descriptors) = compile(&composed.sql, statement_id, registry, config)?;
        debug!("statement '{}' compiled on the raw path: {}", statement_id, sql);
        Ok(SqlSource::Raw { sql, descriptors })
    }

    /// Produce the bound statement for one execution. A fresh instance is
    /// built per call even on the raw path: the parameter object differs.
    pub fn bound(
        &self,
        statement_id: &str,
        parameter: ParamValue,
        registry: &ConverterRegistry,
        config: &EngineConfig,
    ) -> Result<BoundStatement, SourceError> {
        let bound = match self {
            SqlSource::Raw { sql, descriptors } => BoundStatement::new(
                statement_id,
                sql.clone(),
                descriptors.clone(),
                Arc::new(parameter),
                BTreeMap::new(),
            ),
            SqlSource::Dynamic { root } => {
                let composed = compose(root, &parameter, config)?;
                let (sql, descriptors) = compile(&composed.sql, statement_id, registry, config)?;
                BoundStatement::new(
                    statement_id,
                    sql,
                    descriptors,
                    Arc::new(parameter),
                    composed.side_bindings,
                )
            }
        };
        bound.verify_resolvable()?;
        Ok(bound)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, SqlSource::Raw { .. })
    }

    /// The precompiled SQL, when this source took the raw path.
    pub fn raw_sql(&self) -> Option<&str> {
        match self {
            SqlSource::Raw { sql, .. } => Some(sql),
            SqlSource::Dynamic { .. } => None,
        }
    }
}
