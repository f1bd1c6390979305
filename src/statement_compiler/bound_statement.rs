//! The immutable result of compiling one statement execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::CompileError;
use super::parameter::{ParamMode, ParameterDescriptor};
use crate::param_object::{accessor, ParamValue};
use crate::property_path::PropertyPath;

/// Final SQL text, ordered parameter descriptors, the original parameter
/// object, and the side-bindings produced during composition (loop item
/// variables, `<bind>` values).
///
/// Built fresh for every execution attempt - even an identical template can
/// yield different text and parameter counts per call - and never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    statement_id: String,
    sql: String,
    descriptors: Vec<ParameterDescriptor>,
    parameter: Arc<ParamValue>,
    side_bindings: BTreeMap<String, ParamValue>,
}

impl BoundStatement {
    pub fn new(
        statement_id: impl Into<String>,
        sql: String,
        descriptors: Vec<ParameterDescriptor>,
        parameter: Arc<ParamValue>,
        side_bindings: BTreeMap<String, ParamValue>,
    ) -> Self {
        BoundStatement {
            statement_id: statement_id.into(),
            sql,
            descriptors,
            parameter,
            side_bindings,
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn parameter(&self) -> &ParamValue {
        &self.parameter
    }

    pub fn side_bindings(&self) -> &BTreeMap<String, ParamValue> {
        &self.side_bindings
    }

    /// Resolve a parameter expression: side-bindings first, then the
    /// parameter object. An expression with no value source at all is a
    /// binding error naming the expression and the statement.
    pub fn resolve_parameter(&self, expression: &str) -> Result<ParamValue, CompileError> {
        let head = PropertyPath::parse(expression);
        if let Some(bound) = self.side_bindings.get(head.name()) {
            return accessor::get_from_binding(bound, &head).map_err(CompileError::from);
        }

        let param = self.parameter.as_ref();
        match param {
            ParamValue::Map(_) | ParamValue::Record(_) => {
                if accessor::has_head_property(param, head.name()) {
                    accessor::get_path(param, expression).map_err(CompileError::from)
                } else {
                    Err(self.binding_error(expression))
                }
            }
            // Scalar or list parameter object: a single plain segment
            // addresses the object itself.
            other => {
                if !head.has_next() && head.index().is_none() {
                    Ok(other.clone())
                } else {
                    accessor::get_path(param, expression).map_err(CompileError::from)
                }
            }
        }
    }

    /// Check every IN/INOUT expression has some value source. Called once
    /// per execution, right after construction.
    pub fn verify_resolvable(&self) -> Result<(), CompileError> {
        for descriptor in &self.descriptors {
            if descriptor.mode == ParamMode::Out {
                continue;
            }
            self.resolve_parameter(&descriptor.property)?;
        }
        Ok(())
    }

    fn binding_error(&self, expression: &str) -> CompileError {
        CompileError::Binding {
            statement_id: self.statement_id.clone(),
            expression: expression.to_string(),
        }
    }
}
