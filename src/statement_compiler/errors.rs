use thiserror::Error;

use crate::param_object::AccessError;
use crate::type_registry::ConvertError;

/// Failures while compiling composed SQL into a bound statement or binding
/// its parameter values.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A `#{...}` expression matches neither a side-binding nor any property
    /// of the parameter object.
    #[error("parameter '#{{{expression}}}' in statement '{statement_id}' could not be resolved to any value source")]
    Binding {
        statement_id: String,
        expression: String,
    },

    #[error("malformed parameter token '#{{{content}}}': {detail}")]
    BadPlaceholder { content: String, detail: String },

    #[error("unknown attribute key '{key}' in parameter token '#{{{content}}}'")]
    UnknownAttributeKey { content: String, key: String },

    #[error("unknown jdbcType '{0}'")]
    UnknownJdbcType(String),

    #[error("unknown parameter mode '{0}' (expected IN, OUT or INOUT)")]
    UnknownMode(String),

    #[error("no converter for parameter '{expression}' (type tag '{type_tag}') in statement '{statement_id}'")]
    NoConverter {
        statement_id: String,
        expression: String,
        type_tag: String,
    },

    #[error("conversion failed for parameter '{expression}': {source}")]
    Convert {
        expression: String,
        source: ConvertError,
    },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("interceptor failure: {0}")]
    Interceptor(String),
}
