use thiserror::Error;

use crate::param_object::AccessError;

/// Failures while evaluating a template against a parameter object.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ComposeError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("collection expression '{path}' resolved to a non-iterable {shape} value")]
    NotIterable { path: String, shape: &'static str },

    #[error("loop over '{path}' would unroll {len} elements (configured limit {limit})")]
    UnrollLimit {
        path: String,
        len: usize,
        limit: usize,
    },

    #[error("unresolved <include refid=\"{refid}\"/> reached composition")]
    UnresolvedInclude { refid: String },
}
