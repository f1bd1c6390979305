use thiserror::Error;

/// Structural template defects, detected at parse/build time.
///
/// A template that fails here is never usable; the defect must be fixed in
/// the statement definition itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("template syntax error near '{snippet}': {context}")]
    Syntax { context: String, snippet: String },

    #[error("<{element}> requires attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("unknown attribute '{attribute}' on <{element}>")]
    UnknownAttribute { element: String, attribute: String },

    #[error("<choose> allows at most one <otherwise> branch")]
    DuplicateDefaultBranch,

    #[error("<{element}> is only valid directly inside <choose>")]
    MisplacedElement { element: String },

    #[error("unexpected content directly inside <{element}>")]
    UnexpectedContent { element: String },

    #[error("element <{element}> is never closed")]
    UnclosedElement { element: String },

    #[error("closing tag </{found}> does not match open element <{expected}>")]
    MismatchedCloseTag { expected: String, found: String },

    #[error("invalid expression '{expression}': {detail}")]
    BadExpression { expression: String, detail: String },
}
