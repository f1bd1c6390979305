//! Cross-reference resolution and the pending-statement worklist.
//!
//! Registering a statement whose `<include refid>` names a fragment that has
//! not arrived yet is an expected, retryable condition - not a hard error.
//! The statement is queued and retried as more fragments register; it only
//! escalates to fatal when a full pass over the worklist makes no progress.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::SqlCommandType;
use crate::statement_compiler::SourceError;
use crate::template_parser::{ChoiceBranch, LoopNode, TemplateNode, TrimNode};

/// Outcome of building one statement from its parsed template.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Retryable: the referenced fragment is not registered yet.
    #[error("fragment '{refid}' is not registered yet")]
    NotReady { refid: String },

    #[error("circular include chain through fragment '{refid}'")]
    CircularInclude { refid: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ResolveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::NotReady { .. })
    }
}

/// A statement registration waiting for a fragment to arrive.
pub struct PendingStatement {
    pub id: String,
    pub command_type: SqlCommandType,
    pub root: Arc<TemplateNode>,
}

/// Replace every `<include refid>` node with the referenced fragment's tree,
/// recursively; fragments may include other fragments. A missing fragment is
/// retryable; a cycle is fatal.
pub fn resolve_includes(
    node: &TemplateNode,
    fragments: &HashMap<String, Arc<TemplateNode>>,
) -> Result<TemplateNode, ResolveError> {
    let mut visiting = Vec::new();
    resolve_node(node, fragments, &mut visiting)
}

fn resolve_node(
    node: &TemplateNode,
    fragments: &HashMap<String, Arc<TemplateNode>>,
    visiting: &mut Vec<String>,
) -> Result<TemplateNode, ResolveError> {
    match node {
        TemplateNode::IncludeRef { refid } => {
            if visiting.iter().any(|seen| seen == refid) {
                return Err(ResolveError::CircularInclude {
                    refid: refid.clone(),
                });
            }
            let fragment = fragments
                .get(refid)
                .ok_or_else(|| ResolveError::NotReady {
                    refid: refid.clone(),
                })?;
            visiting.push(refid.clone());
            let resolved = resolve_node(fragment, fragments, visiting)?;
            visiting.pop();
            Ok(resolved)
        }
        TemplateNode::StaticText(_) | TemplateNode::DynamicText(_) | TemplateNode::Bind { .. } => {
            Ok(node.clone())
        }
        TemplateNode::Conditional { test, child } => Ok(TemplateNode::Conditional {
            test: test.clone(),
            child: Box::new(resolve_node(child, fragments, visiting)?),
        }),
        TemplateNode::Choice {
            branches,
            default_branch,
        } => {
            let mut resolved_branches = Vec::with_capacity(branches.len());
            for branch in branches {
                resolved_branches.push(ChoiceBranch {
                    test: branch.test.clone(),
                    child: resolve_node(&branch.child, fragments, visiting)?,
                });
            }
            let resolved_default = match default_branch {
                Some(default) => Some(Box::new(resolve_node(default, fragments, visiting)?)),
                None => None,
            };
            Ok(TemplateNode::Choice {
                branches: resolved_branches,
                default_branch: resolved_default,
            })
        }
        TemplateNode::Loop(loop_node) => Ok(TemplateNode::Loop(LoopNode {
            child: Box::new(resolve_node(&loop_node.child, fragments, visiting)?),
            ..loop_node.clone()
        })),
        TemplateNode::Trim(trim_node) => Ok(TemplateNode::Trim(TrimNode {
            child: Box::new(resolve_node(&trim_node.child, fragments, visiting)?),
            ..trim_node.clone()
        })),
        TemplateNode::Composite(children) => {
            let mut resolved = Vec::with_capacity(children.len());
            for child in children {
                resolved.push(resolve_node(child, fragments, visiting)?);
            }
            Ok(TemplateNode::Composite(resolved))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template_parser::parse_template;

    fn fragment_map(entries: Vec<(&str, &str)>) -> HashMap<String, Arc<TemplateNode>> {
        entries
            .into_iter()
            .map(|(id, text)| (id.to_string(), Arc::new(parse_template(text).unwrap())))
            .collect()
    }

    #[test]
    fn include_splices_the_fragment_tree() {
        let fragments = fragment_map(vec![("cols", "id, name")]);
        let root = parse_template(r#"SELECT <include refid="cols"/> FROM t"#).unwrap();
        let resolved = resolve_includes(&root, &fragments).unwrap();
        assert!(!resolved.has_unresolved_includes());
    }

    #[test]
    fn missing_fragment_is_retryable() {
        let fragments = fragment_map(vec![]);
        let root = parse_template(r#"SELECT <include refid="cols"/> FROM t"#).unwrap();
        match resolve_includes(&root, &fragments) {
            Err(err) => {
                assert!(err.is_retryable());
                assert!(matches!(err, ResolveError::NotReady { refid } if refid == "cols"));
            }
            Ok(_) => panic!("expected NotReady"),
        }
    }

    #[test]
    fn fragments_can_include_fragments() {
        let fragments = fragment_map(vec![
            ("cols", r#"id, <include refid="extra"/>"#),
            ("extra", "name"),
        ]);
        let root = parse_template(r#"SELECT <include refid="cols"/> FROM t"#).unwrap();
        let resolved = resolve_includes(&root, &fragments).unwrap();
        assert!(!resolved.has_unresolved_includes());
    }

    #[test]
    fn include_cycles_are_fatal_not_retryable() {
        let fragments = fragment_map(vec![
            ("a", r#"<include refid="b"/>"#),
            ("b", r#"<include refid="a"/>"#),
        ]);
        let root = parse_template(r#"<include refid="a"/>"#).unwrap();
        match resolve_includes(&root, &fragments) {
            Err(err) => {
                assert!(!err.is_retryable());
                assert!(matches!(err, ResolveError::CircularInclude { .. }));
            }
            Ok(_) => panic!("expected cycle error"),
        }
    }
}
