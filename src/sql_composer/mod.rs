//! Template node evaluation.
//!
//! Each node contributes to an accumulating SQL buffer and binding
//! environment through the [`DynamicContext`]. Control flow is top-down,
//! text assembly bottom-up: nested nodes are evaluated before their parent
//! finalizes its own contribution.

use std::collections::BTreeMap;

use log::debug;

use crate::config::EngineConfig;
use crate::param_object::ParamValue;
use crate::statement_compiler::token_parser::TokenParser;
use crate::template_parser::{LoopNode, TemplateNode, TrimNode};

pub mod context;
pub mod errors;
pub mod expression_eval;

pub use context::DynamicContext;
pub use errors::ComposeError;
use expression_eval::{eval_expr, eval_truth};

/// The composed raw SQL of one evaluation pass, before `#{}` compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedSql {
    pub sql: String,
    pub side_bindings: BTreeMap<String, ParamValue>,
}

/// Evaluate a template tree against a parameter object.
pub fn compose(
    root: &TemplateNode,
    param: &ParamValue,
    config: &EngineConfig,
) -> Result<ComposedSql, ComposeError> {
    let mut ctx = DynamicContext::new(param, config);
    apply(root, &mut ctx)?;
    let sql = ctx.sql();
    debug!("composed sql: {}", sql);
    Ok(ComposedSql {
        sql,
        side_bindings: ctx.into_side_bindings(),
    })
}

/// Apply one node. The return value signals whether the node contributed:
/// a false condition (or a choice with no matching branch, a loop over an
/// empty collection, a trim whose body vanished) returns `false` so the
/// caller knows the branch produced nothing.
pub fn apply(node: &TemplateNode, ctx: &mut DynamicContext<'_>) -> Result<bool, ComposeError> {
    match node {
        TemplateNode::StaticText(text) => {
            ctx.append_sql(text);
            Ok(true)
        }
        TemplateNode::DynamicText(text) => {
            let substituted = substitute_placeholders(text, ctx)?;
            ctx.append_sql(&substituted);
            Ok(true)
        }
        TemplateNode::Conditional { test, child } => {
            if eval_truth(test, ctx)? {
                apply(child, ctx)?;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        TemplateNode::Choice {
            branches,
            default_branch,
        } => {
            for branch in branches {
                if eval_truth(&branch.test, ctx)? {
                    apply(&branch.child, ctx)?;
                    return Ok(true);
                }
            }
            if let Some(default) = default_branch {
                apply(default, ctx)?;
                return Ok(true);
            }
            Ok(false)
        }
        TemplateNode::Loop(loop_node) => apply_loop(loop_node, ctx),
        TemplateNode::Trim(trim_node) => apply_trim(trim_node, ctx),
        TemplateNode::Bind { name, value } => {
            let bound = eval_expr(value, ctx)?;
            ctx.bind(name.clone(), bound.clone());
            // Also published at the root so `#{...}` compilation can read it.
            ctx.bind_root(name.clone(), bound);
            Ok(true)
        }
        TemplateNode::IncludeRef { refid } => Err(ComposeError::UnresolvedInclude {
            refid: refid.clone(),
        }),
        TemplateNode::Composite(children) => {
            for child in children {
                apply(child, ctx)?;
            }
            Ok(true)
        }
    }
}

/// `${...}` text substitution: resolved at composition time against the
/// current bindings, spliced into the SQL as raw text.
fn substitute_placeholders(
    text: &str,
    ctx: &DynamicContext<'_>,
) -> Result<String, ComposeError> {
    TokenParser::new("${", "}").parse(text, &mut |expression| {
        Ok(ctx.resolve(expression.trim())?.substitution_text())
    })
}

fn apply_loop(node: &LoopNode, ctx: &mut DynamicContext<'_>) -> Result<bool, ComposeError> {
    let collection = ctx.resolve(&node.collection)?;
    let entries: Vec<(ParamValue, ParamValue)> = match &collection {
        ParamValue::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (ParamValue::from(i), v.clone()))
            .collect(),
        // Map iteration yields entry values, with the index variable bound
        // to the key.
        ParamValue::Map(entries) => entries
            .iter()
            .map(|(k, v)| (ParamValue::from(k.as_str()), v.clone()))
            .collect(),
        ParamValue::Null => Vec::new(),
        other => {
            return Err(ComposeError::NotIterable {
                path: node.collection.clone(),
                shape: other.shape(),
            })
        }
    };

    let limit = ctx.config().max_loop_unroll;
    if entries.len() > limit {
        return Err(ComposeError::UnrollLimit {
            path: node.collection.clone(),
            len: entries.len(),
            limit,
        });
    }

    let mut parts: Vec<String> = Vec::new();
    for (key, value) in entries {
        // One unique number per iteration keeps generated bind names from
        // colliding across nested or repeated loops over the same item name.
        let n = ctx.unique_number();
        let item_binding = node.item.as_ref().map(|item| itemized(item, n));
        let index_binding = node.index.as_ref().map(|index| itemized(index, n));

        if let Some(name) = &item_binding {
            ctx.bind_root(name.clone(), value.clone());
        }
        if let Some(name) = &index_binding {
            ctx.bind_root(name.clone(), key.clone());
        }

        ctx.push_frame();
        if let Some(item) = &node.item {
            ctx.bind(item.clone(), value.clone());
        }
        if let Some(index) = &node.index {
            ctx.bind(index.clone(), key.clone());
        }
        let result = ctx.capture(|ctx| apply(&node.child, ctx));
        ctx.pop_frame();

        let (_, captured) = result?;
        if captured.is_empty() {
            continue;
        }
        parts.push(rewrite_item_placeholders(
            &captured,
            node.item.as_deref().zip(item_binding.as_deref()),
            node.index.as_deref().zip(index_binding.as_deref()),
        ));
    }

    if parts.is_empty() {
        return Ok(false);
    }

    let mut out = String::new();
    if let Some(open) = &node.open {
        out.push_str(open);
    }
    out.push_str(&parts.join(node.separator.as_deref().unwrap_or("")));
    if let Some(close) = &node.close {
        out.push_str(close);
    }
    ctx.append_sql(&out);
    Ok(true)
}

fn itemized(name: &str, n: u32) -> String {
    format!("__frch_{}_{}", name, n)
}

/// Rewrite `#{item...}`/`#{index...}` heads in one iteration's contribution
/// to their unique-suffixed side-binding names. Escaped tokens keep their
/// backslash: this text is scanned again at compile time.
fn rewrite_item_placeholders(
    text: &str,
    item: Option<(&str, &str)>,
    index: Option<(&str, &str)>,
) -> String {
    let parser = TokenParser::preserving_escapes("#{", "}");
    let rewritten = parser.parse::<std::convert::Infallible>(text, &mut |content| {
        let head_len = content
            .find(['.', '[', ':'])
            .unwrap_or(content.len());
        let (head, tail) = content.split_at(head_len);
        let head = head.trim();
        for (name, binding) in [item, index].into_iter().flatten() {
            if head == name {
                return Ok(format!("#{{{}{}}}", binding, tail));
            }
        }
        Ok(format!("#{{{}}}", content))
    });
    match rewritten {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

fn apply_trim(node: &TrimNode, ctx: &mut DynamicContext<'_>) -> Result<bool, ComposeError> {
    let (_, captured) = ctx.capture(|ctx| apply(&node.child, ctx))?;
    let mut body = captured.trim().to_string();
    if body.is_empty() {
        return Ok(false);
    }

    for over in &node.prefix_overrides {
        if starts_with_ignore_case(&body, over) {
            body = body[over.len()..].trim_start().to_string();
            break;
        }
    }
    for over in &node.suffix_overrides {
        if ends_with_ignore_case(&body, over) {
            body = body[..body.len() - over.len()].trim_end().to_string();
            break;
        }
    }

    if body.is_empty() {
        return Ok(false);
    }

    let mut out = String::new();
    if let Some(prefix) = &node.prefix {
        out.push_str(prefix);
        out.push(' ');
    }
    out.push_str(&body);
    if let Some(suffix) = &node.suffix {
        out.push(' ');
        out.push_str(suffix);
    }
    ctx.append_sql(&out);
    Ok(true)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len() && text[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
