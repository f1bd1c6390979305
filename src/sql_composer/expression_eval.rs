//! Test-expression evaluation against the dynamic context.

use super::context::DynamicContext;
use super::errors::ComposeError;
use crate::param_object::ParamValue;
use crate::template_parser::{CompareOp, TestExpr, TestLiteral};

/// Evaluate an expression to a value. Property paths resolve through the
/// context (binding frames first, then the parameter object).
pub fn eval_expr(expr: &TestExpr, ctx: &DynamicContext<'_>) -> Result<ParamValue, ComposeError> {
    match expr {
        TestExpr::Literal(literal) => Ok(literal_value(literal)),
        TestExpr::Property(path) => ctx.resolve(path),
        TestExpr::Comparison { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, ctx)?;
            let rhs = eval_expr(rhs, ctx)?;
            Ok(ParamValue::Bool(compare(*op, &lhs, &rhs)))
        }
        TestExpr::And(lhs, rhs) => {
            if !eval_truth(lhs, ctx)? {
                return Ok(ParamValue::Bool(false));
            }
            Ok(ParamValue::Bool(eval_truth(rhs, ctx)?))
        }
        TestExpr::Or(lhs, rhs) => {
            if eval_truth(lhs, ctx)? {
                return Ok(ParamValue::Bool(true));
            }
            Ok(ParamValue::Bool(eval_truth(rhs, ctx)?))
        }
        TestExpr::Not(inner) => Ok(ParamValue::Bool(!eval_truth(inner, ctx)?)),
    }
}

/// Evaluate an expression as a boolean condition.
pub fn eval_truth(expr: &TestExpr, ctx: &DynamicContext<'_>) -> Result<bool, ComposeError> {
    Ok(truthy(&eval_expr(expr, ctx)?))
}

/// Truthiness: null is false, booleans are themselves, numbers are non-zero,
/// strings and containers are non-empty.
pub fn truthy(value: &ParamValue) -> bool {
    match value {
        ParamValue::Null => false,
        ParamValue::Bool(b) => *b,
        ParamValue::Int(i) => *i != 0,
        ParamValue::Float(f) => *f != 0.0,
        ParamValue::String(s) => !s.is_empty(),
        ParamValue::List(items) => !items.is_empty(),
        ParamValue::Map(entries) => !entries.is_empty(),
        ParamValue::Record(_) => true,
    }
}

fn literal_value(literal: &TestLiteral) -> ParamValue {
    match literal {
        TestLiteral::Null => ParamValue::Null,
        TestLiteral::Bool(b) => ParamValue::Bool(*b),
        TestLiteral::Int(i) => ParamValue::Int(*i),
        TestLiteral::Float(f) => ParamValue::Float(*f),
        TestLiteral::Str(s) => ParamValue::String(s.clone()),
    }
}

/// Comparison with Int/Float coercion. Incomparable shapes compare as not
/// equal / not ordered rather than erroring, so conditions stay usable
/// against optional fields.
fn compare(op: CompareOp, lhs: &ParamValue, rhs: &ParamValue) -> bool {
    match op {
        CompareOp::Eq => values_equal(lhs, rhs),
        CompareOp::Ne => !values_equal(lhs, rhs),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            match partial_order(lhs, rhs) {
                Some(ordering) => match op {
                    CompareOp::Gt => ordering.is_gt(),
                    CompareOp::Ge => ordering.is_ge(),
                    CompareOp::Lt => ordering.is_lt(),
                    CompareOp::Le => ordering.is_le(),
                    CompareOp::Eq | CompareOp::Ne => unreachable!("handled above"),
                },
                None => false,
            }
        }
    }
}

fn values_equal(lhs: &ParamValue, rhs: &ParamValue) -> bool {
    match (lhs, rhs) {
        (ParamValue::Int(a), ParamValue::Float(b)) | (ParamValue::Float(b), ParamValue::Int(a)) => {
            (*a as f64) == *b
        }
        _ => lhs == rhs,
    }
}

fn partial_order(lhs: &ParamValue, rhs: &ParamValue) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (ParamValue::Int(a), ParamValue::Int(b)) => Some(a.cmp(b)),
        (ParamValue::Float(a), ParamValue::Float(b)) => a.partial_cmp(b),
        (ParamValue::Int(a), ParamValue::Float(b)) => (*a as f64).partial_cmp(b),
        (ParamValue::Float(a), ParamValue::Int(b)) => a.partial_cmp(&(*b as f64)),
        (ParamValue::String(a), ParamValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
