//! Parser for `test="..."` and `<bind value="...">` expressions.
//!
//! Grammar, loosest binding first: `or` / `||`, `and` / `&&`, `!` / `not`,
//! comparisons (`== != >= <= > <`), then primaries: literals (`null`,
//! booleans, numbers, quoted strings), property paths, and parenthesized
//! sub-expressions.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{char, digit1, satisfy},
    combinator::{map, not, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

use super::ast::{CompareOp, TestExpr, TestLiteral};
use super::common::ws;
use super::errors::TemplateError;

/// Parse a complete expression; trailing input is an error.
pub fn parse_test_expression(input: &str) -> Result<TestExpr, TemplateError> {
    match ws(parse_or_expression).parse(input) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(TemplateError::BadExpression {
            expression: input.to_string(),
            detail: format!("unexpected trailing input '{}'", rest.trim()),
        }),
        Err(e) => Err(TemplateError::BadExpression {
            expression: input.to_string(),
            detail: e.to_string(),
        }),
    }
}

/// A keyword that must not run into a following identifier character
/// (`or` must not match the head of `orders`).
fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(
        tag_no_case(kw),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn parse_or_expression(input: &str) -> IResult<&str, TestExpr> {
    let (input, first) = parse_and_expression(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("||"), keyword("or")))),
        parse_and_expression,
    ))
    .parse(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, e| TestExpr::Or(Box::new(acc), Box::new(e))),
    ))
}

fn parse_and_expression(input: &str) -> IResult<&str, TestExpr> {
    let (input, first) = parse_not_expression(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("&&"), keyword("and")))),
        parse_not_expression,
    ))
    .parse(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, e| TestExpr::And(Box::new(acc), Box::new(e))),
    ))
}

fn parse_not_expression(input: &str) -> IResult<&str, TestExpr> {
    alt((
        // `!x` but not `!=` (that is a comparison on the level below)
        map(
            preceded(terminated(char('!'), not(char('='))), ws(parse_not_expression)),
            |e| TestExpr::Not(Box::new(e)),
        ),
        map(preceded(keyword("not"), ws(parse_not_expression)), |e| {
            TestExpr::Not(Box::new(e))
        }),
        parse_comparison,
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> IResult<&str, TestExpr> {
    let (input, lhs) = parse_primary(input)?;
    let (input, tail) = opt(pair(ws(parse_compare_op), parse_primary)).parse(input)?;
    match tail {
        Some((op, rhs)) => Ok((
            input,
            TestExpr::Comparison {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )),
        None => Ok((input, lhs)),
    }
}

fn parse_compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        map(tag("=="), |_| CompareOp::Eq),
        map(tag("!="), |_| CompareOp::Ne),
        map(tag(">="), |_| CompareOp::Ge),
        map(tag("<="), |_| CompareOp::Le),
        map(tag(">"), |_| CompareOp::Gt),
        map(tag("<"), |_| CompareOp::Lt),
    ))
    .parse(input)
}

fn parse_primary(input: &str) -> IResult<&str, TestExpr> {
    ws(alt((
        map(keyword("null"), |_| TestExpr::Literal(TestLiteral::Null)),
        map(keyword("true"), |_| {
            TestExpr::Literal(TestLiteral::Bool(true))
        }),
        map(keyword("false"), |_| {
            TestExpr::Literal(TestLiteral::Bool(false))
        }),
        parse_number,
        parse_string_literal,
        parse_property,
        delimited(char('('), parse_or_expression, ws(char(')'))),
    )))
    .parse(input)
}

fn parse_number(input: &str) -> IResult<&str, TestExpr> {
    let (rest, text) = recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    let literal = if text.contains('.') {
        text.parse::<f64>()
            .map(TestLiteral::Float)
            .map_err(|_| nom_failure(input))?
    } else {
        text.parse::<i64>()
            .map(TestLiteral::Int)
            .map_err(|_| nom_failure(input))?
    };
    Ok((rest, TestExpr::Literal(literal)))
}

fn parse_string_literal(input: &str) -> IResult<&str, TestExpr> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| TestExpr::Literal(TestLiteral::Str(s.to_string())),
    )
    .parse(input)
}

/// A property path token: identifier characters plus `.`, `[`, `]`.
fn parse_property(input: &str) -> IResult<&str, TestExpr> {
    let (rest, path) = recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']')),
    ))
    .parse(input)?;
    Ok((rest, TestExpr::Property(path.to_string())))
}

fn nom_failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}
