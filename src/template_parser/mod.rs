//! Statement template parser.
//!
//! Turns template text - literal SQL mixed with `<if>`, `<choose>`,
//! `<foreach>`, `<trim>`, `<where>`, `<set>`, `<bind>` and `<include>`
//! directives - into a [`TemplateNode`] tree. Parsing happens once per
//! template; composition against a parameter object happens fresh per
//! execution.
//!
//! A `<` only opens an element when it is followed by a registered tag name
//! (or a matching closing tag); anything else, e.g. `a < b` in literal SQL,
//! stays text.

use lazy_static::lazy_static;
use std::collections::HashMap;

use nom::Parser;

pub mod ast;
pub mod common;
pub mod errors;
pub mod test_expression;

pub use ast::{ChoiceBranch, CompareOp, LoopNode, TemplateNode, TestExpr, TestLiteral, TrimNode};
pub use errors::TemplateError;
pub use test_expression::parse_test_expression;

use common::{attribute, identifier, ws};

/// Raw parse product, before element semantics are applied.
#[derive(Debug, Clone)]
enum RawContent {
    Text(String),
    Element(RawElement),
}

#[derive(Debug, Clone)]
struct RawElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<RawContent>,
}

impl RawElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn require_attr(&self, name: &str) -> Result<String, TemplateError> {
        self.attr(name)
            .map(str::to_string)
            .ok_or_else(|| TemplateError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    fn check_attrs(&self, allowed: &[&str]) -> Result<(), TemplateError> {
        for (name, _) in &self.attributes {
            if !allowed.contains(&name.as_str()) {
                return Err(TemplateError::UnknownAttribute {
                    element: self.name.clone(),
                    attribute: name.clone(),
                });
            }
        }
        Ok(())
    }
}

type ElementBuilder = fn(RawElement) -> Result<TemplateNode, TemplateError>;

lazy_static! {
    /// Tag name -> node builder. Parsing consults this registry both to
    /// decide whether a `<` opens an element at all and to construct the
    /// node variant for it.
    static ref ELEMENT_BUILDERS: HashMap<&'static str, ElementBuilder> = {
        let mut m: HashMap<&'static str, ElementBuilder> = HashMap::new();
        m.insert("if", build_if);
        m.insert("choose", build_choose);
        m.insert("when", reject_misplaced);
        m.insert("otherwise", reject_misplaced);
        m.insert("foreach", build_foreach);
        m.insert("trim", build_trim);
        m.insert("where", build_where);
        m.insert("set", build_set);
        m.insert("bind", build_bind);
        m.insert("include", build_include);
        m
    };
}

/// Parse a full statement template into its node tree.
pub fn parse_template(text: &str) -> Result<TemplateNode, TemplateError> {
    let (rest, contents) = parse_contents(text)?;
    if let Some(found) = rest.strip_prefix("</") {
        let name = found
            .split(['>', ' ', '\t', '\n'])
            .next()
            .unwrap_or_default();
        return Err(TemplateError::MismatchedCloseTag {
            expected: "(no open element)".to_string(),
            found: name.to_string(),
        });
    }
    build_children(contents)
}

/// Gather text and elements until end of input or an (unconsumed) closing tag.
fn parse_contents(mut input: &str) -> Result<(&str, Vec<RawContent>), TemplateError> {
    let mut items = Vec::new();
    let mut text = String::new();

    loop {
        match input.find('<') {
            None => {
                text.push_str(input);
                input = "";
                break;
            }
            Some(pos) => {
                text.push_str(&input[..pos]);
                input = &input[pos..];
                if closing_tag_name(input).is_some() {
                    break;
                }
                match element_start(input) {
                    Some((after_name, name)) => {
                        flush_text(&mut text, &mut items);
                        let (rest, element) = parse_element_body(after_name, name)?;
                        items.push(RawContent::Element(element));
                        input = rest;
                    }
                    None => {
                        // Not a registered element: the `<` is literal SQL.
                        text.push('<');
                        input = &input[1..];
                    }
                }
            }
        }
    }

    flush_text(&mut text, &mut items);
    Ok((input, items))
}

fn flush_text(text: &mut String, items: &mut Vec<RawContent>) {
    if !text.is_empty() {
        items.push(RawContent::Text(std::mem::take(text)));
    }
}

/// If `input` starts a registered element (`<name` followed by whitespace,
/// `>` or `/`), return the remainder after the name plus the name itself.
fn element_start(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix('<')?;
    let (after_name, name) = identifier(rest).ok()?;
    if !ELEMENT_BUILDERS.contains_key(name) {
        return None;
    }
    match after_name.chars().next() {
        Some(c) if c.is_whitespace() || c == '>' || c == '/' => Some((after_name, name)),
        _ => None,
    }
}

/// If `input` starts with `</name>` for a registered name, return that name.
fn closing_tag_name(input: &str) -> Option<&str> {
    let rest = input.strip_prefix("</")?;
    let (after_name, name) = identifier(rest).ok()?;
    if !ELEMENT_BUILDERS.contains_key(name) {
        return None;
    }
    after_name.trim_start().starts_with('>').then_some(name)
}

/// Parse attributes + body of an element whose `<name` has been consumed.
fn parse_element_body<'a>(
    input: &'a str,
    name: &str,
) -> Result<(&'a str, RawElement), TemplateError> {
    let (input, attributes) = parse_attributes(input, name)?;

    if let Some(rest) = input.trim_start().strip_prefix("/>") {
        return Ok((
            rest,
            RawElement {
                name: name.to_string(),
                attributes,
                children: Vec::new(),
            },
        ));
    }

    let Some(rest) = input.trim_start().strip_prefix('>') else {
        return Err(TemplateError::Syntax {
            context: format!("malformed <{}> element", name),
            snippet: snippet(input),
        });
    };

    let (rest, children) = parse_contents(rest)?;

    // parse_contents stopped at end of input or at some closing tag; it must
    // be ours.
    match closing_tag_name(rest) {
        Some(found) if found == name => {
            let after = consume_closing_tag(rest);
            Ok((
                after,
                RawElement {
                    name: name.to_string(),
                    attributes,
                    children,
                },
            ))
        }
        Some(found) => Err(TemplateError::MismatchedCloseTag {
            expected: name.to_string(),
            found: found.to_string(),
        }),
        None => Err(TemplateError::UnclosedElement {
            element: name.to_string(),
        }),
    }
}

fn parse_attributes<'a>(
    mut input: &'a str,
    element: &str,
) -> Result<(&'a str, Vec<(String, String)>), TemplateError> {
    let mut attributes = Vec::new();
    loop {
        let trimmed = input.trim_start();
        if trimmed.starts_with('>') || trimmed.starts_with("/>") || trimmed.is_empty() {
            return Ok((input, attributes));
        }
        match ws(attribute).parse(input) {
            Ok((rest, (name, value))) => {
                attributes.push((name.to_string(), value.to_string()));
                input = rest;
            }
            Err(_) => {
                return Err(TemplateError::Syntax {
                    context: format!("malformed attribute list on <{}>", element),
                    snippet: snippet(trimmed),
                });
            }
        }
    }
}

fn consume_closing_tag(input: &str) -> &str {
    // Caller verified the shape via closing_tag_name.
    match input.find('>') {
        Some(pos) => &input[pos + 1..],
        None => "",
    }
}

fn snippet(input: &str) -> String {
    input.chars().take(40).collect()
}

/// Build an ordered child sequence; a single node collapses out of its
/// composite wrapper.
fn build_children(contents: Vec<RawContent>) -> Result<TemplateNode, TemplateError> {
    let mut nodes = Vec::with_capacity(contents.len());
    for content in contents {
        nodes.push(build_node(content)?);
    }
    if nodes.len() == 1 {
        Ok(nodes.remove(0))
    } else {
        Ok(TemplateNode::Composite(nodes))
    }
}

fn build_node(content: RawContent) -> Result<TemplateNode, TemplateError> {
    match content {
        RawContent::Text(text) => Ok(text_node(text)),
        RawContent::Element(element) => {
            let builder = ELEMENT_BUILDERS
                .get(element.name.as_str())
                .copied()
                .ok_or_else(|| TemplateError::Syntax {
                    context: "unregistered element".to_string(),
                    snippet: element.name.clone(),
                })?;
            builder(element)
        }
    }
}

/// Text carrying `${...}` placeholders is substituted per execution; plain
/// text is emitted as-is.
fn text_node(text: String) -> TemplateNode {
    if text.contains("${") {
        TemplateNode::DynamicText(text)
    } else {
        TemplateNode::StaticText(text)
    }
}

fn build_if(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&["test"])?;
    let test = parse_test_expression(&element.require_attr("test")?)?;
    Ok(TemplateNode::Conditional {
        test,
        child: Box::new(build_children(element.children)?),
    })
}

fn build_choose(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&[])?;
    let mut branches = Vec::new();
    let mut default_branch = None;

    for content in element.children {
        match content {
            RawContent::Text(text) if text.trim().is_empty() => {}
            RawContent::Text(_) => {
                return Err(TemplateError::UnexpectedContent {
                    element: "choose".to_string(),
                })
            }
            RawContent::Element(child) if child.name == "when" => {
                child.check_attrs(&["test"])?;
                let test = parse_test_expression(&child.require_attr("test")?)?;
                branches.push(ChoiceBranch {
                    test,
                    child: build_children(child.children)?,
                });
            }
            RawContent::Element(child) if child.name == "otherwise" => {
                child.check_attrs(&[])?;
                if default_branch.is_some() {
                    return Err(TemplateError::DuplicateDefaultBranch);
                }
                default_branch = Some(Box::new(build_children(child.children)?));
            }
            RawContent::Element(_) => {
                return Err(TemplateError::UnexpectedContent {
                    element: "choose".to_string(),
                })
            }
        }
    }

    Ok(TemplateNode::Choice {
        branches,
        default_branch,
    })
}

fn reject_misplaced(element: RawElement) -> Result<TemplateNode, TemplateError> {
    Err(TemplateError::MisplacedElement {
        element: element.name,
    })
}

fn build_foreach(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&["collection", "item", "index", "open", "close", "separator"])?;
    let collection = element.require_attr("collection")?;
    Ok(TemplateNode::Loop(LoopNode {
        collection,
        item: element.attr("item").map(str::to_string),
        index: element.attr("index").map(str::to_string),
        open: element.attr("open").map(str::to_string),
        close: element.attr("close").map(str::to_string),
        separator: element.attr("separator").map(str::to_string),
        child: Box::new(build_children(element.children)?),
    }))
}

fn build_trim(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&["prefix", "prefixOverrides", "suffix", "suffixOverrides"])?;
    Ok(TemplateNode::Trim(TrimNode {
        prefix: element.attr("prefix").map(str::to_string),
        prefix_overrides: split_overrides(element.attr("prefixOverrides")),
        suffix: element.attr("suffix").map(str::to_string),
        suffix_overrides: split_overrides(element.attr("suffixOverrides")),
        child: Box::new(build_children(element.children)?),
    }))
}

/// `<where>` strips a leading AND/OR and prefixes `WHERE` when anything
/// survives trimming.
fn build_where(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&[])?;
    Ok(TemplateNode::Trim(TrimNode {
        prefix: Some("WHERE".to_string()),
        prefix_overrides: ["AND ", "OR ", "AND\t", "OR\t", "AND\n", "OR\n"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        suffix: None,
        suffix_overrides: Vec::new(),
        child: Box::new(build_children(element.children)?),
    }))
}

/// `<set>` strips a trailing comma and prefixes `SET`.
fn build_set(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&[])?;
    Ok(TemplateNode::Trim(TrimNode {
        prefix: Some("SET".to_string()),
        prefix_overrides: Vec::new(),
        suffix: None,
        suffix_overrides: vec![",".to_string()],
        child: Box::new(build_children(element.children)?),
    }))
}

fn build_bind(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&["name", "value"])?;
    let name = element.require_attr("name")?;
    let value = parse_test_expression(&element.require_attr("value")?)?;
    Ok(TemplateNode::Bind { name, value })
}

fn build_include(element: RawElement) -> Result<TemplateNode, TemplateError> {
    element.check_attrs(&["refid"])?;
    Ok(TemplateNode::IncludeRef {
        refid: element.require_attr("refid")?,
    })
}

fn split_overrides(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split('|')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
