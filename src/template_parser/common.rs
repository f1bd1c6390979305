use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::recognize,
    error::ParseError,
    sequence::{delimited, pair},
    IResult, Parser,
};

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

/// Element and attribute names: a letter followed by letters, digits,
/// underscores or dashes.
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse(input)
}

/// A quoted attribute value: `"..."` or `'...'`, no escape processing - the
/// raw inner text is kept verbatim.
pub fn quoted_value(input: &str) -> IResult<&str, &str> {
    nom::branch::alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))
    .parse(input)
}

/// One `name="value"` attribute.
pub fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = identifier(input)?;
    let (input, _) = ws(tag("=")).parse(input)?;
    let (input, value) = quoted_value(input)?;
    Ok((input, (name, value)))
}
