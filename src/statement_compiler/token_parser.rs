//! Generic open/close token scanner.
//!
//! Shared by `${...}` substitution, `#{...}` extraction and loop placeholder
//! rewriting. A backslash escapes a token opener (`\#{`, `\${`): the token is
//! kept as literal text. An opener with no closer is literal text too, not an
//! error. An escaped closer inside a token body (`\}`) is part of the body.

pub struct TokenParser<'a> {
    open: &'a str,
    close: &'a str,
    /// Keep the escaping backslash in the output instead of consuming it.
    /// Used by passes whose output is scanned again later.
    keep_escapes: bool,
}

impl<'a> TokenParser<'a> {
    pub fn new(open: &'a str, close: &'a str) -> Self {
        TokenParser {
            open,
            close,
            keep_escapes: false,
        }
    }

    pub fn preserving_escapes(open: &'a str, close: &'a str) -> Self {
        TokenParser {
            open,
            close,
            keep_escapes: true,
        }
    }

    /// Scan `text`, replacing each token body through `handler`.
    pub fn parse<E>(
        &self,
        text: &str,
        handler: &mut dyn FnMut(&str) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let Some(pos) = rest.find(self.open) else {
                out.push_str(rest);
                return Ok(out);
            };

            if pos > 0 && rest.as_bytes()[pos - 1] == b'\\' {
                out.push_str(&rest[..pos - 1]);
                if self.keep_escapes {
                    out.push('\\');
                }
                out.push_str(self.open);
                rest = &rest[pos + self.open.len()..];
                continue;
            }

            out.push_str(&rest[..pos]);
            let body_start = &rest[pos + self.open.len()..];
            match self.find_close(body_start) {
                None => {
                    // Unterminated token: emit the opener and the remainder
                    // verbatim.
                    out.push_str(self.open);
                    out.push_str(body_start);
                    return Ok(out);
                }
                Some((content, after_close)) => {
                    out.push_str(&handler(&content)?);
                    rest = after_close;
                }
            }
        }
    }

    /// Find the unescaped closer, unescaping `\<close>` sequences inside the
    /// body along the way.
    fn find_close<'t>(&self, text: &'t str) -> Option<(String, &'t str)> {
        let mut content = String::new();
        let mut rest = text;
        loop {
            let pos = rest.find(self.close)?;
            if pos > 0 && rest.as_bytes()[pos - 1] == b'\\' {
                content.push_str(&rest[..pos - 1]);
                content.push_str(self.close);
                rest = &rest[pos + self.close.len()..];
            } else {
                content.push_str(&rest[..pos]);
                return Some((content, &rest[pos + self.close.len()..]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace_all(parser: &TokenParser<'_>, text: &str) -> String {
        parser
            .parse::<std::convert::Infallible>(text, &mut |content| Ok(format!("<{}>", content)))
            .unwrap()
    }

    #[test]
    fn replaces_tokens_in_order() {
        let parser = TokenParser::new("#{", "}");
        assert_eq!(
            replace_all(&parser, "a = #{a} AND b = #{b}"),
            "a = <a> AND b = <b>"
        );
    }

    #[test]
    fn escaped_opener_is_literal() {
        let parser = TokenParser::new("#{", "}");
        assert_eq!(replace_all(&parser, r"a = \#{a}"), "a = #{a}");
    }

    #[test]
    fn preserving_mode_keeps_the_backslash() {
        let parser = TokenParser::preserving_escapes("#{", "}");
        assert_eq!(replace_all(&parser, r"a = \#{a}"), r"a = \#{a}");
    }

    #[test]
    fn unterminated_token_is_literal() {
        let parser = TokenParser::new("#{", "}");
        assert_eq!(replace_all(&parser, "a = #{a"), "a = #{a");
    }

    #[test]
    fn escaped_closer_stays_in_the_body() {
        let parser = TokenParser::new("#{", "}");
        assert_eq!(replace_all(&parser, r"#{a\}b}"), "<a}b>");
    }

    #[test]
    fn text_without_tokens_is_untouched() {
        let parser = TokenParser::new("${", "}");
        assert_eq!(replace_all(&parser, "SELECT 1"), "SELECT 1");
    }

    #[test]
    fn handler_errors_propagate() {
        let parser = TokenParser::new("#{", "}");
        let result = parser.parse(r"#{bad}", &mut |_| Err("boom"));
        assert_eq!(result, Err("boom"));
    }
}
