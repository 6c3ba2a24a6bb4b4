//! Tokenizer-free recursive-descent parsing of expression source text.
//!
//! The grammar is tiny: an expression is a symbol, optionally followed by a
//! balanced, comma-separated argument list. Whitespace is insignificant and
//! `//` starts a line comment. Everything symbol-shaped (including literal
//! forms such as `0x..`, `u64/7`, `$1`, `#slice`) is one token here; telling
//! literals from function names is the compiler's job.

use crate::error::ParseError;

/// A parsed expression node: a symbol and its parsed arguments. Produced
/// only inside the compiler and discarded after bytecode emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedExpr {
    pub sym: String,
    pub args: Vec<ParsedExpr>,
}

/// One `func NAME : BODY` block of a definition batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub sym: String,
    pub body: String,
}

const DELIMITERS: &[char] = &['(', ')', ','];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || DELIMITERS.contains(&c)
}

fn strip_comments(src: &str) -> String {
    src.lines()
        .map(|line| line.split_once("//").map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n")
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn token(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| !is_delimiter(c)) {
            self.bump();
        }
        let token = &self.src[start..self.pos];
        if token.is_empty() {
            return Err(match self.peek() {
                Some(c) => ParseError::UnexpectedChar(c),
                None => ParseError::UnexpectedEnd,
            });
        }
        Ok(token)
    }
}

fn parse_node(cur: &mut Cursor<'_>) -> Result<ParsedExpr, ParseError> {
    cur.skip_whitespace();
    let sym = cur.token()?.to_string();
    cur.skip_whitespace();

    let mut args = Vec::new();
    if cur.peek() == Some('(') {
        cur.bump();
        cur.skip_whitespace();
        if cur.peek() == Some(')') {
            cur.bump();
        } else {
            loop {
                args.push(parse_node(cur)?);
                cur.skip_whitespace();
                match cur.peek() {
                    Some(',') => cur.bump(),
                    Some(')') => {
                        cur.bump();
                        break;
                    }
                    Some(c) => return Err(ParseError::UnexpectedChar(c)),
                    None => return Err(ParseError::UnbalancedParentheses),
                }
            }
        }
    }

    Ok(ParsedExpr { sym, args })
}

/// Parses one complete expression; trailing non-whitespace is an error.
pub(crate) fn parse_expression(src: &str) -> Result<ParsedExpr, ParseError> {
    let cleaned = strip_comments(src);
    let mut cur = Cursor::new(&cleaned);
    let expr = parse_node(&mut cur)?;
    cur.skip_whitespace();
    if !cur.rest().is_empty() {
        return Err(ParseError::TrailingInput(cur.rest().trim().to_string()));
    }
    Ok(expr)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':') && !name.chars().any(is_delimiter)
}

/// Splits a definition batch into its `func NAME : BODY` blocks. A body
/// extends to the next line starting with `func ` or to end of input; the
/// bodies themselves are parsed later, against whatever scope applies.
pub(crate) fn parse_definitions(src: &str) -> Result<Vec<Definition>, ParseError> {
    let cleaned = strip_comments(src);
    let mut blocks: Vec<Vec<&str>> = Vec::new();

    for line in cleaned.lines() {
        if line.trim_start().starts_with("func ") {
            blocks.push(vec![line]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        } else if !line.trim().is_empty() {
            return Err(ParseError::MalformedDefinition(line.trim().to_string()));
        }
    }

    blocks
        .into_iter()
        .map(|block| {
            let text = block.join("\n");
            let rest = text
                .trim_start()
                .strip_prefix("func ")
                .unwrap_or_default();
            let (name, body) = rest
                .split_once(':')
                .ok_or_else(|| ParseError::MalformedDefinition(snippet(&text)))?;
            let sym = name.trim();
            let body = body.trim();
            if !is_valid_name(sym) || body.is_empty() {
                return Err(ParseError::MalformedDefinition(snippet(&text)));
            }
            Ok(Definition {
                sym: sym.to_string(),
                body: body.to_string(),
            })
        })
        .collect()
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    let mut end = trimmed.len().min(40);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> ParsedExpr {
        ParsedExpr {
            sym: s.to_string(),
            args: vec![],
        }
    }

    #[test]
    fn parses_nested_calls() {
        let expr = parse_expression("concat( 1,slice(x, 2 ,3), nil )").unwrap();
        assert_eq!(expr.sym, "concat");
        assert_eq!(expr.args.len(), 3);
        assert_eq!(expr.args[0], sym("1"));
        assert_eq!(
            expr.args[1],
            ParsedExpr {
                sym: "slice".to_string(),
                args: vec![sym("x"), sym("2"), sym("3")],
            }
        );
        assert_eq!(expr.args[2], sym("nil"));
    }

    #[test]
    fn comments_and_whitespace_are_insignificant() {
        let expr = parse_expression(
            "add( // first operand\n  1,\n  // second\n  2\n)",
        )
        .unwrap();
        assert_eq!(expr.sym, "add");
        assert_eq!(expr.args, vec![sym("1"), sym("2")]);
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(parse_expression(""), Err(ParseError::UnexpectedEnd));
        assert_eq!(
            parse_expression("f(a,,b)"),
            Err(ParseError::UnexpectedChar(','))
        );
        assert_eq!(
            parse_expression("f(a"),
            Err(ParseError::UnbalancedParentheses)
        );
        assert_eq!(
            parse_expression("f(a) garbage"),
            Err(ParseError::TrailingInput("garbage".to_string()))
        );
        assert_eq!(
            parse_expression(")x"),
            Err(ParseError::UnexpectedChar(')'))
        );
    }

    #[test]
    fn splits_definition_batches() {
        let defs = parse_definitions(
            "// helpers\nfunc double : concat($0, $0)\nfunc quad :\n   double(\n     double($0)\n   )\n",
        )
        .unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].sym, "double");
        assert_eq!(defs[0].body, "concat($0, $0)");
        assert_eq!(defs[1].sym, "quad");
        assert!(defs[1].body.contains("double"));
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert!(matches!(
            parse_definitions("stray text\nfunc f : $0"),
            Err(ParseError::MalformedDefinition(_))
        ));
        assert!(matches!(
            parse_definitions("func noname $0"),
            Err(ParseError::MalformedDefinition(_))
        ));
        assert!(matches!(
            parse_definitions("func f :"),
            Err(ParseError::MalformedDefinition(_))
        ));
    }
}
