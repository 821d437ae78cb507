//! Parser for the subset of the store's SQL dialect the in-memory backend understands.
//!
//! ```text
//! SELECT [VALUE] [TOP n] { * | expr [AS name], ... }
//! FROM <container> [[AS] alias]
//! [WHERE expr]
//! [OFFSET n LIMIT m]
//! ```
//!
//! Expressions support literals, `@parameters`, property paths (`c.a.b`, `c["a"]`, `c[@key]`),
//! array literals, comparisons, `IN (...)`, `AND`/`OR`/`NOT`, parentheses and function calls.
//! Keywords and function names are case-insensitive.

use serde_json::{Number, Value};
use std::fmt;

/// A syntax or resolution error in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError(pub String);

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SqlResult<T> = Result<T, SqlError>;

fn error<T>(message: impl Into<String>) -> SqlResult<T> {
    Err(SqlError(message.into()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub value: bool,
    pub top: Option<Expr>,
    pub projection: Projection,
    pub alias: String,
    pub filter: Option<Expr>,
    pub offset: Option<Expr>,
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Items(Vec<ProjectionItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Parameter(String),
    /// The root identifier followed by property or index accesses.
    Path(String, Vec<Accessor>),
    Array(Vec<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Function call, name upper-cased.
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Property(String),
    Index(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Expr {
    /// Name used for this expression in a projected object.
    pub fn projected_name(&self) -> Option<&str> {
        match self {
            Expr::Path(root, accessors) => match accessors.last() {
                Some(Accessor::Property(name)) => Some(name),
                Some(Accessor::Index(Expr::Literal(Value::String(name)))) => Some(name),
                Some(Accessor::Index(_)) => None,
                None => Some(root),
            },
            _ => None,
        }
    }

    /// Calls `visit` on this expression and every nested one.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr) -> SqlResult<()>) -> SqlResult<()> {
        visit(self)?;

        match self {
            Expr::Literal(_) | Expr::Parameter(_) => Ok(()),
            Expr::Path(_, accessors) => accessors.iter().try_for_each(|accessor| match accessor {
                Accessor::Index(index) => index.walk(&mut *visit),
                Accessor::Property(_) => Ok(()),
            }),
            Expr::Array(items) | Expr::Call(_, items) => {
                items.iter().try_for_each(|item| item.walk(&mut *visit))
            }
            Expr::In(needle, haystack) => {
                needle.walk(&mut *visit)?;
                haystack.iter().try_for_each(|item| item.walk(&mut *visit))
            }
            Expr::Compare(left, _, right) | Expr::And(left, right) | Expr::Or(left, right) => {
                left.walk(&mut *visit)?;
                right.walk(visit)
            }
            Expr::Not(inner) => inner.walk(visit),
        }
    }
}

impl SelectQuery {
    /// Every expression of the query, for resolution checks.
    pub fn expressions(&self) -> impl Iterator<Item = &Expr> {
        let projected = match &self.projection {
            Projection::All => None,
            Projection::Items(items) => Some(items.iter().map(|item| &item.expr)),
        };

        projected
            .into_iter()
            .flatten()
            .chain(self.top.iter())
            .chain(self.filter.iter())
            .chain(self.offset.iter())
            .chain(self.limit.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Number),
    String(String),
    Parameter(String),
    Star,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Op(CompareOp),
}

const KEYWORDS: [&str; 17] = [
    "SELECT", "VALUE", "TOP", "FROM", "WHERE", "AS", "AND", "OR", "NOT", "IN", "OFFSET", "LIMIT",
    "TRUE", "FALSE", "NULL", "UNDEFINED", "JOIN",
];

fn is_keyword(ident: &str, keyword: &str) -> bool {
    ident.eq_ignore_ascii_case(keyword)
}

fn is_reserved(ident: &str) -> bool {
    KEYWORDS.iter().any(|keyword| is_keyword(ident, keyword))
}

fn tokenize(input: &str) -> SqlResult<Vec<Token>> {
    let chars = input.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        match c {
            c if c.is_whitespace() => pos += 1,
            '*' => {
                tokens.push(Token::Star);
                pos += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            '.' if !chars.get(pos + 1).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Dot);
                pos += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                pos += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                pos += 1;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                pos += 1;
            }
            '!' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                pos += 2;
            }
            '<' => match chars.get(pos + 1) {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Lte));
                    pos += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    pos += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    pos += 1;
                }
            },
            '>' => {
                if chars.get(pos + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Gte));
                    pos += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    pos += 1;
                }
            }
            '\'' | '"' => {
                let (text, next) = read_string(&chars, pos)?;
                tokens.push(Token::String(text));
                pos = next;
            }
            '@' => {
                let end = scan_word(&chars, pos + 1);
                if end == pos + 1 {
                    return error(format!("Syntax error, expected a parameter name at position {pos}."));
                }
                tokens.push(Token::Parameter(chars[pos..end].iter().collect()));
                pos = end;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let (number, next) = read_number(&chars, pos)?;
                tokens.push(Token::Number(number));
                pos = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = scan_word(&chars, pos);
                tokens.push(Token::Ident(chars[pos..end].iter().collect()));
                pos = end;
            }
            other => return error(format!("Syntax error, unexpected character '{other}'.")),
        }
    }

    Ok(tokens)
}

fn scan_word(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    end
}

fn read_string(chars: &[char], start: usize) -> SqlResult<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;

    while let Some(&c) = chars.get(pos) {
        match c {
            '\\' => {
                let escaped = match chars.get(pos + 1) {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(&other) => other,
                    None => break,
                };
                text.push(escaped);
                pos += 2;
            }
            c if c == quote => return Ok((text, pos + 1)),
            c => {
                text.push(c);
                pos += 1;
            }
        }
    }

    error("Syntax error, unterminated string literal.")
}

fn read_number(chars: &[char], start: usize) -> SqlResult<(Number, usize)> {
    let mut end = start;
    if chars[end] == '-' {
        end += 1;
    }
    while end < chars.len()
        && (chars[end].is_ascii_digit() || matches!(chars[end], '.' | 'e' | 'E'))
    {
        end += 1;
    }

    let text = chars[start..end].iter().collect::<String>();
    let number = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>().ok().map(Number::from)
    };

    match number {
        Some(number) => Ok((number, end)),
        None => error(format!("Syntax error, invalid number '{text}'.")),
    }
}

/// Parses a query.
pub fn parse(input: &str) -> SqlResult<SelectQuery> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        depth: 0,
    };

    let query = parser.select()?;
    match parser.peek() {
        None => Ok(query),
        Some(token) => error(format!("Syntax error, unexpected {token:?} after the query.")),
    }
}

/// Deepest nesting of parentheses, brackets, calls and `NOT` a query may use.
const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<R>(&mut self, parse: impl FnOnce(&mut Self) -> SqlResult<R>) -> SqlResult<R> {
        if self.depth >= MAX_NESTING {
            return error(format!("Syntax error, expressions nest deeper than {MAX_NESTING} levels."));
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(ident)) if is_keyword(ident, keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> SqlResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            error(format!("Syntax error, expected {keyword}."))
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        let found = self.peek() == Some(expected);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect(&mut self, expected: Token) -> SqlResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            error(format!("Syntax error, expected {expected:?}."))
        }
    }

    fn identifier(&mut self) -> SqlResult<String> {
        match self.next() {
            Some(Token::Ident(ident)) if !is_reserved(&ident) => Ok(ident),
            other => error(format!("Syntax error, expected an identifier, found {other:?}.")),
        }
    }

    fn select(&mut self) -> SqlResult<SelectQuery> {
        self.expect_keyword("SELECT")?;
        let value = self.eat_keyword("VALUE");
        let top = if self.eat_keyword("TOP") {
            Some(self.primary()?)
        } else {
            None
        };

        let projection = if self.eat(&Token::Star) {
            Projection::All
        } else {
            let mut items = vec![self.projection_item()?];
            while self.eat(&Token::Comma) {
                items.push(self.projection_item()?);
            }
            Projection::Items(items)
        };

        if value && !matches!(&projection, Projection::Items(items) if items.len() == 1) {
            return error("Syntax error, SELECT VALUE takes exactly one expression.");
        }

        self.expect_keyword("FROM")?;
        let container = self.identifier()?;
        self.eat_keyword("AS");
        let has_alias = matches!(self.peek(), Some(Token::Ident(ident)) if !is_reserved(ident));
        let alias = if has_alias {
            self.identifier()?
        } else {
            container
        };

        if self.peek_keyword("JOIN") {
            return error("JOIN is not supported.");
        }

        let filter = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        let (offset, limit) = if self.eat_keyword("OFFSET") {
            let offset = self.primary()?;
            self.expect_keyword("LIMIT")?;
            (Some(offset), Some(self.primary()?))
        } else {
            (None, None)
        };

        Ok(SelectQuery {
            value,
            top,
            projection,
            alias,
            filter,
            offset,
            limit,
        })
    }

    fn projection_item(&mut self) -> SqlResult<ProjectionItem> {
        let expr = self.expr()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.identifier()?)
        } else {
            None
        };

        Ok(ProjectionItem { expr, alias })
    }

    fn expr(&mut self) -> SqlResult<Expr> {
        self.nested(|parser| {
            let mut left = parser.and()?;
            while parser.eat_keyword("OR") {
                left = Expr::Or(Box::new(left), Box::new(parser.and()?));
            }
            Ok(left)
        })
    }

    fn and(&mut self) -> SqlResult<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> SqlResult<Expr> {
        if self.eat_keyword("NOT") {
            let inner = self.nested(Self::not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> SqlResult<Expr> {
        let left = self.operand()?;

        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(self.operand()?)));
        }

        let negated = self.peek_keyword("NOT")
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Ident(ident)) if is_keyword(ident, "IN"));
        if negated {
            self.pos += 1;
        }

        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let items = self.list(Token::RParen)?;
            let expr = Expr::In(Box::new(left), items);
            return Ok(if negated { Expr::Not(Box::new(expr)) } else { expr });
        }

        Ok(left)
    }

    fn list(&mut self, close: Token) -> SqlResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }

        loop {
            items.push(self.expr()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn operand(&mut self) -> SqlResult<Expr> {
        let primary = self.primary()?;

        let Expr::Path(root, mut accessors) = primary else {
            return Ok(primary);
        };

        loop {
            if self.eat(&Token::Dot) {
                accessors.push(Accessor::Property(self.property_name()?));
            } else if self.eat(&Token::LBracket) {
                accessors.push(Accessor::Index(self.expr()?));
                self.expect(Token::RBracket)?;
            } else {
                return Ok(Expr::Path(root, accessors));
            }
        }
    }

    // Keywords are valid property names after a dot (`c.value`).
    fn property_name(&mut self) -> SqlResult<String> {
        match self.next() {
            Some(Token::Ident(ident)) => Ok(ident),
            other => error(format!("Syntax error, expected a property name, found {other:?}.")),
        }
    }

    fn primary(&mut self) -> SqlResult<Expr> {
        match self.next() {
            Some(Token::Number(number)) => Ok(Expr::Literal(Value::Number(number))),
            Some(Token::String(text)) => Ok(Expr::Literal(Value::String(text))),
            Some(Token::Parameter(name)) => Ok(Expr::Parameter(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => Ok(Expr::Array(self.list(Token::RBracket)?)),
            Some(Token::Ident(ident)) => {
                if is_keyword(&ident, "TRUE") {
                    Ok(Expr::Literal(Value::Bool(true)))
                } else if is_keyword(&ident, "FALSE") {
                    Ok(Expr::Literal(Value::Bool(false)))
                } else if is_keyword(&ident, "NULL") {
                    Ok(Expr::Literal(Value::Null))
                } else if self.eat(&Token::LParen) {
                    Ok(Expr::Call(ident.to_ascii_uppercase(), self.list(Token::RParen)?))
                } else if is_reserved(&ident) {
                    error(format!("Syntax error, unexpected keyword {ident}."))
                } else {
                    Ok(Expr::Path(ident, Vec::new()))
                }
            }
            other => error(format!("Syntax error, unexpected {other:?}.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(root: &str, props: &[&str]) -> Expr {
        Expr::Path(
            root.to_string(),
            props
                .iter()
                .map(|p| Accessor::Property(p.to_string()))
                .collect(),
        )
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let parens = format!(
            "SELECT * FROM c WHERE {}c.a = 1{}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        assert!(parse(&parens).unwrap_err().0.contains("nest"));

        let nots = format!("SELECT * FROM c WHERE {}c.a = 1", "NOT ".repeat(10_000));
        assert!(parse(&nots).unwrap_err().0.contains("nest"));

        let calls = format!("SELECT VALUE {}1{} FROM c", "LOWER(".repeat(10_000), ")".repeat(10_000));
        assert!(parse(&calls).is_err());
    }

    #[test]
    fn moderate_nesting_parses() {
        let query = format!("SELECT * FROM c WHERE {}c.a = 1{}", "(".repeat(32), ")".repeat(32));

        assert!(parse(&query).is_ok());
    }

    #[test]
    fn parses_indexed_lookup_with_offset() {
        let query = parse("SELECT * FROM C WHERE C[@key] = @value OFFSET 0 LIMIT 1").unwrap();

        assert_eq!(query.projection, Projection::All);
        assert_eq!(query.alias, "C");
        assert_eq!(
            query.filter,
            Some(Expr::Compare(
                Box::new(Expr::Path(
                    "C".into(),
                    vec![Accessor::Index(Expr::Parameter("@key".into()))]
                )),
                CompareOp::Eq,
                Box::new(Expr::Parameter("@value".into())),
            ))
        );
        assert_eq!(query.offset, Some(Expr::Literal(json!(0))));
        assert_eq!(query.limit, Some(Expr::Literal(json!(1))));
    }

    #[test]
    fn parses_value_count() {
        let query = parse("select value count(c.id) from c").unwrap();

        assert!(query.value);
        assert_eq!(
            query.projection,
            Projection::Items(vec![ProjectionItem {
                expr: Expr::Call("COUNT".into(), vec![path("c", &["id"])]),
                alias: None,
            }])
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let query = parse("SELECT * FROM c WHERE c.a = 1 OR c.b = 2 AND NOT c.c = 3").unwrap();

        let Some(Expr::Or(_, right)) = query.filter else {
            panic!("expected OR at the top");
        };
        assert!(matches!(*right, Expr::And(_, ref not) if matches!(**not, Expr::Not(_))));
    }

    #[test]
    fn parses_projection_aliases_and_container_alias() {
        let query = parse("SELECT u.name AS n, u.address.city FROM users u").unwrap();

        assert_eq!(query.alias, "u");
        let Projection::Items(items) = query.projection else {
            panic!("expected projected items");
        };
        assert_eq!(items[0].alias.as_deref(), Some("n"));
        assert_eq!(items[1].expr.projected_name(), Some("city"));
    }

    #[test]
    fn parses_literals() {
        let query = parse(r#"SELECT * FROM c WHERE c.x IN ('a', "b", -1.5, true, null, [1, 2])"#).unwrap();

        let Some(Expr::In(_, items)) = query.filter else {
            panic!("expected IN");
        };
        assert_eq!(
            items,
            vec![
                Expr::Literal(json!("a")),
                Expr::Literal(json!("b")),
                Expr::Literal(json!(-1.5)),
                Expr::Literal(json!(true)),
                Expr::Literal(Value::Null),
                Expr::Array(vec![Expr::Literal(json!(1)), Expr::Literal(json!(2))]),
            ]
        );
    }

    #[test]
    fn rejects_malformed_queries() {
        for query in [
            "SELECT FROM c",
            "SELECT * WHERE c.id = 1",
            "SELECT * FROM c WHERE",
            "SELECT * FROM c WHERE c.name = 'open",
            "SELECT * FROM c OFFSET 1",
            "SELECT VALUE c.a, c.b FROM c",
            "SELECT * FROM c extra tokens",
        ] {
            assert!(parse(query).is_err(), "{query}");
        }
    }
}
