//! Lexer for Ergo source files.
//!
//! Hand-written, char-at-a-time scanner producing a flat token stream with automatic semicolon
//! insertion (ASI) and the nested "return-spec" sublanguage (`(( T, U ))` / `(( -- ))`).
mod keywords;

pub use keywords::KEYWORDS;

use std::{error::Error, fmt::Display, rc::Rc};

use crate::{
    position::Position,
    token::{Literal, StringPart, Token, TokenKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub pos: Position,
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

impl Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer {
    file: Rc<str>,
    chars: Vec<char>,
    idx: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
    last_significant: Option<TokenKind>,
    bracket_depth: i32,
    in_return_spec: bool,
}

impl Lexer {
    pub fn new(file: impl Into<Rc<str>>, source: &str) -> Self {
        Self {
            file: file.into(),
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
            tokens: vec![],
            last_significant: None,
            bracket_depth: 0,
            in_return_spec: false,
        }
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.skip_whitespace_and_comments()?;

            if self.at_end() {
                self.try_insert_semi();
                self.push(TokenKind::Eof, "", None);
                break;
            }

            let c = self.peek_char().unwrap();
            if c == '"' {
                self.lex_raw_string()?;
            } else if c == '@' && self.peek_at(1) == Some('"') {
                self.lex_interpolated_string()?;
            } else if c.is_ascii_digit() {
                self.lex_number()?;
            } else if is_ident_start(c) {
                self.lex_ident_or_keyword();
            } else {
                self.lex_operator()?;
            }
        }

        Ok(self.tokens)
    }

    fn at_end(&self) -> bool {
        self.idx >= self.chars.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.idx + offset).copied()
    }

    fn pos(&self) -> Position {
        Position::new(self.file.clone(), self.line, self.col)
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            pos: self.pos(),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, literal: Option<Literal>) {
        let pos = self.pos();
        let mut token = Token::new(kind, text, pos);
        if let Some(lit) = literal {
            token = token.with_literal(lit);
        }
        self.tokens.push(token);
        if kind != TokenKind::Semi {
            self.last_significant = Some(kind);
        }
    }

    /// Emit a synthetic or explicit `;`, collapsing runs of consecutive `SEMI`s (§4.1).
    fn push_semi(&mut self) {
        if matches!(self.tokens.last().map(|t| t.kind), Some(TokenKind::Semi)) {
            return;
        }
        let pos = self.pos();
        self.tokens.push(Token::new(TokenKind::Semi, ";", pos));
    }

    fn try_insert_semi(&mut self) {
        if self.bracket_depth == 0 {
            if let Some(kind) = self.last_significant {
                if kind.ends_statement() {
                    self.push_semi();
                }
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> LexResult<()> {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.try_insert_semi();
                }
                Some('-') if self.peek_at(1) == Some('-') && !self.in_return_spec => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_ident_or_keyword(&mut self) {
        let pos = self.pos();
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = KEYWORDS.get(text.as_str()).copied().unwrap_or(TokenKind::Ident);
        self.tokens.push(Token::new(kind, text, pos));
        self.last_significant = Some(kind);
    }

    fn lex_number(&mut self) -> LexResult<()> {
        let pos = self.pos();
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek_char() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid float literal '{text}'")))?;
            self.tokens.push(
                Token::new(TokenKind::Float, text, pos).with_literal(Literal::Float(value)),
            );
            self.last_significant = Some(TokenKind::Float);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid integer literal '{text}'")))?;
            self.tokens
                .push(Token::new(TokenKind::Int, text, pos).with_literal(Literal::Int(value)));
            self.last_significant = Some(TokenKind::Int);
        }

        Ok(())
    }

    fn lex_raw_string(&mut self) -> LexResult<()> {
        let pos = self.pos();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        self.tokens.push(
            Token::new(TokenKind::Str, format!("\"{value}\""), pos)
                .with_literal(Literal::Str(vec![StringPart::Text(value)])),
        );
        self.last_significant = Some(TokenKind::Str);
        Ok(())
    }

    fn lex_interpolated_string(&mut self) -> LexResult<()> {
        let pos = self.pos();
        self.advance(); // '@'
        self.advance(); // opening quote

        let mut parts = vec![];
        let mut current = String::new();

        loop {
            match self.peek_char() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.lex_escape(&mut current)?;
                }
                Some('$') if self.peek_at(1).map(is_ident_start).unwrap_or(false) => {
                    if !current.is_empty() {
                        parts.push(StringPart::Text(std::mem::take(&mut current)));
                    }
                    self.advance(); // '$'
                    let mut name = String::new();
                    while let Some(c) = self.peek_char() {
                        if is_ident_continue(c) {
                            name.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    parts.push(StringPart::Var(name));
                }
                Some(c) => {
                    current.push(c);
                    self.advance();
                }
            }
        }

        if !current.is_empty() || parts.is_empty() {
            parts.push(StringPart::Text(current));
        }

        self.tokens.push(
            Token::new(TokenKind::Str, "@\"…\"", pos).with_literal(Literal::Str(parts)),
        );
        self.last_significant = Some(TokenKind::Str);
        Ok(())
    }

    /// Standard escapes (`\n \t \r \\ \" \u{...}`) are decoded via the `unescape` crate, the way
    /// the teacher's own string literal node (`string.rs`) delegates to it rather than hand-rolling
    /// the table; `\$` is Ergo-specific (escapes the `$`-interpolation sigil) and has no analogue
    /// there, so it's handled directly.
    fn lex_escape(&mut self, out: &mut String) -> LexResult<()> {
        match self.peek_char() {
            Some('$') => {
                out.push('$');
                self.advance();
            }
            Some('u') => {
                self.advance();
                if self.peek_char() != Some('{') {
                    return Err(self.error("expected '{' after \\u"));
                }
                self.advance();
                let mut hex = String::new();
                while let Some(c) = self.peek_char() {
                    if c == '}' {
                        break;
                    }
                    hex.push(c);
                    self.advance();
                }
                if self.peek_char() != Some('}') {
                    return Err(self.error("unterminated unicode escape"));
                }
                self.advance();
                let decoded = unescape::unescape(&format!("\\u{{{hex}}}"))
                    .ok_or_else(|| self.error(format!("invalid unicode escape '\\u{{{hex}}}'")))?;
                out.push_str(&decoded);
            }
            Some(c @ ('n' | 't' | 'r' | '\\' | '"')) => {
                let decoded = unescape::unescape(&format!("\\{c}"))
                    .ok_or_else(|| self.error(format!("unknown escape sequence '\\{c}'")))?;
                out.push_str(&decoded);
                self.advance();
            }
            Some(c) => return Err(self.error(format!("unknown escape sequence '\\{c}'"))),
            None => return Err(self.error("unterminated string literal")),
        }
        Ok(())
    }

    fn lex_operator(&mut self) -> LexResult<()> {
        let pos = self.pos();
        let c = self.advance().unwrap();

        macro_rules! two {
            ($second:literal, $two_kind:expr, $one_kind:expr, $text:literal) => {{
                if self.peek_char() == Some($second) {
                    self.advance();
                    self.push($two_kind, concat!($text, $second), None);
                } else {
                    self.push($one_kind, $text, None);
                }
            }};
        }

        match c {
            '(' => {
                if self.peek_char() == Some('(')
                    && !self.in_return_spec
                    && self.last_significant == Some(TokenKind::RParen)
                {
                    self.advance();
                    self.in_return_spec = true;
                    self.bracket_depth += 1;
                    self.push(TokenKind::DOpenParen, "((", None);
                } else {
                    self.bracket_depth += 1;
                    self.push(TokenKind::LParen, "(", None);
                }
            }
            ')' => {
                if self.in_return_spec && self.peek_char() == Some(')') {
                    self.advance();
                    self.in_return_spec = false;
                    self.bracket_depth -= 1;
                    self.push(TokenKind::DCloseParen, "))", None);
                } else {
                    self.bracket_depth -= 1;
                    self.push(TokenKind::RParen, ")", None);
                }
            }
            '{' => self.push(TokenKind::LBrace, "{", None),
            '}' => self.push(TokenKind::RBrace, "}", None),
            '[' => {
                self.bracket_depth += 1;
                self.push(TokenKind::LBracket, "[", None);
            }
            ']' => {
                self.bracket_depth -= 1;
                self.push(TokenKind::RBracket, "]", None);
            }
            ',' => self.push(TokenKind::Comma, ",", None),
            ';' => self.push_semi(),
            '.' => self.push(TokenKind::Dot, ".", None),
            ':' => self.push(TokenKind::Colon, ":", None),
            '#' => self.push(TokenKind::Hash, "#", None),
            '?' => self.push(TokenKind::QMark, "?", None),
            '-' => {
                if self.in_return_spec && self.peek_char() == Some('-') {
                    self.advance();
                    self.push(TokenKind::VoidMarker, "--", None);
                } else {
                    two!('=', TokenKind::MinusEq, TokenKind::Minus, "-");
                }
            }
            '+' => two!('=', TokenKind::PlusEq, TokenKind::Plus, "+"),
            '*' => two!('=', TokenKind::StarEq, TokenKind::Star, "*"),
            '/' => two!('=', TokenKind::SlashEq, TokenKind::Slash, "/"),
            '%' => self.push(TokenKind::Percent, "%", None),
            '=' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.push(TokenKind::EqEq, "==", None);
                } else if self.peek_char() == Some('>') {
                    self.advance();
                    self.push(TokenKind::FatArrow, "=>", None);
                } else {
                    self.push(TokenKind::Eq, "=", None);
                }
            }
            '!' => two!('=', TokenKind::NotEq, TokenKind::Bang, "!"),
            '<' => two!('=', TokenKind::Le, TokenKind::Lt, "<"),
            '>' => two!('=', TokenKind::Ge, TokenKind::Gt, ">"),
            '&' => {
                if self.peek_char() == Some('&') {
                    self.advance();
                    self.push(TokenKind::AndAnd, "&&", None);
                } else {
                    return Err(LexError {
                        message: "unexpected character '&'".into(),
                        pos,
                    });
                }
            }
            '|' => {
                if self.peek_char() == Some('|') {
                    self.advance();
                    self.push(TokenKind::OrOr, "||", None);
                } else {
                    self.push(TokenKind::Bar, "|", None);
                }
            }
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    pos,
                })
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new("test.e", src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_let_statement_inserts_semi() {
        use TokenKind::*;
        assert_eq!(
            kinds("let x = 1\n"),
            vec![Let, Ident, Eq, Int, Semi, Eof]
        );
    }

    #[test]
    fn explicit_semicolon_collapses_with_synthetic() {
        use TokenKind::*;
        assert_eq!(
            kinds("let x = 1;\n"),
            vec![Let, Ident, Eq, Int, Semi, Eof]
        );
    }

    #[test]
    fn no_semi_inside_parens_or_brackets() {
        use TokenKind::*;
        let ks = kinds("let x = [1,\n2,\n3]\n");
        assert_eq!(
            ks,
            vec![
                Let, Ident, Eq, LBracket, Int, Comma, Int, Comma, Int, RBracket, Semi, Eof
            ]
        );
    }

    #[test]
    fn double_dash_is_comment_outside_return_spec() {
        use TokenKind::*;
        assert_eq!(kinds("let x = 1 -- a comment\n"), vec![Let, Ident, Eq, Int, Semi, Eof]);
    }

    #[test]
    fn return_spec_recognizes_double_parens_and_void_marker() {
        use TokenKind::*;
        assert_eq!(
            kinds("fun f() (( -- )) {}"),
            vec![Fun, Ident, LParen, RParen, DOpenParen, VoidMarker, DCloseParen, LBrace, RBrace, Eof]
        );
    }

    #[test]
    fn return_spec_with_multiple_types() {
        use TokenKind::*;
        assert_eq!(
            kinds("fun f() (( num, bool )) {}"),
            vec![
                Fun, Ident, LParen, RParen, DOpenParen, Ident, Comma, Ident, DCloseParen, LBrace,
                RBrace, Eof
            ]
        );
    }

    #[test]
    fn interpolated_string_parts() {
        let tokens = Lexer::new("test.e", "@\"hello $name!\"").lex().unwrap();
        let Some(Literal::Str(parts)) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert_eq!(
            parts,
            &vec![
                StringPart::Text("hello ".into()),
                StringPart::Var("name".into()),
                StringPart::Text("!".into()),
            ]
        );
    }

    #[test]
    fn raw_string_has_literal_backslashes() {
        let tokens = Lexer::new("test.e", r#""a\nb""#).lex().unwrap();
        let Some(Literal::Str(parts)) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert_eq!(parts, &vec![StringPart::Text("a\\nb".into())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("test.e", "\"abc").lex().is_err());
    }

    #[test]
    fn length_operator_and_numbers() {
        use TokenKind::*;
        assert_eq!(kinds("#arr + 3.5"), vec![Hash, Ident, Plus, Float, Eof]);
    }
}
