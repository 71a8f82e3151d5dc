//! Hand-written recursive-descent parser with a Pratt-style expression core (§4.2).
use std::{error::Error, fmt::Display, rc::Rc};

use crate::{
    ast::{
        BinaryOp, Block, ClassDecl, ConstDecl, Decl, Expr, ExprKind, Field, FunctionDecl,
        LambdaParam, MatchArm, Module, Param, Pattern, ReturnSpec, Stmt, StmtKind, StrPart, Type,
        UnaryOp, Visibility,
    },
    position::Position,
    token::{Literal, Token, TokenKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

impl Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

pub fn parse(tokens: Vec<Token>, name: impl Into<String>, path: impl Into<String>) -> ParseResult<Module<()>> {
    Parser::new(tokens).parse_module(name.into(), path.into())
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, idx: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_pos(&self) -> Position {
        self.current().pos.clone()
    }

    fn peek_ahead_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.idx + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_ident_text(&self, text: &str) -> bool {
        let t = self.current();
        t.kind == TokenKind::Ident && t.text == text
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            pos: self.peek_pos(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let got = self.current().clone();
            Err(self.error(format!(
                "expected {kind:?}, got {:?} ({})",
                got.kind, got.text
            )))
        }
    }

    fn expect_semi(&mut self) -> ParseResult<()> {
        self.expect(TokenKind::Semi).map(|_| ())
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        Ok(self.expect(TokenKind::Ident)?.text)
    }

    fn parse_module(&mut self, name: String, path: String) -> ParseResult<Module<()>> {
        let mut imports = vec![];
        while self.check(TokenKind::Bring) {
            imports.push(self.parse_import()?);
        }

        let mut decls = vec![];
        while !self.check(TokenKind::Eof) {
            decls.push(self.parse_decl()?);
        }

        Ok(Module {
            name,
            path,
            imports,
            decls,
        })
    }

    fn parse_import(&mut self) -> ParseResult<crate::ast::Import> {
        let pos = self.expect(TokenKind::Bring)?.pos;
        let name = self.expect_ident()?;
        if self.check(TokenKind::Dot) {
            self.advance();
            self.expect_ident()?; // the `.e` suffix; normalized away.
        }
        self.expect_semi()?;
        Ok(crate::ast::Import { name, pos })
    }

    fn parse_decl(&mut self) -> ParseResult<Decl<()>> {
        match self.peek_kind() {
            TokenKind::Entry => Ok(Decl::Entry(self.parse_entry()?)),
            TokenKind::Fun => Ok(Decl::Function(self.parse_function_decl(Visibility::Priv, false)?)),
            TokenKind::Const => Ok(Decl::Const(self.parse_const_decl()?)),
            TokenKind::Pub | TokenKind::Lock | TokenKind::Seal | TokenKind::Class => {
                Ok(Decl::Class(self.parse_class()?))
            }
            other => Err(self.error(format!("expected a declaration, got {other:?}"))),
        }
    }

    fn parse_visibility(&mut self) -> Visibility {
        if self.eat(TokenKind::Pub) {
            Visibility::Pub
        } else if self.eat(TokenKind::Lock) {
            Visibility::Lock
        } else {
            Visibility::Priv
        }
    }

    fn parse_class(&mut self) -> ParseResult<ClassDecl<()>> {
        let pos = self.peek_pos();
        let visibility = self.parse_visibility();
        let sealed = self.eat(TokenKind::Seal);
        self.expect(TokenKind::Class)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = vec![];
        let mut methods = vec![];
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Fun) {
                methods.push(self.parse_function_decl(Visibility::Priv, true)?);
                self.expect_semi()?;
            } else if self.check(TokenKind::Pub) {
                self.advance();
                methods.push(self.parse_function_decl(Visibility::Pub, true)?);
                self.expect_semi()?;
            } else {
                fields.push(self.parse_field()?);
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(ClassDecl {
            name,
            visibility,
            sealed,
            fields,
            methods,
            pos,
        })
    }

    fn parse_field(&mut self) -> ParseResult<Field> {
        let pos = self.peek_pos();
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let ty = self.parse_type()?;
        self.expect_semi()?;
        Ok(Field { name, ty, pos })
    }

    fn parse_entry(&mut self) -> ParseResult<FunctionDecl<()>> {
        let pos = self.expect(TokenKind::Entry)?.pos;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;
        let ret = self.parse_return_spec()?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name: "entry".to_string(),
            visibility: Visibility::Priv,
            receiver: None,
            params: vec![],
            ret,
            body,
            pos,
        })
    }

    fn try_parse_receiver(&mut self) -> Option<bool> {
        if self.check(TokenKind::QMark) && self.peek_ahead_kind(1) == TokenKind::Ident {
            if self.tokens[self.idx + 1].text == "this" {
                self.advance();
                self.advance();
                return Some(true);
            }
        }
        if self.check_ident_text("this") {
            self.advance();
            return Some(false);
        }
        None
    }

    fn parse_function_decl(
        &mut self,
        visibility: Visibility,
        expect_receiver: bool,
    ) -> ParseResult<FunctionDecl<()>> {
        let pos = self.expect(TokenKind::Fun)?.pos;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;

        let receiver = if expect_receiver {
            self.try_parse_receiver()
        } else {
            None
        };
        if receiver.is_some() {
            self.eat(TokenKind::Comma);
        }

        let mut params = vec![];
        while !self.check(TokenKind::RParen) {
            params.push(self.parse_param()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let ret = self.parse_return_spec()?;
        let body = self.parse_block()?;

        Ok(FunctionDecl {
            name,
            visibility,
            receiver,
            params,
            ret,
            body,
            pos,
        })
    }

    fn parse_param(&mut self) -> ParseResult<Param> {
        let pos = self.peek_pos();
        let mutable = self.eat(TokenKind::QMark);
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let ty = self.parse_type()?;
        Ok(Param {
            name,
            ty: Some(ty),
            mutable,
            pos,
        })
    }

    fn parse_return_spec(&mut self) -> ParseResult<ReturnSpec> {
        self.expect(TokenKind::DOpenParen)?;
        if self.eat(TokenKind::VoidMarker) {
            self.expect(TokenKind::DCloseParen)?;
            return Ok(ReturnSpec::Void);
        }

        let mut types = vec![self.parse_type()?];
        while self.check(TokenKind::Comma) || self.check(TokenKind::Semi) {
            self.advance();
            types.push(self.parse_type()?);
        }
        self.expect(TokenKind::DCloseParen)?;

        if types.len() == 1 {
            Ok(ReturnSpec::Single(types.remove(0)))
        } else {
            Ok(ReturnSpec::Multi(types))
        }
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        if self.eat(TokenKind::LBracket) {
            let elem = self.parse_type()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Type::Array(Box::new(elem)));
        }
        if self.eat(TokenKind::LParen) {
            let mut items = vec![self.parse_type()?];
            while self.eat(TokenKind::Comma) {
                items.push(self.parse_type()?);
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Type::Tuple(items));
        }
        let name = self.expect_ident()?;
        Ok(match name.as_str() {
            "bool" => Type::Bool,
            "string" => Type::Str,
            "num" => Type::Num,
            "void" => Type::Void,
            _ => Type::Class(name),
        })
    }

    fn parse_const_decl(&mut self) -> ParseResult<ConstDecl<()>> {
        let pos = self.expect(TokenKind::Const)?.pos;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr(0)?;
        self.expect_semi()?;
        Ok(ConstDecl { name, value, pos })
    }

    fn parse_block(&mut self) -> ParseResult<Block<()>> {
        let pos = self.expect(TokenKind::LBrace)?.pos;
        let mut stmts = vec![];
        while !self.check(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { stmts, pos })
    }

    fn parse_block_or_single(&mut self) -> ParseResult<Block<()>> {
        if self.eat(TokenKind::Colon) {
            let pos = self.peek_pos();
            let stmt = self.parse_stmt()?;
            Ok(Block {
                stmts: vec![stmt],
                pos,
            })
        } else {
            self.parse_block()
        }
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt<()>> {
        let pos = self.peek_pos();
        let kind = match self.peek_kind() {
            TokenKind::Let => self.parse_let()?,
            TokenKind::Const => {
                let c = self.parse_const_decl()?;
                StmtKind::Const {
                    name: c.name,
                    value: c.value,
                }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            _ => {
                let e = self.parse_expr(0)?;
                self.expect_semi()?;
                StmtKind::Expr(e)
            }
        };
        Ok(Stmt { kind, pos })
    }

    fn parse_let(&mut self) -> ParseResult<StmtKind<()>> {
        self.expect(TokenKind::Let)?;
        let mutable = self.eat(TokenKind::QMark);
        let name = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr(0)?;
        self.expect_semi()?;
        Ok(StmtKind::Let {
            name,
            mutable,
            value,
        })
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind<()>> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr(0)?;
        let block = self.parse_block_or_single()?;
        let mut arms = vec![(cond, block)];

        while self.check(TokenKind::Elif) {
            self.advance();
            let cond = self.parse_expr(0)?;
            let block = self.parse_block_or_single()?;
            arms.push((cond, block));
        }

        let else_block = if self.eat(TokenKind::Else) {
            Some(self.parse_block_or_single()?)
        } else {
            None
        };

        Ok(StmtKind::If { arms, else_block })
    }

    fn parse_for_clause(&mut self) -> ParseResult<Stmt<()>> {
        let pos = self.peek_pos();
        if self.check(TokenKind::Let) {
            self.advance();
            let mutable = self.eat(TokenKind::QMark);
            let name = self.expect_ident()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expr(0)?;
            Ok(Stmt {
                kind: StmtKind::Let {
                    name,
                    mutable,
                    value,
                },
                pos,
            })
        } else {
            let e = self.parse_expr(0)?;
            Ok(Stmt {
                kind: StmtKind::Expr(e),
                pos,
            })
        }
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind<()>> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        if self.check(TokenKind::Ident) && self.peek_ahead_kind(1) == TokenKind::In {
            let name = self.expect_ident()?;
            self.expect(TokenKind::In)?;
            let iter = self.parse_expr(0)?;
            self.expect(TokenKind::RParen)?;
            let body = self.parse_block()?;
            return Ok(StmtKind::ForEach { name, iter, body });
        }

        let init = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.expect_semi()?;

        let cond = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr(0)?)
        };
        self.expect_semi()?;

        let step = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.expect(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(StmtKind::ForC {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_return(&mut self) -> ParseResult<StmtKind<()>> {
        self.expect(TokenKind::Return)?;
        if self.check(TokenKind::Semi) {
            self.expect_semi()?;
            return Ok(StmtKind::Return(None));
        }
        let value = self.parse_expr(0)?;
        self.expect_semi()?;
        Ok(StmtKind::Return(Some(value)))
    }

    // --- Pratt expression core (§4.2) ---

    fn binop_info(kind: TokenKind) -> Option<(BinOpKind, u8, bool)> {
        use TokenKind::*;
        Some(match kind {
            Eq => (BinOpKind::Assign, 1, true),
            OrOr => (BinOpKind::Bin(BinaryOp::Or), 2, false),
            AndAnd => (BinOpKind::Bin(BinaryOp::And), 3, false),
            EqEq => (BinOpKind::Bin(BinaryOp::Eq), 4, false),
            NotEq => (BinOpKind::Bin(BinaryOp::Ne), 4, false),
            Lt => (BinOpKind::Bin(BinaryOp::Lt), 5, false),
            Le => (BinOpKind::Bin(BinaryOp::Le), 5, false),
            Gt => (BinOpKind::Bin(BinaryOp::Gt), 5, false),
            Ge => (BinOpKind::Bin(BinaryOp::Ge), 5, false),
            Plus => (BinOpKind::Bin(BinaryOp::Add), 6, false),
            Minus => (BinOpKind::Bin(BinaryOp::Sub), 6, false),
            Star => (BinOpKind::Bin(BinaryOp::Mul), 7, false),
            Slash => (BinOpKind::Bin(BinaryOp::Div), 7, false),
            Percent => (BinOpKind::Bin(BinaryOp::Mod), 7, false),
            _ => return None,
        })
    }

    fn parse_expr(&mut self, min_bp: u8) -> ParseResult<Expr<()>> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, bp, right_assoc)) = Self::binop_info(self.peek_kind()) {
            if bp < min_bp {
                break;
            }
            self.advance();
            let next_min = if right_assoc { bp } else { bp + 1 };
            let rhs = self.parse_expr(next_min)?;
            let pos = lhs.pos.clone();
            lhs = match op {
                BinOpKind::Assign => Expr::new(
                    ExprKind::Assign(Box::new(lhs), Box::new(rhs)),
                    pos,
                    (),
                ),
                BinOpKind::Bin(b) => {
                    Expr::new(ExprKind::Binary(b, Box::new(lhs), Box::new(rhs)), pos, ())
                }
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr<()>> {
        let pos = self.peek_pos();
        match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Not, Box::new(e)), pos, ()))
            }
            TokenKind::Minus => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Neg, Box::new(e)), pos, ()))
            }
            TokenKind::Hash => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Len, Box::new(e)), pos, ()))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr<()>> {
        let mut expr = self.parse_primary()?;
        loop {
            let pos = expr.pos.clone();
            match self.peek_kind() {
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    expr = Expr::new(ExprKind::Call(Box::new(expr), args), pos, ());
                }
                TokenKind::LBracket => {
                    self.advance();
                    let idx = self.parse_expr(0)?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(idx)), pos, ());
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::new(ExprKind::Member(Box::new(expr), name), pos, ());
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Expr<()>>> {
        self.expect(TokenKind::LParen)?;
        let mut args = vec![];
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expr(0)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr<()>> {
        let pos = self.peek_pos();
        match self.peek_kind() {
            TokenKind::Int => {
                let t = self.advance();
                let Some(Literal::Int(v)) = t.literal else {
                    unreachable!("INT token without an integer literal payload")
                };
                Ok(Expr::new(ExprKind::Int(v), pos, ()))
            }
            TokenKind::Float => {
                let t = self.advance();
                let Some(Literal::Float(v)) = t.literal else {
                    unreachable!("FLOAT token without a float literal payload")
                };
                Ok(Expr::new(ExprKind::Float(v), pos, ()))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), pos, ()))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), pos, ()))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, pos, ()))
            }
            TokenKind::Str => {
                let t = self.advance();
                let Some(Literal::Str(parts)) = t.literal else {
                    unreachable!("STR token without a string literal payload")
                };
                let parts = parts
                    .into_iter()
                    .map(|p| match p {
                        crate::token::StringPart::Text(s) => StrPart::Text(s),
                        crate::token::StringPart::Var(name) => StrPart::Var(name, ()),
                    })
                    .collect();
                Ok(Expr::new(ExprKind::Str(parts), pos, ()))
            }
            TokenKind::Ident => {
                let t = self.advance();
                Ok(Expr::new(ExprKind::Ident(t.text), pos, ()))
            }
            TokenKind::LParen => {
                self.advance();
                if self.check(TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::new(ExprKind::Tuple(vec![]), pos, ()));
                }
                let first = self.parse_expr(0)?;
                if self.check(TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.eat(TokenKind::Comma) {
                        if self.check(TokenKind::RParen) {
                            break;
                        }
                        items.push(self.parse_expr(0)?);
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::new(ExprKind::Tuple(items), pos, ()))
                } else {
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::new(ExprKind::Paren(Box::new(first)), pos, ()))
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = vec![];
                while !self.check(TokenKind::RBracket) {
                    items.push(self.parse_expr(0)?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::Array(items), pos, ()))
            }
            TokenKind::Bar => self.parse_lambda(),
            TokenKind::New => {
                self.advance();
                let name = self.expect_ident()?;
                let args = self.parse_call_args()?;
                Ok(Expr::new(ExprKind::New(name, args), pos, ()))
            }
            TokenKind::Match => self.parse_match_expr(),
            other => Err(self.error(format!("expected an expression, got {other:?}"))),
        }
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr<()>> {
        let pos = self.expect(TokenKind::Bar)?.pos;
        let mut params = vec![];
        while !self.check(TokenKind::Bar) {
            let p_pos = self.peek_pos();
            let name = self.expect_ident()?;
            let ty = if self.eat(TokenKind::Eq) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(LambdaParam {
                name,
                ty,
                pos: p_pos,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Bar)?;
        let body = self.parse_expr(0)?;
        Ok(Expr::new(ExprKind::Lambda(params, Box::new(body)), pos, ()))
    }

    fn parse_match_expr(&mut self) -> ParseResult<Expr<()>> {
        let pos = self.expect(TokenKind::Match)?.pos;
        let scrutinee = self.parse_expr(0)?;

        let arms = if self.eat(TokenKind::Colon) {
            vec![self.parse_match_arm()?]
        } else {
            self.expect(TokenKind::LBrace)?;
            let mut arms = vec![];
            while !self.check(TokenKind::RBrace) {
                arms.push(self.parse_match_arm()?);
                self.eat(TokenKind::Semi);
                self.eat(TokenKind::Comma);
            }
            self.expect(TokenKind::RBrace)?;
            arms
        };

        Ok(Expr::new(
            ExprKind::Match(Box::new(scrutinee), arms),
            pos,
            (),
        ))
    }

    fn parse_match_arm(&mut self) -> ParseResult<MatchArm<()>> {
        let pos = self.peek_pos();
        let pattern = self.parse_pattern()?;
        self.expect(TokenKind::FatArrow)?;
        let body = self.parse_expr(0)?;
        Ok(MatchArm { pattern, pos, body })
    }

    fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        match self.peek_kind() {
            TokenKind::Ident if self.current().text == "_" => {
                self.advance();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Ident => Ok(Pattern::Ident(self.advance().text)),
            TokenKind::Int => {
                let t = self.advance();
                let Some(Literal::Int(v)) = t.literal else {
                    unreachable!()
                };
                Ok(Pattern::Int(v))
            }
            TokenKind::Str => {
                let t = self.advance();
                let Some(Literal::Str(parts)) = t.literal else {
                    unreachable!()
                };
                let text = parts
                    .into_iter()
                    .map(|p| match p {
                        crate::token::StringPart::Text(s) => s,
                        crate::token::StringPart::Var(name) => format!("${name}"),
                    })
                    .collect();
                Ok(Pattern::Str(text))
            }
            TokenKind::True => {
                self.advance();
                Ok(Pattern::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Pattern::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Pattern::Null)
            }
            other => Err(self.error(format!("expected a pattern, got {other:?}"))),
        }
    }
}

enum BinOpKind {
    Assign,
    Bin(BinaryOp),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_src(src: &str) -> Module<()> {
        let tokens = Lexer::new("test.e", src).lex().expect("lex");
        parse(tokens, "test", "test.e").expect("parse")
    }

    #[test]
    fn parses_entry_with_void_return() {
        let module = parse_src("entry() (( -- )) { write(\"hi\"); }");
        assert!(module.entry().is_some());
    }

    #[test]
    fn parses_binary_precedence() {
        let module = parse_src("fun f() (( num )) { return 1 + 2 * 3; }");
        let f = module.functions().next().unwrap();
        let StmtKind::Return(Some(expr)) = &f.body.stmts[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary(BinaryOp::Add, _, rhs) = &expr.kind else {
            panic!("expected top-level add");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn parses_sealed_class_with_method() {
        let module = parse_src(
            "pub seal class Box { v = num; fun get(this) (( num )) { return this.v; } }",
        );
        let class = module.classes().next().unwrap();
        assert!(class.sealed);
        assert_eq!(class.visibility, Visibility::Pub);
        assert_eq!(class.methods[0].receiver, Some(false));
    }

    #[test]
    fn parses_foreach_and_cstyle_for() {
        let module = parse_src(
            "fun f() (( -- )) { for (x in [1,2]) {} for (let ?i = 0; i < 1; i = i + 1) {} }",
        );
        let f = module.functions().next().unwrap();
        assert!(matches!(f.body.stmts[0].kind, StmtKind::ForEach { .. }));
        assert!(matches!(f.body.stmts[1].kind, StmtKind::ForC { .. }));
    }

    #[test]
    fn parses_match_expression() {
        let module = parse_src(
            "fun f(x = num) (( string )) { return match x { 0 => \"zero\"; _ => \"other\" }; }",
        );
        let f = module.functions().next().unwrap();
        let StmtKind::Return(Some(expr)) = &f.body.stmts[0].kind else {
            panic!("expected return");
        };
        assert!(matches!(expr.kind, ExprKind::Match(_, _)));
    }
}
