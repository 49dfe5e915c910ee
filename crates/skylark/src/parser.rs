//! Recursive-descent parser: token stream → [`ast::Module`].

use crate::ast::*;
use crate::error::{RunResult, SkylarkError};
use crate::token::{Keyword, Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> RunResult<Module> {
    let mut p = Parser { tokens, pos: 0 };
    p.parse_module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> RunResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SkylarkError::syntax(format!(
                "expected {:?}, found {:?} at byte {}",
                kind,
                self.peek(),
                self.peek_span().start
            )))
        }
    }

    fn eat_kw(&mut self, kw: Keyword) -> RunResult<Token> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(SkylarkError::syntax(format!(
                "expected keyword {kw:?}, found {:?} at byte {}",
                self.peek(),
                self.peek_span().start
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn parse_module(&mut self) -> RunResult<Module> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            self.parse_statement_into(&mut statements)?;
            self.skip_newlines();
        }
        Ok(Module { statements })
    }

    fn parse_suite(&mut self) -> RunResult<Vec<Stmt>> {
        if self.check(&TokenKind::Newline) {
            self.advance();
            self.eat(&TokenKind::Indent)?;
            let mut stmts = Vec::new();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::Dedent) {
                    self.advance();
                    break;
                }
                self.parse_statement_into(&mut stmts)?;
            }
            Ok(stmts)
        } else {
            self.parse_simple_stmt_line()
        }
    }

    /// Parses one statement (compound, or one or more `;`-separated simple
    /// statements sharing a line) and appends it/them to `out`.
    fn parse_statement_into(&mut self, out: &mut Vec<Stmt>) -> RunResult<()> {
        match self.peek() {
            TokenKind::Keyword(Keyword::Def) => out.push(self.parse_def()?),
            TokenKind::Keyword(Keyword::If) => out.push(self.parse_if()?),
            TokenKind::Keyword(Keyword::For) => out.push(self.parse_for()?),
            TokenKind::Keyword(Keyword::While) => out.push(self.parse_while()?),
            _ => out.extend(self.parse_simple_stmt_line()?),
        }
        Ok(())
    }

    /// Parses one simple-statement line (possibly several `;`-separated
    /// small statements) and returns them all; used directly by suites and
    /// the module loop which both operate on `Vec<Stmt>`.
    fn parse_simple_stmt_line(&mut self) -> RunResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_stmt()?];
        while self.check(&TokenKind::Semi) {
            self.advance();
            if self.check(&TokenKind::Newline) || self.at_eof() {
                break;
            }
            stmts.push(self.parse_small_stmt()?);
        }
        if self.check(&TokenKind::Newline) {
            self.advance();
        }
        Ok(stmts)
    }

    fn parse_small_stmt(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        match self.peek() {
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.at_stmt_end() {
                    None
                } else {
                    Some(self.parse_testlist_as_expr()?)
                };
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Return(value),
                })
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Break,
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Continue,
                })
            }
            TokenKind::Identifier(name) if name == "pass" => {
                self.advance();
                Ok(Stmt {
                    span: start,
                    kind: StmtKind::Pass,
                })
            }
            TokenKind::Keyword(Keyword::Load) => self.parse_load(),
            _ => self.parse_expr_or_assign(),
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(self.peek(), TokenKind::Newline | TokenKind::Semi | TokenKind::Eof)
    }

    fn parse_load(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance(); // 'load'
        self.eat(&TokenKind::LParen)?;
        let module = self.expect_string_literal()?;
        let mut bindings = Vec::new();
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::RParen) {
                break;
            }
            match self.peek().clone() {
                TokenKind::Str(s) => {
                    self.advance();
                    let ident = Identifier::new(s.clone(), start);
                    bindings.push((ident, s));
                }
                TokenKind::Identifier(name) => {
                    self.advance();
                    self.eat(&TokenKind::Assign)?;
                    let source_name = self.expect_string_literal()?;
                    bindings.push((Identifier::new(name, start), source_name));
                }
                _ => {
                    return Err(SkylarkError::syntax("load() arguments must be string literals or name=\"string\""));
                }
            }
        }
        self.eat(&TokenKind::RParen)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Load { module, bindings },
        })
    }

    fn expect_string_literal(&mut self) -> RunResult<String> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(SkylarkError::syntax("expected string literal")),
        }
    }

    fn parse_expr_or_assign(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        let target = self.parse_testlist_as_expr()?;
        let kind = match self.peek() {
            TokenKind::Assign => {
                self.advance();
                let value = self.parse_testlist_as_expr()?;
                StmtKind::Assign { target, value }
            }
            TokenKind::PlusEq => self.parse_aug(target, BinOp::Add)?,
            TokenKind::MinusEq => self.parse_aug(target, BinOp::Sub)?,
            TokenKind::StarEq => self.parse_aug(target, BinOp::Mul)?,
            TokenKind::SlashEq => self.parse_aug(target, BinOp::Div)?,
            TokenKind::DoubleSlashEq => self.parse_aug(target, BinOp::FloorDiv)?,
            TokenKind::PercentEq => self.parse_aug(target, BinOp::Mod)?,
            TokenKind::PipeEq => self.parse_aug(target, BinOp::BitOr)?,
            TokenKind::AmpEq => self.parse_aug(target, BinOp::BitAnd)?,
            TokenKind::CaretEq => self.parse_aug(target, BinOp::BitXor)?,
            TokenKind::ShlEq => self.parse_aug(target, BinOp::Shl)?,
            TokenKind::ShrEq => self.parse_aug(target, BinOp::Shr)?,
            _ => StmtKind::Expr(target),
        };
        Ok(Stmt { span: start, kind })
    }

    fn parse_aug(&mut self, target: Expr, op: BinOp) -> RunResult<StmtKind> {
        self.advance();
        let value = self.parse_testlist_as_expr()?;
        Ok(StmtKind::AugAssign { target, op, value })
    }

    /// Parses a testlist (comma-separated tests), collapsing to a Tuple if
    /// more than one element or a trailing comma is present. Used anywhere
    /// the grammar allows parenthesis-free tuples: assignment sides, return.
    fn parse_testlist_as_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let first = self.parse_test()?;
        if self.check(&TokenKind::Comma) {
            let mut items = vec![first];
            let mut trailing = false;
            while self.check(&TokenKind::Comma) {
                self.advance();
                trailing = true;
                if self.at_stmt_end() || self.check(&TokenKind::Assign) {
                    break;
                }
                items.push(self.parse_test()?);
                trailing = false;
            }
            let _ = trailing;
            Ok(Expr::new(start, ExprKind::Tuple(items)))
        } else {
            Ok(first)
        }
    }

    fn parse_def(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance();
        let name = self.parse_identifier()?;
        self.eat(&TokenKind::LParen)?;
        let params = self.parse_params(TokenKind::RParen)?;
        self.eat(&TokenKind::RParen)?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Def(Box::new(FunctionDef {
                name,
                params,
                body,
                span: start,
                resolved: None,
            })),
        })
    }

    fn parse_params(&mut self, close: TokenKind) -> RunResult<Vec<Param>> {
        let mut params = Vec::new();
        let mut seen_star = false;
        let mut seen_double_star = false;
        while !self.check(&close) {
            let span = self.peek_span();
            if self.check(&TokenKind::DoubleStar) {
                self.advance();
                let name = self.parse_identifier()?;
                params.push(Param {
                    name,
                    kind: ParamKind::DoubleStar,
                    span,
                });
                seen_double_star = true;
            } else if self.check(&TokenKind::Star) {
                self.advance();
                if self.check(&TokenKind::Comma) || self.check(&close) {
                    params.push(Param {
                        name: Identifier::new("*", span),
                        kind: ParamKind::StarMarker,
                        span,
                    });
                } else {
                    let name = self.parse_identifier()?;
                    params.push(Param {
                        name,
                        kind: ParamKind::Star,
                        span,
                    });
                }
                seen_star = true;
            } else {
                let name = self.parse_identifier()?;
                let default = if self.check(&TokenKind::Assign) {
                    self.advance();
                    Some(self.parse_test()?)
                } else {
                    None
                };
                params.push(Param {
                    name,
                    kind: ParamKind::Normal { default },
                    span,
                });
            }
            let _ = (seen_star, seen_double_star);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn parse_identifier(&mut self) -> RunResult<Identifier> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Identifier::new(name, span))
            }
            TokenKind::Keyword(Keyword::Reserved(word)) if word == "assert" => {
                self.advance();
                Ok(Identifier::new("assert", span))
            }
            other => Err(SkylarkError::syntax(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_if(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance();
        let test = self.parse_test()?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_suite()?;
        let orelse = if self.check_kw(Keyword::Elif) {
            vec![self.parse_if_elif()?]
        } else if self.check_kw(Keyword::Else) {
            self.advance();
            self.eat(&TokenKind::Colon)?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            span: start,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn parse_if_elif(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance(); // elif
        let test = self.parse_test()?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_suite()?;
        let orelse = if self.check_kw(Keyword::Elif) {
            vec![self.parse_if_elif()?]
        } else if self.check_kw(Keyword::Else) {
            self.advance();
            self.eat(&TokenKind::Colon)?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            span: start,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn parse_for(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance();
        let target = self.parse_target_list()?;
        self.eat_kw(Keyword::In)?;
        let iter = self.parse_testlist_no_tuple_for_in()?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::For { target, iter, body },
        })
    }

    /// The iterable to the right of `in` in a `for` statement header
    /// excludes bare (unparenthesized) tuples.
    fn parse_testlist_no_tuple_for_in(&mut self) -> RunResult<Expr> {
        self.parse_or_expr()
    }

    fn parse_target_list(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let first = self.parse_target()?;
        if self.check(&TokenKind::Comma) {
            let mut items = vec![first];
            while self.check(&TokenKind::Comma) {
                self.advance();
                if self.check_kw(Keyword::In) {
                    break;
                }
                items.push(self.parse_target()?);
            }
            Ok(Expr::new(start, ExprKind::Tuple(items)))
        } else {
            Ok(first)
        }
    }

    fn parse_target(&mut self) -> RunResult<Expr> {
        self.parse_or_expr()
    }

    fn parse_while(&mut self) -> RunResult<Stmt> {
        let start = self.peek_span();
        self.advance();
        let test = self.parse_test()?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::While { test, body },
        })
    }

    // ---- Expressions, precedence climbing ----

    fn parse_test(&mut self) -> RunResult<Expr> {
        if self.check_kw(Keyword::Lambda) {
            return self.parse_lambda();
        }
        let start = self.peek_span();
        let body = self.parse_or_test()?;
        if self.check_kw(Keyword::If) {
            self.advance();
            let test = self.parse_or_test()?;
            self.eat_kw(Keyword::Else)?;
            let orelse = self.parse_test()?;
            Ok(Expr::new(
                start,
                ExprKind::Conditional {
                    body: Box::new(body),
                    test: Box::new(test),
                    orelse: Box::new(orelse),
                },
            ))
        } else {
            Ok(body)
        }
    }

    fn parse_lambda(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        self.advance();
        let params = self.parse_params(TokenKind::Colon)?;
        self.eat(&TokenKind::Colon)?;
        let body = self.parse_test()?;
        Ok(Expr::new(
            start,
            ExprKind::Lambda {
                params,
                body: Box::new(body),
                resolved: None,
            },
        ))
    }

    fn parse_or_test(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_and_test()?;
        while self.check_kw(Keyword::Or) {
            self.advance();
            let right = self.parse_and_test()?;
            left = Expr::new(
                start,
                ExprKind::BoolOp {
                    op: BoolOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_and_test(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_not_test()?;
        while self.check_kw(Keyword::And) {
            self.advance();
            let right = self.parse_not_test()?;
            left = Expr::new(
                start,
                ExprKind::BoolOp {
                    op: BoolOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        Ok(left)
    }

    fn parse_not_test(&mut self) -> RunResult<Expr> {
        if self.check_kw(Keyword::Not) {
            let start = self.peek_span();
            self.advance();
            let operand = self.parse_not_test()?;
            return Ok(Expr::new(start, ExprKind::Not(Box::new(operand))));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let left = self.parse_or_expr()?;
        let op = match self.peek() {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Ne => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Le => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Ge => Some(CompareOp::Ge),
            TokenKind::Keyword(Keyword::In) => Some(CompareOp::In),
            TokenKind::Keyword(Keyword::Not) => {
                // `not in`
                let save = self.pos;
                self.advance();
                if self.check_kw(Keyword::In) {
                    self.advance();
                    let right = self.parse_or_expr()?;
                    return Ok(Expr::new(
                        start,
                        ExprKind::Compare {
                            op: CompareOp::NotIn,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    ));
                }
                self.pos = save;
                None
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_or_expr()?;
            // Non-associative: do not loop for further comparisons.
            if matches!(
                self.peek(),
                TokenKind::Eq
                    | TokenKind::Ne
                    | TokenKind::Lt
                    | TokenKind::Le
                    | TokenKind::Gt
                    | TokenKind::Ge
                    | TokenKind::Keyword(Keyword::In)
            ) {
                return Err(SkylarkError::syntax("comparison operators are non-associative"));
            }
            Ok(Expr::new(
                start,
                ExprKind::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ))
        } else {
            Ok(left)
        }
    }

    fn parse_or_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_xor_expr()?;
        while self.check(&TokenKind::Pipe) {
            self.advance();
            let right = self.parse_xor_expr()?;
            left = bin(start, BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_xor_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_and_expr()?;
        while self.check(&TokenKind::Caret) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = bin(start, BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_shift_expr()?;
        while self.check(&TokenKind::Amp) {
            self.advance();
            let right = self.parse_shift_expr()?;
            left = bin(start, BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_arith_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_arith_expr()?;
            left = bin(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_arith_expr(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = bin(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = bin(start, op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let op = match self.peek() {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_factor()?;
            Ok(Expr::new(
                start,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ))
        } else {
            self.parse_power()
        }
    }

    fn parse_power(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let base = self.parse_primary()?;
        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            let exp = self.parse_factor()?;
            Ok(bin(start, BinOp::Pow, base, exp))
        } else {
            Ok(base)
        }
    }

    fn parse_primary(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.parse_identifier()?;
                    expr = Expr::new(
                        start,
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arglist()?;
                    self.eat(&TokenKind::RParen)?;
                    expr = Expr::new(
                        start,
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(start, expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_subscript(&mut self, start: Span, value: Expr) -> RunResult<Expr> {
        // index or slice: `[` (test)? (':' (test)? (':' (test)?)? )? `]`
        let mut start_bound = None;
        if !self.check(&TokenKind::Colon) {
            start_bound = Some(self.parse_test()?);
        }
        if self.check(&TokenKind::Colon) {
            self.advance();
            let mut stop = None;
            if !self.check(&TokenKind::Colon) && !self.check(&TokenKind::RBracket) {
                stop = Some(self.parse_test()?);
            }
            let mut step = None;
            if self.check(&TokenKind::Colon) {
                self.advance();
                if !self.check(&TokenKind::RBracket) {
                    step = Some(self.parse_test()?);
                }
            }
            self.eat(&TokenKind::RBracket)?;
            Ok(Expr::new(
                start,
                ExprKind::Slice {
                    value: Box::new(value),
                    start: start_bound.map(Box::new),
                    stop: stop.map(Box::new),
                    step: step.map(Box::new),
                },
            ))
        } else {
            self.eat(&TokenKind::RBracket)?;
            let index = start_bound.ok_or_else(|| SkylarkError::syntax("expected index expression"))?;
            Ok(Expr::new(
                start,
                ExprKind::Index {
                    value: Box::new(value),
                    index: Box::new(index),
                },
            ))
        }
    }

    fn parse_arglist(&mut self) -> RunResult<Vec<Argument>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::DoubleStar) {
                self.advance();
                args.push(Argument::DoubleStar(self.parse_test()?));
            } else if self.check(&TokenKind::Star) {
                self.advance();
                args.push(Argument::Star(self.parse_test()?));
            } else if let TokenKind::Identifier(name) = self.peek().clone() {
                let save = self.pos;
                self.advance();
                if self.check(&TokenKind::Assign) {
                    self.advance();
                    let value = self.parse_test()?;
                    args.push(Argument::Named(name, value));
                } else {
                    self.pos = save;
                    args.push(Argument::Positional(self.parse_test()?));
                }
            } else {
                args.push(Argument::Positional(self.parse_test()?));
            }
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_atom(&mut self) -> RunResult<Expr> {
        let start = self.peek_span();
        match self.peek().clone() {
            TokenKind::Keyword(Keyword::Reserved(word)) if word == "assert" => {
                self.advance();
                Ok(Expr::new(
                    start,
                    ExprKind::Identifier(Identifier::new("assert", start)),
                ))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                let is_true = name == "True";
                let is_false = name == "False";
                let is_none = name == "None";
                if is_true {
                    Ok(Expr::new(start, ExprKind::Bool(true)))
                } else if is_false {
                    Ok(Expr::new(start, ExprKind::Bool(false)))
                } else if is_none {
                    Ok(Expr::new(start, ExprKind::None))
                } else {
                    Ok(Expr::new(start, ExprKind::Identifier(Identifier::new(name, start))))
                }
            }
            TokenKind::Int(text) => {
                self.advance();
                Ok(Expr::new(start, ExprKind::Int(text)))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::new(start, ExprKind::Float(v)))
            }
            TokenKind::Str(s) => {
                self.advance();
                let mut combined = s;
                // Adjacent string literal concatenation.
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.advance();
                    combined.push_str(&next);
                }
                Ok(Expr::new(start, ExprKind::Str(combined)))
            }
            TokenKind::LParen => {
                self.advance();
                if self.check(&TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::new(start, ExprKind::Tuple(Vec::new())));
                }
                let first = self.parse_test()?;
                if self.check(&TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        if self.check(&TokenKind::RParen) {
                            break;
                        }
                        items.push(self.parse_test()?);
                    }
                    self.eat(&TokenKind::RParen)?;
                    Ok(Expr::new(start, ExprKind::Tuple(items)))
                } else {
                    self.eat(&TokenKind::RParen)?;
                    Ok(first)
                }
            }
            TokenKind::LBracket => self.parse_list_display(start),
            TokenKind::LBrace => self.parse_dict_or_set_display(start),
            other => Err(SkylarkError::syntax(format!("unexpected token {other:?} at byte {}", start.start))),
        }
    }

    fn parse_list_display(&mut self, start: Span) -> RunResult<Expr> {
        self.advance();
        if self.check(&TokenKind::RBracket) {
            self.advance();
            return Ok(Expr::new(start, ExprKind::List(Vec::new())));
        }
        let first = self.parse_test()?;
        if self.check_kw(Keyword::For) {
            let clauses = self.parse_comp_clauses()?;
            self.eat(&TokenKind::RBracket)?;
            return Ok(Expr::new(
                start,
                ExprKind::ListComp {
                    expr: Box::new(first),
                    clauses,
                    resolved: None,
                },
            ));
        }
        let mut items = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.eat(&TokenKind::RBracket)?;
        Ok(Expr::new(start, ExprKind::List(items)))
    }

    fn parse_dict_or_set_display(&mut self, start: Span) -> RunResult<Expr> {
        self.advance();
        if self.check(&TokenKind::RBrace) {
            self.advance();
            return Ok(Expr::new(start, ExprKind::Dict(Vec::new())));
        }
        let first_key = self.parse_test()?;
        if self.check(&TokenKind::Colon) {
            self.advance();
            let first_value = self.parse_test()?;
            if self.check_kw(Keyword::For) {
                let clauses = self.parse_comp_clauses()?;
                self.eat(&TokenKind::RBrace)?;
                return Ok(Expr::new(
                    start,
                    ExprKind::DictComp {
                        key: Box::new(first_key),
                        value: Box::new(first_value),
                        clauses,
                        resolved: None,
                    },
                ));
            }
            let mut pairs = vec![(first_key, first_value)];
            while self.check(&TokenKind::Comma) {
                self.advance();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let k = self.parse_test()?;
                self.eat(&TokenKind::Colon)?;
                let v = self.parse_test()?;
                pairs.push((k, v));
            }
            self.eat(&TokenKind::RBrace)?;
            Ok(Expr::new(start, ExprKind::Dict(pairs)))
        } else if self.check_kw(Keyword::For) {
            let clauses = self.parse_comp_clauses()?;
            self.eat(&TokenKind::RBrace)?;
            Ok(Expr::new(
                start,
                ExprKind::SetComp {
                    expr: Box::new(first_key),
                    clauses,
                    resolved: None,
                },
            ))
        } else {
            let mut items = vec![first_key];
            while self.check(&TokenKind::Comma) {
                self.advance();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                items.push(self.parse_test()?);
            }
            self.eat(&TokenKind::RBrace)?;
            Ok(Expr::new(start, ExprKind::Set(items)))
        }
    }

    fn parse_comp_clauses(&mut self) -> RunResult<Vec<CompClause>> {
        let mut clauses = Vec::new();
        loop {
            if self.check_kw(Keyword::For) {
                self.advance();
                let target = self.parse_target_list()?;
                self.eat_kw(Keyword::In)?;
                let iter = self.parse_or_test()?;
                let mut ifs = Vec::new();
                while self.check_kw(Keyword::If) {
                    self.advance();
                    ifs.push(self.parse_or_test()?);
                }
                clauses.push(CompClause { target, iter, ifs });
            } else {
                break;
            }
        }
        Ok(clauses)
    }
}

fn bin(span: Span, op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(
        span,
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}
