// File: src/parser.rs
//
// Recursive-descent parser producing `ast::{Expr,Stmt}`. Binary expressions
// use precedence climbing driven by `lexer::precedence`.

use crate::ast::*;
use crate::errors::{GsError, SourceLocation};
use crate::lexer::{tokenize, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, GsError>;

impl Parser {
    pub fn new(source: &str) -> Self {
        Self { tokens: tokenize(source), pos: 0 }
    }

    pub fn parse_program(source: &str) -> PResult<Program> {
        let mut p = Parser::new(source);
        let mut stmts = Vec::new();
        while !p.at(TokenKind::Eof) {
            stmts.push(p.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn loc(&self) -> SourceLocation {
        let t = self.peek();
        SourceLocation::new(t.line, t.column)
    }

    fn at(&self, kind: TokenKind) -> bool {
        *self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(GsError::parse_error(
                format!("expected {:?}, found {:?}", kind, self.peek_kind()),
                self.loc(),
            ))
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if *self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Statement terminators are optional; `;` both ends a statement and
    /// may repeat, and a closing brace/EOF also terminates implicitly.
    fn skip_terminators(&mut self) {
        while self.eat(TokenKind::Semicolon) {}
    }

    // ---- statements ----------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let stmt = match self.peek_kind().clone() {
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Semicolon) || self.at(TokenKind::RBrace) || self.at(TokenKind::Eof)
                {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                Stmt::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                Stmt::Break
            }
            TokenKind::Continue => {
                self.advance();
                Stmt::Continue
            }
            TokenKind::Export => {
                self.advance();
                Stmt::Export(self.parse_expr(0)?)
            }
            TokenKind::LBrace => Stmt::Block(self.parse_block()?),
            _ => self.parse_simple_stmt()?,
        };
        self.skip_terminators();
        Ok(stmt)
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        self.skip_terminators();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr(0)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_block, else_block })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::For)?;

        // for k, v in expr { } / for v in expr { }
        if let TokenKind::Ident(_) = self.peek_kind() {
            let save = self.pos;
            let first = self.parse_ident()?;
            if self.eat(TokenKind::Comma) {
                let second = self.parse_ident()?;
                if self.eat(TokenKind::In) {
                    let iterable = self.parse_expr(0)?;
                    let body = self.parse_block()?;
                    return Ok(Stmt::ForIn { key: Some(first), value: second, iterable, body });
                }
                self.pos = save;
            } else if self.eat(TokenKind::In) {
                let iterable = self.parse_expr(0)?;
                let body = self.parse_block()?;
                return Ok(Stmt::ForIn { key: None, value: first, iterable, body });
            } else {
                self.pos = save;
            }
        }

        if self.at(TokenKind::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::For { init: None, cond: None, post: None, body });
        }

        let init = if self.at(TokenKind::Semicolon) { None } else { Some(Box::new(self.parse_simple_stmt()?)) };
        self.expect(TokenKind::Semicolon)?;
        let cond = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr(0)?) };
        self.expect(TokenKind::Semicolon)?;
        let post = if self.at(TokenKind::LBrace) { None } else { Some(Box::new(self.parse_simple_stmt()?)) };
        let body = self.parse_block()?;
        Ok(Stmt::For { init, cond, post, body })
    }

    fn parse_ident(&mut self) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(GsError::parse_error(format!("expected identifier, found {other:?}"), self.loc())),
        }
    }

    /// Expression-statements, `:=` declarations and assignments — anything
    /// that can also appear as a `for` init/post clause.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        let first = self.parse_expr(0)?;

        if self.at(TokenKind::Define) || self.at(TokenKind::Comma) {
            let mut names = vec![expr_to_ident(&first)?];
            while self.eat(TokenKind::Comma) {
                let e = self.parse_expr(0)?;
                names.push(expr_to_ident(&e)?);
            }
            self.expect(TokenKind::Define)?;
            let mut values = vec![self.parse_expr(0)?];
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_expr(0)?);
            }
            return Ok(Stmt::Define { names, values, loc });
        }

        if let Some(op) = assign_op(self.peek_kind()) {
            self.advance();
            let value = self.parse_expr(0)?;
            let target = expr_to_target(first)?;
            return Ok(Stmt::Assign { target, op, value, loc });
        }

        if self.at(TokenKind::Inc) || self.at(TokenKind::Dec) {
            let is_inc = self.at(TokenKind::Inc);
            self.advance();
            let target = expr_to_target(first)?;
            let value = Expr::IntLit(1);
            let op = Some(if is_inc { BinOpKind::Add } else { BinOpKind::Sub });
            return Ok(Stmt::Assign { target, op, value, loc });
        }

        Ok(Stmt::ExprStmt(first))
    }

    // ---- expressions -----------------------------------------------------

    fn parse_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let prec = crate::lexer::precedence(self.peek_kind());
            if prec == 0 || prec < min_prec.max(1) {
                break;
            }
            let Some(op) = bin_op_kind(self.peek_kind()) else { break };
            self.advance();
            let right = self.parse_expr(prec + 1)?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) };
        }

        if self.eat(TokenKind::Question) {
            let then_expr = self.parse_expr(0)?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_expr(0)?;
            left = Expr::Ternary {
                cond: Box::new(left),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Sub => {
                self.advance();
                Ok(Expr::UnaryOp { op: UnOpKind::Neg, operand: Box::new(self.parse_unary()?) })
            }
            TokenKind::Not => {
                self.advance();
                Ok(Expr::UnaryOp { op: UnOpKind::Not, operand: Box::new(self.parse_unary()?) })
            }
            TokenKind::Xor => {
                self.advance();
                Ok(Expr::UnaryOp { op: UnOpKind::BitNot, operand: Box::new(self.parse_unary()?) })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind().clone() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call { func: Box::new(expr), args };
                }
                TokenKind::Period => {
                    self.advance();
                    let field = self.parse_ident()?;
                    expr = Expr::Selector { object: Box::new(expr), field };
                }
                TokenKind::LBrack => {
                    self.advance();
                    if self.eat(TokenKind::Colon) {
                        let high =
                            if self.at(TokenKind::RBrack) { None } else { Some(Box::new(self.parse_expr(0)?)) };
                        self.expect(TokenKind::RBrack)?;
                        expr = Expr::Slice { object: Box::new(expr), low: None, high };
                        continue;
                    }
                    let first = self.parse_expr(0)?;
                    if self.eat(TokenKind::Colon) {
                        let high =
                            if self.at(TokenKind::RBrack) { None } else { Some(Box::new(self.parse_expr(0)?)) };
                        self.expect(TokenKind::RBrack)?;
                        expr = Expr::Slice { object: Box::new(expr), low: Some(Box::new(first)), high };
                    } else {
                        self.expect(TokenKind::RBrack)?;
                        expr = Expr::Index { object: Box::new(expr), index: Box::new(first) };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<CallArg>> {
        let mut args = Vec::new();
        if self.at(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if self.eat(TokenKind::Ellipsis) {
                args.push(CallArg::Spread(self.parse_expr(0)?));
            } else {
                args.push(CallArg::Single(self.parse_expr(0)?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        match self.peek_kind().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::IntLit(v))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::FloatLit(v))
            }
            TokenKind::Char(v) => {
                self.advance();
                Ok(Expr::CharLit(v))
            }
            TokenKind::Str(v) => {
                self.advance();
                Ok(Expr::StringLit(v))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLit(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLit(false))
            }
            TokenKind::NilLit => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            TokenKind::ErrorKw => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let inner = self.parse_expr(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::ErrorWrap(Box::new(inner)))
            }
            TokenKind::Import => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let name = match self.peek_kind().clone() {
                    TokenKind::Str(s) => {
                        self.advance();
                        s
                    }
                    other => return Err(GsError::parse_error(format!("expected string, found {other:?}"), loc)),
                };
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Import(name))
            }
            TokenKind::Func => self.parse_function_lit(),
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expr(0)?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::LBrack => self.parse_array_lit(),
            TokenKind::LBrace => self.parse_map_lit(),
            other => Err(GsError::parse_error(format!("unexpected token {other:?}"), loc)),
        }
    }

    fn parse_function_lit(&mut self) -> PResult<Expr> {
        self.expect(TokenKind::Func)?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.at(TokenKind::RParen) {
            loop {
                if self.eat(TokenKind::Ellipsis) {
                    variadic = true;
                    params.push(self.parse_ident()?);
                    break;
                }
                params.push(self.parse_ident()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Expr::FunctionLit(FunctionLiteral { params, variadic, body }))
    }

    fn parse_array_lit(&mut self) -> PResult<Expr> {
        self.expect(TokenKind::LBrack)?;
        let mut elements = Vec::new();
        while !self.at(TokenKind::RBrack) {
            if self.eat(TokenKind::Ellipsis) {
                elements.push(ArrayElement::Spread(self.parse_expr(0)?));
            } else {
                elements.push(ArrayElement::Single(self.parse_expr(0)?));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrack)?;
        Ok(Expr::ArrayLit(elements))
    }

    fn parse_map_lit(&mut self) -> PResult<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut elements = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let key = match self.peek_kind().clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    name
                }
                TokenKind::Str(s) => {
                    self.advance();
                    s
                }
                other => return Err(GsError::parse_error(format!("expected map key, found {other:?}"), self.loc())),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr(0)?;
            elements.push(MapElement { key, value });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::MapLit(elements))
    }
}

fn expr_to_ident(e: &Expr) -> PResult<String> {
    match e {
        Expr::Ident(name) => Ok(name.clone()),
        _ => Err(GsError::parse_error("expected identifier".to_string(), SourceLocation::unknown())),
    }
}

fn expr_to_target(e: Expr) -> PResult<AssignTarget> {
    match e {
        Expr::Ident(name) => Ok(AssignTarget::Ident(name)),
        Expr::Index { object, index } => Ok(AssignTarget::Index { object: *object, index: *index }),
        Expr::Selector { object, field } => Ok(AssignTarget::Selector { object: *object, field }),
        _ => Err(GsError::parse_error("invalid assignment target".to_string(), SourceLocation::unknown())),
    }
}

fn assign_op(kind: &TokenKind) -> Option<Option<BinOpKind>> {
    use TokenKind::*;
    Some(match kind {
        Assign => None,
        AddAssign => Some(BinOpKind::Add),
        SubAssign => Some(BinOpKind::Sub),
        MulAssign => Some(BinOpKind::Mul),
        QuoAssign => Some(BinOpKind::Div),
        RemAssign => Some(BinOpKind::Rem),
        AndAssign => Some(BinOpKind::And),
        OrAssign => Some(BinOpKind::Or),
        XorAssign => Some(BinOpKind::Xor),
        ShlAssign => Some(BinOpKind::Shl),
        ShrAssign => Some(BinOpKind::Shr),
        AndNotAssign => Some(BinOpKind::AndNot),
        _ => return None,
    })
}

fn bin_op_kind(kind: &TokenKind) -> Option<BinOpKind> {
    use TokenKind::*;
    Some(match kind {
        Add => BinOpKind::Add,
        Sub => BinOpKind::Sub,
        Mul => BinOpKind::Mul,
        Quo => BinOpKind::Div,
        Rem => BinOpKind::Rem,
        And => BinOpKind::And,
        Or => BinOpKind::Or,
        Xor => BinOpKind::Xor,
        AndNot => BinOpKind::AndNot,
        Shl => BinOpKind::Shl,
        Shr => BinOpKind::Shr,
        LAnd => BinOpKind::LAnd,
        LOr => BinOpKind::LOr,
        Equal => BinOpKind::Equal,
        NotEqual => BinOpKind::NotEqual,
        Less => BinOpKind::Less,
        Greater => BinOpKind::Greater,
        LessEq => BinOpKind::LessEq,
        GreaterEq => BinOpKind::GreaterEq,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_define_and_if() {
        let prog = Parser::parse_program("x := 1\nif x > 0 { x = x - 1 }").unwrap();
        assert_eq!(prog.stmts.len(), 2);
        assert!(matches!(prog.stmts[0], Stmt::Define { .. }));
        assert!(matches!(prog.stmts[1], Stmt::If { .. }));
    }

    #[test]
    fn parses_function_literal_and_call() {
        let prog = Parser::parse_program("add := func(a, b) { return a + b }\nadd(1, 2)").unwrap();
        assert_eq!(prog.stmts.len(), 2);
    }

    #[test]
    fn parses_for_in_with_key_value() {
        let prog = Parser::parse_program("for k, v in m { }").unwrap();
        assert!(matches!(prog.stmts[0], Stmt::ForIn { key: Some(_), .. }));
    }

    #[test]
    fn ternary_binds_looser_than_comparison() {
        let prog = Parser::parse_program("x := a > b ? 1 : 2").unwrap();
        match &prog.stmts[0] {
            Stmt::Define { values, .. } => assert!(matches!(values[0], Expr::Ternary { .. })),
            _ => panic!("expected define"),
        }
    }
}
