use crate::dynamic_sql::expr::ast::{CmpOp, Expr};
use crate::dynamic_sql::expr::lexer::{self, Token};
use crate::error::ScriptingError;

/// A small hand-rolled recursive-descent parser over the `logos` token
/// stream (`spec.md` §4.5's expression engine).
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn parse(source: &'a str) -> Result<Expr, ScriptingError> {
        let tokens = lexer::lex(source).map_err(|at| ScriptingError {
            expr: source.to_owned(),
            reason: format!("unrecognized token at byte {at}"),
        })?;
        let mut parser = Self { tokens, pos: 0, source };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(ScriptingError { expr: source.to_owned(), reason: "trailing input".into() });
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn err(&self, reason: impl Into<String>) -> ScriptingError {
        ScriptingError { expr: self.source.to_owned(), reason: reason.into() }
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptingError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptingError> {
        let mut lhs = self.not_expr()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.advance();
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptingError> {
        if matches!(self.peek(), Some(Token::Bang)) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptingError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::NotEq,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)))
    }

    /// No arithmetic operators beyond unary minus: `spec.md` §4.5 scopes the
    /// expression engine to property navigation, comparison and boolean
    /// combinators, not a general arithmetic language.
    fn additive(&mut self) -> Result<Expr, ScriptingError> {
        self.unary()
    }

    fn unary(&mut self) -> Result<Expr, ScriptingError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ScriptingError> {
        match self.advance() {
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Int(i)) => Ok(Expr::Int(i)),
            Some(Token::Float(f)) => Ok(Expr::Float(f)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.err("expected `)`")),
                }
            }
            Some(Token::Ident(name)) => self.path(name),
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }

    /// Parses the rest of a dotted/indexed path starting after the first
    /// identifier, then an optional trailing `.size()`/`.isEmpty()` call.
    fn path(&mut self, first: String) -> Result<Expr, ScriptingError> {
        let mut path = first;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(name)) => {
                            if matches!(self.peek(), Some(Token::LParen)) {
                                self.advance();
                                if !matches!(self.advance(), Some(Token::RParen)) {
                                    return Err(self.err("only zero-argument method calls are supported"));
                                }
                                return Ok(Expr::MethodCall(Box::new(Expr::Path(path)), name));
                            }
                            path.push('.');
                            path.push_str(&name);
                        }
                        _ => return Err(self.err("expected identifier after `.`")),
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    match self.advance() {
                        Some(Token::Int(i)) => {
                            path.push('[');
                            path.push_str(&i.to_string());
                            path.push(']');
                        }
                        _ => return Err(self.err("expected integer index")),
                    }
                    if !matches!(self.advance(), Some(Token::RBracket)) {
                        return Err(self.err("expected `]`"));
                    }
                }
                _ => break,
            }
        }
        Ok(Expr::Path(path))
    }
}
