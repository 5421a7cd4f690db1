//! Top-down Pratt parser: token stream → AST.
//!
//! Statements are terminated by newline tokens (or `;`, which lexes to the
//! same kind). Expression parsing uses the binding-power ladder in
//! [`Precedence`]; assignment and `**` are right-associative, everything
//! else is left-associative. On a parse error the parser records it and
//! resynchronizes at the next statement boundary so later errors in the
//! same file are still discovered; the first error is returned.

use crate::ast::{
    BlockArg, ExprKind, Expression, Param, ParamKind, PrefixOp, Program, Statement, StmtKind,
};
use crate::error::{Error, Result};
use crate::lexer;
use crate::token::{Token, TokenKind};

/// Parse a complete source string into a [`Program`].
pub fn parse(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(tokens).parse_program()
}

/// Expression binding powers, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Assign,
    LogicOr,
    LogicAnd,
    Equals,
    LessGreater,
    Range,
    Sum,
    Product,
    Power,
    Prefix,
    Call,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Assign => Precedence::Assign,
        TokenKind::Or => Precedence::LogicOr,
        TokenKind::And => Precedence::LogicAnd,
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq | TokenKind::Shl => {
            Precedence::LessGreater
        }
        TokenKind::DotDot | TokenKind::DotDotDot => Precedence::Range,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::Pow => Precedence::Power,
        TokenKind::Dot
        | TokenKind::Scope
        | TokenKind::LBracket
        | TokenKind::Incr
        | TokenKind::Decr => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Error>,
    /// Set while parsing a `while` condition: a trailing `do` there closes
    /// the loop header and must not be taken as a block literal.
    no_do_block: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            no_do_block: false,
        }
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn error_at(&self, token: &Token, expected: impl Into<String>) -> Error {
        Error::Parse {
            line: token.line,
            column: token.column,
            expected: expected.into(),
            got: token.to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.current_is(kind) {
            let token = self.current().clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.error_at(&self.current().clone(), expected))
        }
    }

    fn skip_newlines(&mut self) {
        while self.current_is(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Consume the end of a statement: a newline, end of input, or one of
    /// the enclosing construct's closers (left for the caller to consume).
    fn end_statement(&mut self, stops: &[TokenKind]) -> Result<()> {
        let kind = self.current().kind;
        if kind == TokenKind::Newline {
            self.advance();
            Ok(())
        } else if kind == TokenKind::Eof || stops.contains(&kind) {
            Ok(())
        } else {
            Err(self.error_at(&self.current().clone(), "newline"))
        }
    }

    /// Skip forward to the next statement boundary after a parse error.
    fn synchronize(&mut self) {
        while !self.current_is(TokenKind::Eof) {
            if self.current_is(TokenKind::Newline) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_program(mut self) -> Result<Program> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.current_is(TokenKind::Eof) {
            match self.parse_statement(&[]) {
                Ok(statement) => statements.push(statement),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self, stops: &[TokenKind]) -> Result<Statement> {
        let line = self.current().line;
        let kind = match self.current().kind {
            TokenKind::Class => self.parse_class(false)?,
            TokenKind::Module => self.parse_class(true)?,
            TokenKind::Def => self.parse_def()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.starts_expression_here() {
                    Some(self.parse_expression(Precedence::Lowest)?)
                } else {
                    None
                };
                self.end_statement(stops)?;
                StmtKind::Return { value }
            }
            TokenKind::Next => {
                self.advance();
                self.end_statement(stops)?;
                StmtKind::Next
            }
            _ => {
                let expression = self.parse_expression(Precedence::Lowest)?;
                self.end_statement(stops)?;
                StmtKind::Expression(expression)
            }
        };
        Ok(Statement { line, kind })
    }

    fn parse_body(&mut self, stops: &[TokenKind]) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            let kind = self.current().kind;
            if kind == TokenKind::Eof || stops.contains(&kind) {
                return Ok(statements);
            }
            statements.push(self.parse_statement(stops)?);
        }
    }

    fn parse_class(&mut self, is_module: bool) -> Result<StmtKind> {
        self.advance(); // class / module
        let name = self.expect(TokenKind::Constant, "class name")?.literal;

        let superclass = if !is_module && self.current_is(TokenKind::Lt) {
            self.advance();
            Some(self.parse_expression(Precedence::Lowest)?)
        } else {
            None
        };

        self.end_statement(&[])?;
        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(TokenKind::End, "`end`")?;

        if is_module {
            Ok(StmtKind::Module { name, body })
        } else {
            Ok(StmtKind::Class {
                name,
                superclass,
                body,
            })
        }
    }

    fn parse_def(&mut self) -> Result<StmtKind> {
        self.advance(); // def

        let receiver = if self.peek().kind == TokenKind::Dot
            && matches!(
                self.current().kind,
                TokenKind::SelfKw | TokenKind::Constant | TokenKind::Ident
            ) {
            let token = self.current().clone();
            self.advance();
            self.advance(); // .
            let kind = match token.kind {
                TokenKind::SelfKw => ExprKind::SelfRef,
                TokenKind::Constant => ExprKind::Constant(token.literal.clone()),
                _ => ExprKind::Identifier(token.literal.clone()),
            };
            Some(Expression {
                line: token.line,
                kind,
            })
        } else {
            None
        };

        let name = self.parse_method_name()?;
        let params = if self.current_is(TokenKind::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };

        self.end_statement(&[])?;
        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(TokenKind::End, "`end`")?;

        Ok(StmtKind::Def {
            receiver,
            name,
            params,
            body,
        })
    }

    /// Method names: ordinary identifiers (optionally with an adjacent `=`
    /// for writers), operator names, and `[]` / `[]=`.
    fn parse_method_name(&mut self) -> Result<String> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Ident => {
                self.advance();
                let mut name = token.literal.clone();
                if self.current_is(TokenKind::Assign) && self.adjacent_to(&token) {
                    self.advance();
                    name.push('=');
                }
                Ok(name)
            }
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Pow
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq
            | TokenKind::Shl
            | TokenKind::Bang
            | TokenKind::Incr
            | TokenKind::Decr => {
                self.advance();
                Ok(token.literal)
            }
            TokenKind::LBracket => {
                self.advance();
                self.expect(TokenKind::RBracket, "`]`")?;
                if self.current_is(TokenKind::Assign) {
                    self.advance();
                    Ok("[]=".into())
                } else {
                    Ok("[]".into())
                }
            }
            _ => Err(self.error_at(&token, "method name")),
        }
    }

    /// True when the token at the cursor directly follows `token` with no
    /// whitespace (writer-name `=` folding).
    fn adjacent_to(&self, token: &Token) -> bool {
        let current = self.current();
        current.line == token.line
            && current.column == token.column + token.literal.len() as u32
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.advance(); // (
        let mut params = Vec::new();

        if self.current_is(TokenKind::RParen) {
            self.advance();
            return Ok(params);
        }

        loop {
            let param = match self.current().kind {
                TokenKind::Star => {
                    self.advance();
                    let name = self.expect(TokenKind::Ident, "parameter name")?.literal;
                    Param {
                        name,
                        kind: ParamKind::Splat,
                    }
                }
                TokenKind::Amp => {
                    self.advance();
                    let name = self.expect(TokenKind::Ident, "parameter name")?.literal;
                    Param {
                        name,
                        kind: ParamKind::Block,
                    }
                }
                TokenKind::Ident => {
                    let name = self.current().literal.clone();
                    self.advance();
                    if self.current_is(TokenKind::Assign) {
                        self.advance();
                        let default = self.parse_expression(Precedence::Lowest)?;
                        Param {
                            name,
                            kind: ParamKind::Optional(default),
                        }
                    } else if self.current_is(TokenKind::Colon) {
                        self.advance();
                        let default = if self.current_is(TokenKind::Comma)
                            || self.current_is(TokenKind::RParen)
                        {
                            None
                        } else {
                            Some(self.parse_expression(Precedence::Lowest)?)
                        };
                        Param {
                            name,
                            kind: ParamKind::Keyword(default),
                        }
                    } else {
                        Param {
                            name,
                            kind: ParamKind::Normal,
                        }
                    }
                }
                _ => return Err(self.error_at(&self.current().clone(), "parameter")),
            };
            params.push(param);

            if self.current_is(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn parse_while(&mut self) -> Result<StmtKind> {
        self.advance(); // while
        let previous = self.no_do_block;
        self.no_do_block = true;
        let condition = self.parse_expression(Precedence::Lowest);
        self.no_do_block = previous;
        let condition = condition?;

        if self.current_is(TokenKind::Do) {
            self.advance();
        }
        self.end_statement(&[])?;
        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(TokenKind::End, "`end`")?;

        Ok(StmtKind::While { condition, body })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        let mut left = self.parse_prefix()?;
        loop {
            let kind = self.current().kind;
            if kind == TokenKind::Newline || kind == TokenKind::Eof {
                break;
            }
            if precedence >= precedence_of(kind) {
                break;
            }
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        let line = token.line;

        let kind = match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token
                    .literal
                    .parse::<i64>()
                    .map_err(|_| self.error_at(&token, "integer literal in range"))?;
                ExprKind::Integer(value)
            }
            TokenKind::Float => {
                self.advance();
                let value = token
                    .literal
                    .parse::<f64>()
                    .map_err(|_| self.error_at(&token, "float literal"))?;
                ExprKind::Float(value)
            }
            TokenKind::Str => {
                self.advance();
                ExprKind::Str(token.literal)
            }
            TokenKind::Symbol => {
                self.advance();
                ExprKind::Symbol(token.literal)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Boolean(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Boolean(false)
            }
            TokenKind::Nil => {
                self.advance();
                ExprKind::Nil
            }
            TokenKind::SelfKw => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::InstanceVariable => {
                self.advance();
                ExprKind::InstanceVariable(token.literal)
            }
            TokenKind::Constant => {
                self.advance();
                ExprKind::Constant(token.literal)
            }
            TokenKind::Ident => return self.parse_ident_expression(token),
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expression(Precedence::Prefix)?;
                ExprKind::Prefix {
                    operator: PrefixOp::Neg,
                    operand: Box::new(operand),
                }
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expression(Precedence::Prefix)?;
                ExprKind::Prefix {
                    operator: PrefixOp::Not,
                    operand: Box::new(operand),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::RParen, "`)`")?;
                inner.kind
            }
            TokenKind::LBracket => self.parse_array_literal()?,
            TokenKind::LBrace => self.parse_hash_literal()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Yield => {
                self.advance();
                let args = if self.current_is(TokenKind::LParen) {
                    self.parse_paren_args()?
                } else if self.starts_expression_here() {
                    self.parse_parenless_args()?
                } else {
                    Vec::new()
                };
                ExprKind::Yield { args }
            }
            _ => return Err(self.error_at(&token, "expression")),
        };

        Ok(Expression { line, kind })
    }

    /// True when the token at the cursor can begin an expression on the
    /// current line (parenless call arguments, `return` values).
    fn starts_expression_here(&self) -> bool {
        self.current().kind.starts_expression()
    }

    fn parse_ident_expression(&mut self, token: Token) -> Result<Expression> {
        self.advance();
        let line = token.line;

        let has_paren = self.current_is(TokenKind::LParen);
        let has_bare_args =
            self.starts_expression_here() && self.current().line == line;

        if has_paren || has_bare_args {
            let args = if has_paren {
                self.parse_paren_args()?
            } else {
                self.parse_parenless_args()?
            };
            let block = self.parse_optional_block()?;
            return Ok(Expression {
                line,
                kind: ExprKind::Call {
                    receiver: None,
                    method: token.literal,
                    args,
                    block,
                },
            });
        }

        // A trailing block turns a bare identifier into a call.
        if let Some(block) = self.parse_optional_block()? {
            return Ok(Expression {
                line,
                kind: ExprKind::Call {
                    receiver: None,
                    method: token.literal,
                    args: Vec::new(),
                    block: Some(block),
                },
            });
        }

        Ok(Expression {
            line,
            kind: ExprKind::Identifier(token.literal),
        })
    }

    fn parse_array_literal(&mut self) -> Result<ExprKind> {
        self.advance(); // [
        self.skip_newlines();
        let mut elements = Vec::new();
        if !self.current_is(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expression(Precedence::Lowest)?);
                self.skip_newlines();
                if self.current_is(TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "`]`")?;
        Ok(ExprKind::Array(elements))
    }

    fn parse_hash_literal(&mut self) -> Result<ExprKind> {
        self.advance(); // {
        self.skip_newlines();
        let mut pairs = Vec::new();
        if !self.current_is(TokenKind::RBrace) {
            loop {
                let key = self.expect(TokenKind::Ident, "hash key")?.literal;
                self.expect(TokenKind::Colon, "`:`")?;
                let value = self.parse_expression(Precedence::Lowest)?;
                pairs.push((key, value));
                self.skip_newlines();
                if self.current_is(TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(ExprKind::Hash(pairs))
    }

    fn parse_if(&mut self) -> Result<ExprKind> {
        self.advance(); // if / elsif
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.end_statement(&[])?;
        let consequence =
            self.parse_body(&[TokenKind::End, TokenKind::Elsif, TokenKind::Else])?;

        let alternative = match self.current().kind {
            TokenKind::Elsif => {
                let line = self.current().line;
                let nested = self.parse_if()?;
                Some(vec![Statement {
                    line,
                    kind: StmtKind::Expression(Expression { line, kind: nested }),
                }])
            }
            TokenKind::Else => {
                self.advance();
                self.end_statement(&[])?;
                let body = self.parse_body(&[TokenKind::End])?;
                self.expect(TokenKind::End, "`end`")?;
                Some(body)
            }
            _ => {
                self.expect(TokenKind::End, "`end`")?;
                None
            }
        };

        Ok(ExprKind::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    // -----------------------------------------------------------------------
    // Infix expressions
    // -----------------------------------------------------------------------

    fn parse_infix(&mut self, left: Expression) -> Result<Expression> {
        let token = self.current().clone();
        let line = token.line;

        match token.kind {
            TokenKind::Assign => {
                self.advance();
                let value = self.parse_expression(Precedence::Lowest)?;
                self.make_assignment(left, value)
            }
            TokenKind::Dot => self.parse_method_call(left),
            TokenKind::Scope => {
                self.advance();
                let name = self.expect(TokenKind::Constant, "constant name")?.literal;
                Ok(Expression {
                    line,
                    kind: ExprKind::ScopedConstant {
                        scope: Box::new(left),
                        name,
                    },
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::RBracket, "`]`")?;
                Ok(Expression {
                    line,
                    kind: ExprKind::Call {
                        receiver: Some(Box::new(left)),
                        method: "[]".into(),
                        args: vec![index],
                        block: None,
                    },
                })
            }
            TokenKind::Incr | TokenKind::Decr => {
                self.advance();
                Ok(Expression {
                    line,
                    kind: ExprKind::Call {
                        receiver: Some(Box::new(left)),
                        method: token.literal,
                        args: Vec::new(),
                        block: None,
                    },
                })
            }
            TokenKind::DotDot => {
                self.advance();
                let end = self.parse_expression(Precedence::Range)?;
                Ok(Expression {
                    line,
                    kind: ExprKind::Range {
                        start: Box::new(left),
                        end: Box::new(end),
                    },
                })
            }
            TokenKind::DotDotDot => {
                Err(self.error_at(&token, "`..` (exclusive ranges are not supported)"))
            }
            TokenKind::Pow => {
                self.advance();
                // Right-associative: bind the right side one level looser.
                let right = self.parse_expression(Precedence::Product)?;
                Ok(Expression {
                    line,
                    kind: ExprKind::Infix {
                        left: Box::new(left),
                        operator: token.literal,
                        right: Box::new(right),
                    },
                })
            }
            _ => {
                let precedence = precedence_of(token.kind);
                self.advance();
                let right = self.parse_expression(precedence)?;
                Ok(Expression {
                    line,
                    kind: ExprKind::Infix {
                        left: Box::new(left),
                        operator: token.literal,
                        right: Box::new(right),
                    },
                })
            }
        }
    }

    /// Rewrite `left = value` according to the target shape: plain
    /// assignment for names, `x=`/`[]=` sends for attribute and index
    /// targets.
    fn make_assignment(&mut self, left: Expression, value: Expression) -> Result<Expression> {
        let line = left.line;
        match left.kind {
            ExprKind::Identifier(_) | ExprKind::InstanceVariable(_) | ExprKind::Constant(_) => {
                Ok(Expression {
                    line,
                    kind: ExprKind::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                })
            }
            ExprKind::Call {
                receiver: Some(receiver),
                method,
                args,
                block: None,
            } if args.is_empty() => Ok(Expression {
                line,
                kind: ExprKind::Call {
                    receiver: Some(receiver),
                    method: format!("{method}="),
                    args: vec![value],
                    block: None,
                },
            }),
            ExprKind::Call {
                receiver: Some(receiver),
                method,
                mut args,
                block: None,
            } if method == "[]" => {
                args.push(value);
                Ok(Expression {
                    line,
                    kind: ExprKind::Call {
                        receiver: Some(receiver),
                        method: "[]=".into(),
                        args,
                        block: None,
                    },
                })
            }
            _ => Err(Error::Parse {
                line,
                column: 0,
                expected: "assignable target".into(),
                got: "expression".into(),
            }),
        }
    }

    fn parse_method_call(&mut self, receiver: Expression) -> Result<Expression> {
        self.advance(); // .
        let token = self.current().clone();
        let method = match token.kind {
            TokenKind::Ident | TokenKind::Class => {
                self.advance();
                token.literal.clone()
            }
            _ => return Err(self.error_at(&token, "method name")),
        };

        let args = if self.current_is(TokenKind::LParen) {
            self.parse_paren_args()?
        } else if self.starts_expression_here() && self.current().line == token.line {
            self.parse_parenless_args()?
        } else {
            Vec::new()
        };
        let block = self.parse_optional_block()?;

        Ok(Expression {
            line: receiver.line,
            kind: ExprKind::Call {
                receiver: Some(Box::new(receiver)),
                method,
                args,
                block,
            },
        })
    }

    // -----------------------------------------------------------------------
    // Call arguments and blocks
    // -----------------------------------------------------------------------

    fn parse_paren_args(&mut self) -> Result<Vec<Expression>> {
        self.advance(); // (
        self.skip_newlines();
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expression)> = Vec::new();
        let line = self.current().line;

        if !self.current_is(TokenKind::RParen) {
            loop {
                self.parse_arg(&mut args, &mut keywords)?;
                self.skip_newlines();
                if self.current_is(TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;

        if !keywords.is_empty() {
            args.push(Expression {
                line,
                kind: ExprKind::Hash(keywords),
            });
        }
        Ok(args)
    }

    fn parse_parenless_args(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expression)> = Vec::new();
        let line = self.current().line;

        loop {
            self.parse_arg(&mut args, &mut keywords)?;
            if self.current_is(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }

        if !keywords.is_empty() {
            args.push(Expression {
                line,
                kind: ExprKind::Hash(keywords),
            });
        }
        Ok(args)
    }

    /// One argument: either `label: expr` (keyword, collected into a
    /// trailing hash) or an ordinary positional expression. Positionals may
    /// not follow keywords.
    fn parse_arg(
        &mut self,
        args: &mut Vec<Expression>,
        keywords: &mut Vec<(String, Expression)>,
    ) -> Result<()> {
        if self.current_is(TokenKind::Ident) && self.peek().kind == TokenKind::Colon {
            let label = self.current().literal.clone();
            self.advance();
            self.advance(); // :
            let value = self.parse_expression(Precedence::Lowest)?;
            keywords.push((label, value));
            return Ok(());
        }
        if !keywords.is_empty() {
            return Err(self.error_at(
                &self.current().clone(),
                "keyword argument (positional arguments may not follow keywords)",
            ));
        }
        args.push(self.parse_expression(Precedence::Lowest)?);
        Ok(())
    }

    fn parse_optional_block(&mut self) -> Result<Option<BlockArg>> {
        if self.current_is(TokenKind::Do) && !self.no_do_block {
            let line = self.current().line;
            self.advance();
            let params = self.parse_block_params()?;
            let body = self.parse_body(&[TokenKind::End])?;
            self.expect(TokenKind::End, "`end`")?;
            return Ok(Some(BlockArg { line, params, body }));
        }
        if self.current_is(TokenKind::LBrace) {
            let line = self.current().line;
            self.advance();
            let params = self.parse_block_params()?;
            let body = self.parse_body(&[TokenKind::RBrace])?;
            self.expect(TokenKind::RBrace, "`}`")?;
            return Ok(Some(BlockArg { line, params, body }));
        }
        Ok(None)
    }

    fn parse_block_params(&mut self) -> Result<Vec<String>> {
        let mut params = Vec::new();
        if self.current_is(TokenKind::Bar) {
            self.advance();
            loop {
                let name = self.expect(TokenKind::Ident, "block parameter")?.literal;
                params.push(name);
                if self.current_is(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::Bar, "`|`")?;
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).expect("program should parse")
    }

    fn only_expression(program: &Program) -> &ExprKind {
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0].kind {
            StmtKind::Expression(e) => &e.kind,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_operator_precedence() {
        let program = parse_ok("1 + 2 * 3");
        let ExprKind::Infix {
            operator, right, ..
        } = only_expression(&program)
        else {
            panic!("expected infix");
        };
        assert_eq!(operator, "+");
        assert!(matches!(right.kind, ExprKind::Infix { .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse_ok("a = b = 1");
        let ExprKind::Assign { value, .. } = only_expression(&program) else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn parses_class_with_superclass() {
        let program = parse_ok("class Foo < Bar\nend");
        let StmtKind::Class {
            name, superclass, ..
        } = &program.statements[0].kind
        else {
            panic!("expected class");
        };
        assert_eq!(name, "Foo");
        assert!(matches!(
            superclass.as_ref().unwrap().kind,
            ExprKind::Constant(_)
        ));
    }

    #[test]
    fn parses_def_with_parameter_kinds() {
        let program = parse_ok("def m(a, b = 1, *rest, k:, j: 2, &blk)\nend");
        let StmtKind::Def { name, params, .. } = &program.statements[0].kind else {
            panic!("expected def");
        };
        assert_eq!(name, "m");
        let kinds: Vec<_> = params.iter().map(|p| &p.kind).collect();
        assert!(matches!(kinds[0], ParamKind::Normal));
        assert!(matches!(kinds[1], ParamKind::Optional(_)));
        assert!(matches!(kinds[2], ParamKind::Splat));
        assert!(matches!(kinds[3], ParamKind::Keyword(None)));
        assert!(matches!(kinds[4], ParamKind::Keyword(Some(_))));
        assert!(matches!(kinds[5], ParamKind::Block));
    }

    #[test]
    fn parses_singleton_def() {
        let program = parse_ok("def self.bar\n10\nend");
        let StmtKind::Def { receiver, name, .. } = &program.statements[0].kind else {
            panic!("expected def");
        };
        assert_eq!(name, "bar");
        assert!(matches!(
            receiver.as_ref().unwrap().kind,
            ExprKind::SelfRef
        ));
    }

    #[test]
    fn while_do_does_not_take_the_do_as_a_block() {
        let program = parse_ok("while i > a.length do\ni = i - 1\nend");
        let StmtKind::While { condition, body } = &program.statements[0].kind else {
            panic!("expected while");
        };
        assert!(matches!(condition.kind, ExprKind::Infix { .. }));
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn call_with_do_block_attaches_to_call() {
        let program = parse_ok("thread do\nputs(i)\nend");
        let ExprKind::Call { method, block, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(method, "thread");
        assert!(block.is_some());
    }

    #[test]
    fn brace_block_with_params() {
        let program = parse_ok("[1, 2].each { |x| puts(x) }");
        let ExprKind::Call { method, block, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(method, "each");
        assert_eq!(block.as_ref().unwrap().params, vec!["x"]);
    }

    #[test]
    fn namespaced_constant_chain() {
        let program = parse_ok("Foo::Bar::Baz.new.bar");
        let ExprKind::Call { receiver, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        let inner = receiver.as_ref().unwrap();
        let ExprKind::Call { receiver, method, .. } = &inner.kind else {
            panic!("expected inner call");
        };
        assert_eq!(method, "new");
        assert!(matches!(
            receiver.as_ref().unwrap().kind,
            ExprKind::ScopedConstant { .. }
        ));
    }

    #[test]
    fn index_assignment_becomes_index_set_call() {
        let program = parse_ok("a[0] = 5");
        let ExprKind::Call { method, args, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(method, "[]=");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn attribute_assignment_becomes_writer_call() {
        let program = parse_ok("obj.name = \"x\"");
        let ExprKind::Call { method, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(method, "name=");
    }

    #[test]
    fn postfix_increment_is_a_send() {
        let program = parse_ok("i++");
        let ExprKind::Call { method, args, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(method, "++");
        assert!(args.is_empty());
    }

    #[test]
    fn keyword_arguments_collect_into_trailing_hash() {
        let program = parse_ok("m(1, k: 2, j: 3)");
        let ExprKind::Call { args, .. } = only_expression(&program) else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].kind, ExprKind::Hash(_)));
    }

    #[test]
    fn if_elsif_else_chain() {
        let program = parse_ok("if a\n1\nelsif b\n2\nelse\n3\nend");
        let ExprKind::If { alternative, .. } = only_expression(&program) else {
            panic!("expected if");
        };
        let alt = alternative.as_ref().unwrap();
        let StmtKind::Expression(e) = &alt[0].kind else {
            panic!("expected nested if");
        };
        assert!(matches!(e.kind, ExprKind::If { .. }));
    }

    #[test]
    fn lowercase_class_name_is_an_error() {
        let err = parse("class foo\nend").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("class name"));
    }

    #[test]
    fn exclusive_range_is_rejected() {
        let err = parse("1...5").unwrap_err();
        assert!(err.to_string().contains("exclusive"));
    }

    #[test]
    fn recovers_and_reports_first_error() {
        let err = parse("class foo\nend\nclass bar\nend").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }
}
