/*!
Recursive‑descent parser: token slice → statement list.

Time & Space
------------
* **n** = number of tokens (including the sole EOF).
* Each token is consumed once via `advance()`, so parsing is **Θ(n)**.
* The tree owns its names and literals; it outlives the token buffer and the
  source text, which the REPL relies on (closures keep `Rc<FunDecl>` alive
  across input lines).

Call‑stack depth grows with syntactic nesting.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths                  | `debug`| Context before returning structured error.|

### Error policy

The first syntax error aborts the rest of the top‑level statement sequence:
statements parsed before it are returned together with the diagnostic.
Exceeding the argument/parameter cap is reported but does not stop parsing.
`break`, `continue`, `return` and `this` are checked against the enclosing
loop / function / class depth here, so the evaluator never sees them out of
place.

--------------------------------------------------------------------------------
Grammar (EBNF)
--------------------------------------------------------------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT "{" method* "}" ;
method         → "fun"? function ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | printStmt | forStmt | whileStmt | ifStmt
               | block | breakStmt | continueStmt | returnStmt ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
breakStmt      → "break" ";" ;
continueStmt   → "continue" ";" ;
returnStmt     → "return" expression? ";" ;
block          → "{" declaration* "}" ;
parameters     → IDENT ( "," IDENT )* ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality  ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → expression ( "," expression )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" ;
```
*/

use std::rc::Rc;

use crate::ast::{
    AssignTarget, BinaryOp, ClassDecl, Expr, ForInit, FunDecl, LiteralValue, ResolvedIdent, Stmt,
    UnaryOp, VarDecl,
};
use crate::error::{Diagnostics, LoxError, Result};
use crate::token::{Literal, Token, TokenType};

use log::{debug, info};

/// Upper bound on call arguments and function parameters.
pub const MAX_ARGS: usize = 255;

/// Top‑level parser over an immutable slice of tokens.
pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,

    loop_depth: usize,
    function_depth: usize,
    class_depth: usize,

    diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.  The slice is expected to end with `EOF`.
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        debug_assert!(
            tokens
                .last()
                .map_or(true, |t| t.token_type == TokenType::EOF),
            "token stream must end with EOF"
        );

        Self {
            tokens,
            current: 0,
            loop_depth: 0,
            function_depth: 0,
            class_depth: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program.
    ///
    /// Returns every statement parsed before the first syntax error, plus all
    /// diagnostics (the aborting error and any non‑fatal ones).
    pub fn parse(mut self) -> (Vec<Stmt>, Diagnostics) {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        if self.tokens.is_empty() {
            return (statements, self.diagnostics);
        }

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    debug!("Parse aborted: {}", e);

                    self.diagnostics.report(e);
                    break;
                }
            }
        }

        info!(
            "Parsed {} statement(s) with {} diagnostic(s)",
            statements.len(),
            self.diagnostics.len()
        );

        (statements, self.diagnostics)
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        debug!("Entering declaration at line {}", self.peek().line);

        if self.matches(TokenType::CLASS) {
            Ok(Stmt::Class(self.class_declaration()?))
        } else if self.matches(TokenType::FUN) {
            Ok(Stmt::Function(Rc::new(self.function()?)))
        } else if self.matches(TokenType::VAR) {
            Ok(Stmt::Var(self.var_declaration()?))
        } else {
            self.statement()
        }
    }

    fn class_declaration(&mut self) -> Result<ClassDecl> {
        self.class_depth += 1;
        let result = self.class_body();
        self.class_depth -= 1;

        result
    }

    fn class_body(&mut self) -> Result<ClassDecl> {
        let line = self.previous().line;
        let name: &Token<'_> = self.consume(TokenType::IDENTIFIER, "Expected class name.")?;

        self.consume(TokenType::LEFT_BRACE, "Expected '{' before class body.")?;

        let mut methods: Vec<Rc<FunDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) {
            if self.is_at_end() {
                return Err(LoxError::parse(
                    self.peek().line,
                    "Expected '}' after class body.",
                ));
            }

            // `fun` before a method name is optional.
            if !self.matches(TokenType::FUN) && !self.check(TokenType::IDENTIFIER) {
                debug!("Non-method content in class '{}'", name.lexeme);

                return Err(LoxError::parse(
                    self.peek().line,
                    "Expected method declaration.",
                ));
            }

            methods.push(Rc::new(self.function()?));
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after class body.")?;

        Ok(ClassDecl {
            name: name.lexeme.to_string(),
            methods,
            line,
        })
    }

    /// `fun` has already been consumed.  A function body is never inside a
    /// loop, whatever surrounds the declaration.
    fn function(&mut self) -> Result<FunDecl> {
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        let result = self.function_body();

        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        result
    }

    fn function_body(&mut self) -> Result<FunDecl> {
        let line = match self.previous().token_type {
            TokenType::FUN => self.previous().line,
            _ => self.peek().line,
        };
        let name: &Token<'_> =
            self.consume(TokenType::IDENTIFIER, "Expected function name after 'fun'.")?;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after function name.")?;

        let mut params: Vec<String> = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() == MAX_ARGS {
                    self.diagnostics.report(LoxError::parse(
                        self.peek().line,
                        format!("Can't have more than {} parameters.", MAX_ARGS),
                    ));
                }

                let param = self.consume(TokenType::IDENTIFIER, "Expected parameter name.")?;
                params.push(param.lexeme.to_string());

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters.")?;
        self.consume(TokenType::LEFT_BRACE, "Expected '{' before function body.")?;

        let body = self.block()?;

        Ok(FunDecl {
            name: name.lexeme.to_string(),
            params,
            body,
            line,
        })
    }

    fn var_declaration(&mut self) -> Result<VarDecl> {
        let line = self.previous().line;
        let name: &Token<'_> = self.consume(TokenType::IDENTIFIER, "Expected variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration.",
        )?;

        Ok(VarDecl {
            name: name.lexeme.to_string(),
            initializer,
            line,
        })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        debug!("Entering statement at line {}", self.peek().line);

        if self.matches(TokenType::FOR) {
            self.looping(Self::for_statement)
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.looping(Self::while_statement)
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::BREAK) {
            self.loop_control("break")
        } else if self.matches(TokenType::CONTINUE) {
            self.loop_control("continue")
        } else if self.matches(TokenType::LEFT_BRACE) {
            let line = self.previous().line;
            Ok(Stmt::Block {
                statements: self.block()?,
                line,
            })
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// Run a loop rule with the loop depth raised for its duration.
    fn looping(&mut self, rule: fn(&mut Self) -> Result<Stmt>) -> Result<Stmt> {
        self.loop_depth += 1;
        let result = rule(self);
        self.loop_depth -= 1;

        result
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let line = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'.")?;

        let initializer = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(ForInit::Var(self.var_declaration()?))
        } else {
            let expr = self.expression()?;
            self.consume(TokenType::SEMICOLON, "Expected ';' after loop initializer.")?;
            Some(ForInit::Expr(expr))
        };

        let condition = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            line,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let line = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition.")?;

        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While {
            condition,
            body,
            line,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let line = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            line,
        })
    }

    fn loop_control(&mut self, keyword: &str) -> Result<Stmt> {
        let line = self.previous().line;

        if self.loop_depth == 0 {
            debug!("'{}' outside of a loop on line {}", keyword, line);

            return Err(LoxError::parse(
                line,
                format!("Can't use '{}' outside of a loop.", keyword),
            ));
        }

        self.consume(
            TokenType::SEMICOLON,
            &format!("Expected ';' after '{}'.", keyword),
        )?;

        if keyword == "break" {
            Ok(Stmt::Break { line })
        } else {
            Ok(Stmt::Continue { line })
        }
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let line = self.previous().line;

        if self.function_depth == 0 {
            return Err(LoxError::parse(line, "Can't return from top-level code."));
        }

        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value.")?;

        Ok(Stmt::Return { value, line })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let line = self.previous().line;
        let expr: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after value.")?;

        Ok(Stmt::Print { expr, line })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        let line = expr.line();

        self.consume(TokenType::SEMICOLON, "Expected ';' after expression.")?;

        Ok(Stmt::Expression { expr, line })
    }

    /// `{` has already been consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals_line = self.previous().line;
            let value: Expr = self.assignment()?;
            let line = expr.line();

            let target = match expr {
                Expr::Variable { ident, .. } => AssignTarget::Variable(ident),

                Expr::Get { object, name, .. } => AssignTarget::Property { object, name },

                _ => {
                    debug!("Invalid assignment target on line {}", equals_line);

                    return Err(LoxError::parse(equals_line, "Invalid assignment target."));
                }
            };

            return Ok(Expr::Assign {
                target,
                value: Box::new(value),
                line,
            });
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        self.binary_tier(&[(TokenType::OR, BinaryOp::Or)], Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        self.binary_tier(&[(TokenType::AND, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_tier(
            &[
                (TokenType::BANG_EQUAL, BinaryOp::NotEqual),
                (TokenType::EQUAL_EQUAL, BinaryOp::Equal),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_tier(
            &[
                (TokenType::GREATER, BinaryOp::Greater),
                (TokenType::GREATER_EQUAL, BinaryOp::GreaterEqual),
                (TokenType::LESS, BinaryOp::Less),
                (TokenType::LESS_EQUAL, BinaryOp::LessEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_tier(
            &[
                (TokenType::MINUS, BinaryOp::Subtract),
                (TokenType::PLUS, BinaryOp::Add),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_tier(
            &[
                (TokenType::STAR, BinaryOp::Multiply),
                (TokenType::SLASH, BinaryOp::Divide),
            ],
            Self::unary,
        )
    }

    /// One left‑associative precedence tier: `operand ( op operand )*`,
    /// folded into a left‑deep tree.
    fn binary_tier(
        &mut self,
        operators: &[(TokenType, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = operand(self)?;

        while let Some(op) = self.match_operator(operators) {
            let right: Expr = operand(self)?;
            let line = expr.line();

            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.matches(TokenType::BANG) {
            Some(UnaryOp::Not)
        } else if self.matches(TokenType::MINUS) {
            Some(UnaryOp::Negate)
        } else {
            None
        };

        if let Some(op) = op {
            let line = self.previous().line;
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
                line,
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: &Token<'_> =
                    self.consume(TokenType::IDENTIFIER, "Expected property name after '.'.")?;
                let line = expr.line();

                expr = Expr::Get {
                    object: Box::new(expr),
                    name: name.lexeme.to_string(),
                    line,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() == MAX_ARGS {
                    self.diagnostics.report(LoxError::parse(
                        self.peek().line,
                        format!("Can't have more than {} arguments.", MAX_ARGS),
                    ));
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments.")?;

        let line = callee.line();

        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
            line,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::FALSE)
            || self.matches(TokenType::TRUE)
            || self.matches(TokenType::NIL)
            || self.matches(TokenType::NUMBER)
            || self.matches(TokenType::STRING)
        {
            let token = self.previous();

            return Ok(Expr::Literal {
                value: literal_value(&token.literal),
                line: token.line,
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            let token = self.previous();

            return Ok(Expr::Variable {
                ident: ResolvedIdent::new(token.lexeme),
                line: token.line,
            });
        }

        if self.matches(TokenType::THIS) {
            let line = self.previous().line;

            if self.class_depth == 0 {
                return Err(LoxError::parse(
                    line,
                    "Can't use 'this' outside of a class method.",
                ));
            }

            return Ok(Expr::This {
                ident: ResolvedIdent::new("this"),
                line,
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let line = self.previous().line;
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;

            return Ok(Expr::Group {
                inner: Box::new(expr),
                line,
            });
        }

        if self.is_at_end() {
            return Err(LoxError::parse(self.peek().line, "Unexpected end of input."));
        }

        Err(LoxError::parse(self.peek().line, "Expected expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    fn match_operator(&mut self, operators: &[(TokenType, BinaryOp)]) -> Option<BinaryOp> {
        let (_, op) = operators
            .iter()
            .find(|(token_type, _)| self.check(*token_type))?;

        self.advance();

        Some(*op)
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token<'a>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        debug!(
            "Expected {:?}, found {:?} on line {}",
            ttype,
            self.peek().token_type,
            self.peek().line
        );

        Err(LoxError::parse(self.peek().line, message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    /// Current token; a stream that lacks its `EOF` keeps returning the last
    /// token instead of running off the end.
    #[inline(always)]
    fn peek(&self) -> &'a Token<'a> {
        let index = self.current.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token<'a> {
        &self.tokens[self.current.saturating_sub(1)]
    }
}

fn literal_value(literal: &Literal) -> LiteralValue {
    match literal {
        Literal::Nil => LiteralValue::Nil,
        Literal::Bool(b) => LiteralValue::Bool(*b),
        Literal::Number(n) => LiteralValue::Number(*n),
        Literal::Str(s) => LiteralValue::Str(s.clone()),
    }
}
