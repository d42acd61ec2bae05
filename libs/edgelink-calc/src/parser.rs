//! Recursive precedence parser emitting a postfix item stack
//!
//! ```text
//! equation :: expr   ( ('==' | '!=' | '>=' | '>' | '<=' | '<') expr )*
//! expr     :: term   ( ('+' | '-' | 'and' | 'or' | 'xor') term )*
//! term     :: factor ( ('*' | '/' | '<<' | '>>') factor )*
//! factor   :: atom   [ '^' factor ]
//! atom     :: ['+' | '-'] ( PI | E | number | func '(' equation ')'
//!                         | '$' name ['.' property] | '(' equation ')' )
//! ```
//!
//! A leading sign belongs to the atom, so `-2^2` is `(-2)^2`.

use std::f64::consts;

use crate::error::{CalcError, Result};
use crate::functions::Function;
use crate::lexer::{Spanned, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    Div,
    Shl,
    Shr,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Number(f64),
    Variable {
        name: String,
        property: Option<String>,
    },
    Negate,
    Binary(BinaryOp),
    Call(Function),
}

pub fn parse(tokens: &[Spanned], source_len: usize) -> Result<Vec<Item>> {
    if tokens.is_empty() {
        return Err(CalcError::syntax(0, "empty formula"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source_len,
        output: Vec::with_capacity(tokens.len()),
    };
    parser.equation()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(CalcError::syntax(
            extra.position,
            format!("unexpected {:?}", extra.token),
        ));
    }
    Ok(parser.output)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
    output: Vec<Item>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        self.pos += 1;
        token
    }

    /// Consume the next token if `select` maps it to an operator
    fn take_op(&mut self, select: fn(&Token) -> Option<BinaryOp>) -> Option<BinaryOp> {
        let op = self.peek().and_then(select)?;
        self.pos += 1;
        Some(op)
    }

    fn equation(&mut self) -> Result<()> {
        self.expr()?;
        while let Some(op) = self.take_op(|t| match t {
            Token::Op("==") => Some(BinaryOp::Eq),
            Token::Op("!=") => Some(BinaryOp::Ne),
            Token::Op(">=") => Some(BinaryOp::Ge),
            Token::Op(">") => Some(BinaryOp::Gt),
            Token::Op("<=") => Some(BinaryOp::Le),
            Token::Op("<") => Some(BinaryOp::Lt),
            _ => None,
        }) {
            self.expr()?;
            self.output.push(Item::Binary(op));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<()> {
        self.term()?;
        while let Some(op) = self.take_op(|t| match t {
            Token::Op("+") => Some(BinaryOp::Add),
            Token::Op("-") => Some(BinaryOp::Sub),
            Token::Ident(word) => match word.as_str() {
                "and" => Some(BinaryOp::And),
                "or" => Some(BinaryOp::Or),
                "xor" => Some(BinaryOp::Xor),
                _ => None,
            },
            _ => None,
        }) {
            self.term()?;
            self.output.push(Item::Binary(op));
        }
        Ok(())
    }

    fn term(&mut self) -> Result<()> {
        self.factor()?;
        while let Some(op) = self.take_op(|t| match t {
            Token::Op("*") => Some(BinaryOp::Mul),
            Token::Op("/") => Some(BinaryOp::Div),
            Token::Op("<<") => Some(BinaryOp::Shl),
            Token::Op(">>") => Some(BinaryOp::Shr),
            _ => None,
        }) {
            self.factor()?;
            self.output.push(Item::Binary(op));
        }
        Ok(())
    }

    fn factor(&mut self) -> Result<()> {
        self.atom()?;
        if self.peek() == Some(&Token::Op("^")) {
            self.pos += 1;
            self.factor()?;
            self.output.push(Item::Binary(BinaryOp::Pow));
        }
        Ok(())
    }

    fn atom(&mut self) -> Result<()> {
        let negate = match self.peek() {
            Some(Token::Op("-")) => {
                self.pos += 1;
                true
            },
            Some(Token::Op("+")) => {
                self.pos += 1;
                false
            },
            _ => false,
        };

        let position = self.position();
        match self.next().cloned() {
            Some(Token::Number(n)) => self.output.push(Item::Number(n)),
            Some(Token::Variable { name, property }) => {
                self.output.push(Item::Variable { name, property })
            },
            Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                let function =
                    Function::from_name(&name).ok_or_else(|| CalcError::unknown_function(&name))?;
                self.pos += 1;
                self.equation()?;
                self.expect_close()?;
                self.output.push(Item::Call(function));
            },
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case("PI") => {
                self.output.push(Item::Number(consts::PI))
            },
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case("E") => {
                self.output.push(Item::Number(consts::E))
            },
            Some(Token::Ident(name)) => {
                return Err(CalcError::syntax(
                    position,
                    format!("unexpected identifier '{}'", name),
                ))
            },
            Some(Token::LParen) => {
                self.equation()?;
                self.expect_close()?;
            },
            Some(other) => {
                return Err(CalcError::syntax(
                    position,
                    format!("unexpected {:?}", other),
                ))
            },
            None => return Err(CalcError::syntax(position, "unexpected end of formula")),
        }

        if negate {
            self.output.push(Item::Negate);
        }
        Ok(())
    }

    fn expect_close(&mut self) -> Result<()> {
        let position = self.position();
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => Err(CalcError::syntax(position, "expected ')'")),
        }
    }
}
