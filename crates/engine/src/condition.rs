use thiserror::Error;
use tracing::warn;

use crate::world::{FlagValue, WorldState};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unexpected character '{character}' at offset {offset}")]
    UnexpectedCharacter { character: char, offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unknown query '{name}' at offset {offset}")]
    UnknownQuery { name: String, offset: usize },
    #[error("query '{name}' expects a single string argument")]
    BadQueryArgument { name: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at offset {offset}")]
    UnexpectedToken { offset: usize },
    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    AndAnd,
    OrOr,
    Bang,
    LParen,
    RParen,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Query {
    Flag(String),
    HasItem(String),
    Visited(String),
    Solved(String),
    Reputation,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(FlagValue),
    Query(Query),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// A parsed boolean condition over world state. The query set is closed:
/// `flag`, `has_item`, `visited`, `solved`, `reputation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    root: Expr,
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ConditionError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut offset = 0usize;

    while offset < chars.len() {
        let character = chars[offset];
        match character {
            ' ' | '\t' | '\r' | '\n' => {
                offset += 1;
            }
            '(' => {
                tokens.push((Token::LParen, offset));
                offset += 1;
            }
            ')' => {
                tokens.push((Token::RParen, offset));
                offset += 1;
            }
            '!' => {
                if chars.get(offset + 1) == Some(&'=') {
                    tokens.push((Token::NotEq, offset));
                    offset += 2;
                } else {
                    tokens.push((Token::Bang, offset));
                    offset += 1;
                }
            }
            '&' => {
                if chars.get(offset + 1) == Some(&'&') {
                    tokens.push((Token::AndAnd, offset));
                    offset += 2;
                } else {
                    return Err(ConditionError::UnexpectedCharacter { character, offset });
                }
            }
            '|' => {
                if chars.get(offset + 1) == Some(&'|') {
                    tokens.push((Token::OrOr, offset));
                    offset += 2;
                } else {
                    return Err(ConditionError::UnexpectedCharacter { character, offset });
                }
            }
            '=' => {
                if chars.get(offset + 1) == Some(&'=') {
                    tokens.push((Token::EqEq, offset));
                    offset += 2;
                } else {
                    return Err(ConditionError::UnexpectedCharacter { character, offset });
                }
            }
            '<' => {
                if chars.get(offset + 1) == Some(&'=') {
                    tokens.push((Token::LessEq, offset));
                    offset += 2;
                } else {
                    tokens.push((Token::Less, offset));
                    offset += 1;
                }
            }
            '>' => {
                if chars.get(offset + 1) == Some(&'=') {
                    tokens.push((Token::GreaterEq, offset));
                    offset += 2;
                } else {
                    tokens.push((Token::Greater, offset));
                    offset += 1;
                }
            }
            '"' | '\'' => {
                let quote = character;
                let start = offset;
                offset += 1;
                let mut value = String::new();
                loop {
                    match chars.get(offset) {
                        Some(&c) if c == quote => {
                            offset += 1;
                            break;
                        }
                        Some(&c) => {
                            value.push(c);
                            offset += 1;
                        }
                        None => return Err(ConditionError::UnterminatedString { offset: start }),
                    }
                }
                tokens.push((Token::Str(value), start));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = offset;
                let mut text = String::new();
                if c == '-' {
                    text.push('-');
                    offset += 1;
                }
                while let Some(&digit) = chars.get(offset) {
                    if digit.is_ascii_digit() || digit == '.' {
                        text.push(digit);
                        offset += 1;
                    } else {
                        break;
                    }
                }
                let number = text.parse::<f64>().map_err(|_| {
                    ConditionError::UnexpectedCharacter {
                        character: c,
                        offset: start,
                    }
                })?;
                tokens.push((Token::Number(number), start));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = offset;
                let mut name = String::new();
                while let Some(&letter) = chars.get(offset) {
                    if letter.is_ascii_alphanumeric() || letter == '_' {
                        name.push(letter);
                        offset += 1;
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(name), start));
            }
            _ => return Err(ConditionError::UnexpectedCharacter { character, offset }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|(_, offset)| *offset)
            .unwrap_or(usize::MAX)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(token, _)| token.clone());
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(ConditionError::UnexpectedToken {
                offset: self.tokens[self.cursor - 1].1,
            }),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Bang) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::Ne,
            Some(Token::Less) => CompareOp::Lt,
            Some(Token::LessEq) => CompareOp::Le,
            Some(Token::Greater) => CompareOp::Gt,
            Some(Token::GreaterEq) => CompareOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Str(value)) => Ok(Expr::Literal(FlagValue::Text(value))),
            Some(Token::Number(value)) => Ok(Expr::Literal(FlagValue::Number(value))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(FlagValue::Bool(true))),
                "false" => Ok(Expr::Literal(FlagValue::Bool(false))),
                "reputation" => Ok(Expr::Query(Query::Reputation)),
                "flag" => Ok(Expr::Query(Query::Flag(self.parse_string_argument(&name)?))),
                "has_item" => Ok(Expr::Query(Query::HasItem(
                    self.parse_string_argument(&name)?,
                ))),
                "visited" => Ok(Expr::Query(Query::Visited(
                    self.parse_string_argument(&name)?,
                ))),
                "solved" => Ok(Expr::Query(Query::Solved(
                    self.parse_string_argument(&name)?,
                ))),
                _ => Err(ConditionError::UnknownQuery { name, offset }),
            },
            Some(_) => Err(ConditionError::UnexpectedToken { offset }),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }

    fn parse_string_argument(&mut self, name: &str) -> Result<String, ConditionError> {
        self.expect(Token::LParen)?;
        let value = match self.advance() {
            Some(Token::Str(value)) => value,
            Some(_) | None => {
                return Err(ConditionError::BadQueryArgument {
                    name: name.to_string(),
                })
            }
        };
        self.expect(Token::RParen)?;
        Ok(value)
    }
}

fn eval_expr(expr: &Expr, state: &WorldState) -> FlagValue {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Query(query) => match query {
            Query::Flag(name) => state.flag(name).cloned().unwrap_or(FlagValue::Bool(false)),
            Query::HasItem(item) => FlagValue::Bool(state.has_item(item)),
            Query::Visited(room) => FlagValue::Bool(state.has_visited(room)),
            Query::Solved(puzzle) => FlagValue::Bool(state.is_solved(puzzle)),
            Query::Reputation => FlagValue::Number(state.reputation() as f64),
        },
        Expr::Not(inner) => FlagValue::Bool(!eval_expr(inner, state).truthy()),
        Expr::And(left, right) => FlagValue::Bool(
            eval_expr(left, state).truthy() && eval_expr(right, state).truthy(),
        ),
        Expr::Or(left, right) => FlagValue::Bool(
            eval_expr(left, state).truthy() || eval_expr(right, state).truthy(),
        ),
        Expr::Compare { op, left, right } => {
            let left = eval_expr(left, state);
            let right = eval_expr(right, state);
            FlagValue::Bool(compare_values(*op, &left, &right))
        }
    }
}

fn compare_values(op: CompareOp, left: &FlagValue, right: &FlagValue) -> bool {
    match (left, right) {
        (FlagValue::Text(a), FlagValue::Text(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        },
        _ => {
            let a = left.as_number();
            let b = right.as_number();
            match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
            }
        }
    }
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, cursor: 0 };
        let root = parser.parse_or()?;
        if parser.cursor < parser.tokens.len() {
            return Err(ConditionError::TrailingInput {
                offset: parser.tokens[parser.cursor].1,
            });
        }
        Ok(Self { root })
    }

    pub fn eval(&self, state: &WorldState) -> bool {
        eval_expr(&self.root, state).truthy()
    }
}

/// Evaluates an optional condition source against current state. Empty or
/// whitespace-only sources are vacuously true; malformed sources are
/// logged and treated as false.
pub fn eval_condition_str(source: &str, state: &WorldState) -> bool {
    if source.trim().is_empty() {
        return true;
    }
    match Condition::parse(source) {
        Ok(condition) => condition.eval(state),
        Err(error) => {
            warn!(%source, %error, "condition failed to parse, treating as false");
            false
        }
    }
}

/// Static validation hook: parses without evaluating, reporting the error
/// for malformed or unknown-query sources.
pub fn check_condition_str(source: &str) -> Result<(), ConditionError> {
    if source.trim().is_empty() {
        return Ok(());
    }
    Condition::parse(source).map(|_| ())
}
