//! Boolean expression engine for knowledge match trees.
//!
//! Implements the small language attached to rule files through the `expr`
//! field: `and`/`or`/`not`, parentheses, `true`/`false`, and the two
//! set-membership calls `containsAny(tokens, [..])` and
//! `containsAll(tokens, [..])` over the normalized token set. Expressions
//! are compiled once at ingestion and evaluated per message; the engine is
//! side-effect free and stays sealed behind the match-tree node.

use thiserror::Error;

use crate::token_set::TokenSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("unexpected character `{found}` at byte {offset}")]
    UnexpectedCharacter { found: char, offset: usize },
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
}

/// A parsed expression plus its source text, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    source: String,
    root: ExprNode,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against the normalized token set, the expression's only
    /// binding. Function resolution happens here, so an unknown call is a
    /// runtime fault for the owning match node, not a compile failure.
    pub fn evaluate(&self, tokens: &TokenSet) -> Result<bool, ExpressionError> {
        evaluate_node(&self.root, tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprNode {
    Literal(bool),
    Not(Box<ExprNode>),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
    Call { function: String, needles: Vec<String> },
}

fn evaluate_node(node: &ExprNode, tokens: &TokenSet) -> Result<bool, ExpressionError> {
    match node {
        ExprNode::Literal(value) => Ok(*value),
        ExprNode::Not(inner) => Ok(!evaluate_node(inner, tokens)?),
        ExprNode::And(left, right) => {
            Ok(evaluate_node(left, tokens)? && evaluate_node(right, tokens)?)
        }
        ExprNode::Or(left, right) => {
            Ok(evaluate_node(left, tokens)? || evaluate_node(right, tokens)?)
        }
        ExprNode::Call { function, needles } => match function.as_str() {
            "containsAny" => Ok(tokens.contains_any(needles)),
            "containsAll" => Ok(tokens.contains_all(needles)),
            other => Err(ExpressionError::UnknownFunction(other.to_string())),
        },
    }
}

/// Compiles `source` into an evaluable expression. Validates syntax and the
/// `tokens` binding; call names are resolved at evaluation time.
pub fn compile_expression(source: &str) -> Result<CompiledExpression, ExpressionError> {
    let lexed = lex(source)?;
    let mut parser = ExpressionParser {
        tokens: lexed,
        cursor: 0,
    };
    let root = parser.parse_or()?;
    parser.expect_end()?;
    Ok(CompiledExpression {
        source: source.to_string(),
        root,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum LexToken {
    Ident(String),
    Str(String),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
}

fn token_label(token: &LexToken) -> String {
    match token {
        LexToken::Ident(name) => name.clone(),
        LexToken::Str(value) => format!("\"{value}\""),
        LexToken::LeftParen => "(".to_string(),
        LexToken::RightParen => ")".to_string(),
        LexToken::LeftBracket => "[".to_string(),
        LexToken::RightBracket => "]".to_string(),
        LexToken::Comma => ",".to_string(),
    }
}

fn lex(source: &str) -> Result<Vec<LexToken>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let byte = bytes[cursor];
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => cursor += 1,
            b'(' => {
                tokens.push(LexToken::LeftParen);
                cursor += 1;
            }
            b')' => {
                tokens.push(LexToken::RightParen);
                cursor += 1;
            }
            b'[' => {
                tokens.push(LexToken::LeftBracket);
                cursor += 1;
            }
            b']' => {
                tokens.push(LexToken::RightBracket);
                cursor += 1;
            }
            b',' => {
                tokens.push(LexToken::Comma);
                cursor += 1;
            }
            b'"' | b'\'' => {
                let quote = byte;
                let start = cursor;
                cursor += 1;
                let content_start = cursor;
                while cursor < bytes.len() && bytes[cursor] != quote {
                    cursor += 1;
                }
                if cursor >= bytes.len() {
                    return Err(ExpressionError::UnterminatedString { offset: start });
                }
                tokens.push(LexToken::Str(source[content_start..cursor].to_string()));
                cursor += 1;
            }
            _ if byte.is_ascii_alphabetic() || byte == b'_' => {
                let start = cursor;
                while cursor < bytes.len()
                    && (bytes[cursor].is_ascii_alphanumeric() || bytes[cursor] == b'_')
                {
                    cursor += 1;
                }
                tokens.push(LexToken::Ident(source[start..cursor].to_string()));
            }
            _ => {
                let found = source[cursor..]
                    .chars()
                    .next()
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                return Err(ExpressionError::UnexpectedCharacter {
                    found,
                    offset: cursor,
                });
            }
        }
    }

    Ok(tokens)
}

struct ExpressionParser {
    tokens: Vec<LexToken>,
    cursor: usize,
}

impl ExpressionParser {
    fn peek(&self) -> Option<&LexToken> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Result<LexToken, ExpressionError> {
        let token = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.cursor += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &LexToken, label: &'static str) -> Result<(), ExpressionError> {
        let token = self.next()?;
        if &token == expected {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken {
                expected: label,
                found: token_label(&token),
            })
        }
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ExpressionError::UnexpectedToken {
                expected: "end of expression",
                found: token_label(token),
            }),
        }
    }

    fn peek_is_ident(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(LexToken::Ident(name)) if name == keyword)
    }

    fn parse_or(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut node = self.parse_and()?;
        while self.peek_is_ident("or") {
            self.cursor += 1;
            let right = self.parse_and()?;
            node = ExprNode::Or(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut node = self.parse_not()?;
        while self.peek_is_ident("and") {
            self.cursor += 1;
            let right = self.parse_not()?;
            node = ExprNode::And(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_not(&mut self) -> Result<ExprNode, ExpressionError> {
        if self.peek_is_ident("not") {
            self.cursor += 1;
            let inner = self.parse_not()?;
            return Ok(ExprNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ExprNode, ExpressionError> {
        match self.next()? {
            LexToken::LeftParen => {
                let inner = self.parse_or()?;
                self.expect(&LexToken::RightParen, ")")?;
                Ok(inner)
            }
            LexToken::Ident(name) if name == "true" => Ok(ExprNode::Literal(true)),
            LexToken::Ident(name) if name == "false" => Ok(ExprNode::Literal(false)),
            LexToken::Ident(name) => self.parse_call(name),
            other => Err(ExpressionError::UnexpectedToken {
                expected: "`true`, `false`, `(` or a function call",
                found: token_label(&other),
            }),
        }
    }

    fn parse_call(&mut self, function: String) -> Result<ExprNode, ExpressionError> {
        self.expect(&LexToken::LeftParen, "(")?;
        match self.next()? {
            LexToken::Ident(binding) if binding == "tokens" => {}
            other => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "the `tokens` binding",
                    found: token_label(&other),
                })
            }
        }
        self.expect(&LexToken::Comma, ",")?;
        let needles = self.parse_string_list()?;
        self.expect(&LexToken::RightParen, ")")?;
        Ok(ExprNode::Call { function, needles })
    }

    fn parse_string_list(&mut self) -> Result<Vec<String>, ExpressionError> {
        self.expect(&LexToken::LeftBracket, "[")?;
        let mut needles = Vec::new();
        if matches!(self.peek(), Some(LexToken::RightBracket)) {
            self.cursor += 1;
            return Ok(needles);
        }
        loop {
            match self.next()? {
                LexToken::Str(value) => needles.push(value),
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        expected: "a string literal",
                        found: token_label(&other),
                    })
                }
            }
            match self.next()? {
                LexToken::Comma => continue,
                LexToken::RightBracket => break,
                other => {
                    return Err(ExpressionError::UnexpectedToken {
                        expected: "`,` or `]`",
                        found: token_label(&other),
                    })
                }
            }
        }
        Ok(needles)
    }
}
