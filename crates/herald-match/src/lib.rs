//! Tokenization and boolean match-tree evaluation for Herald rules.
//!
//! This crate is the matching core shared by command dispatch and knowledge
//! rules: it splits raw Slack text into tokens, normalizes them into a
//! presence set, and decides whether that set satisfies a nested AND/OR
//! match tree or a compiled boolean expression.

pub mod expr;
pub mod match_tree;
pub mod token_set;
pub mod tokenize;

pub use expr::{compile_expression, CompiledExpression, ExpressionError};
pub use match_tree::{
    evaluate_match_tree, render_match_trace, Combinator, MatchNode, MatchTrace,
};
pub use token_set::TokenSet;
pub use tokenize::tokenize;
