//! Recursive AND/OR match-tree evaluation over normalized token sets.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::expr::{compile_expression, CompiledExpression, ExpressionError};
use crate::token_set::TokenSet;

/// How a node combines its own literal tokens, and separately its child
/// terms. Rule files omit the field for AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn as_str(self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }
}

/// One node of a rule's boolean condition tree, deserialized from the `on`
/// field of a rule file.
///
/// A node with a compiled expression ignores its tokens and terms entirely;
/// a node with no tokens, no terms and no expression is vacuously satisfied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchNode {
    #[serde(rename = "type")]
    pub combinator: Combinator,
    pub tokens: Vec<String>,
    pub terms: Vec<MatchNode>,
    pub expr: Option<String>,
    #[serde(skip)]
    pub compiled_expr: Option<CompiledExpression>,
}

impl MatchNode {
    /// Compiles this node's expression text and every descendant's, storing
    /// the results on the nodes. Rule ingestion calls this once per loaded
    /// tree; a failure anywhere poisons the whole tree.
    pub fn compile_expressions(&mut self) -> Result<(), ExpressionError> {
        if let Some(expr) = self.expr.as_deref() {
            if !expr.is_empty() {
                self.compiled_expr = Some(compile_expression(expr)?);
            }
        }
        for term in &mut self.terms {
            term.compile_expressions()?;
        }
        Ok(())
    }
}

/// Per-evaluation result tree mirroring the shape of the evaluated nodes.
///
/// Returned to the caller instead of writing satisfaction back into shared
/// nodes, so concurrent dispatch can never corrupt diagnostics. Children
/// skipped by OR short-circuiting (or by a failed literal check) are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTrace {
    pub satisfied: bool,
    pub combinator: Combinator,
    pub immediate_tokens: Vec<String>,
    pub children: Vec<MatchTrace>,
}

/// Decides whether `tokens` satisfies the condition tree rooted at `node`.
///
/// The root trace's `satisfied` is the answer; the rest of the trace exists
/// for troubleshooting match behavior. An expression runtime fault is logged
/// and treated as not satisfied, never propagated.
pub fn evaluate_match_tree(node: &MatchNode, tokens: &TokenSet) -> MatchTrace {
    evaluate_node(node, tokens, 0)
}

fn evaluate_node(node: &MatchNode, tokens: &TokenSet, depth: usize) -> MatchTrace {
    let padding = "  ".repeat(depth);

    if let Some(compiled) = &node.compiled_expr {
        debug!(
            "{padding}checking tokens against expression: {}",
            compiled.source()
        );
        let satisfied = match compiled.evaluate(tokens) {
            Ok(result) => result,
            Err(error) => {
                warn!("unable to run expression on match condition: {error}");
                false
            }
        };
        return MatchTrace {
            satisfied,
            combinator: node.combinator,
            immediate_tokens: node.tokens.clone(),
            children: Vec::new(),
        };
    }

    let any_of = node.combinator == Combinator::Or;
    let mut satisfied = true;
    if !node.tokens.is_empty() {
        satisfied = if any_of {
            tokens.contains_any(&node.tokens)
        } else {
            tokens.contains_all(&node.tokens)
        };
        debug!(
            "{padding}do {} immediate tokens match? {satisfied}",
            if any_of { "any" } else { "all" }
        );
    }

    let mut children = Vec::new();
    if satisfied && !node.terms.is_empty() {
        let mut matched = 0usize;
        for term in &node.terms {
            let child = evaluate_node(term, tokens, depth + 1);
            let child_satisfied = child.satisfied;
            children.push(child);
            if child_satisfied {
                matched += 1;
                if any_of {
                    // one positive term wins, remaining terms stay unevaluated
                    matched = node.terms.len();
                    break;
                }
            }
        }
        satisfied = matched == node.terms.len();
        debug!("{padding}terms satisfied? {satisfied}");
    }

    MatchTrace {
        satisfied,
        combinator: node.combinator,
        immediate_tokens: node.tokens.clone(),
        children,
    }
}

/// Renders an evaluation trace as indented diagnostic lines, one node per
/// line, two spaces of indent per depth.
pub fn render_match_trace(trace: &MatchTrace) -> Vec<String> {
    let mut lines = Vec::new();
    render_trace_lines(trace, 0, &mut lines);
    lines
}

fn render_trace_lines(trace: &MatchTrace, depth: usize, lines: &mut Vec<String>) {
    let padding = "  ".repeat(depth);
    lines.push(format!(
        "{padding}match: {}; type: {}; tokens: [{}]; terms: {}",
        trace.satisfied,
        trace.combinator.as_str(),
        trace.immediate_tokens.join(","),
        trace.children.len()
    ));
    for child in &trace.children {
        render_trace_lines(child, depth + 1, lines);
    }
}
