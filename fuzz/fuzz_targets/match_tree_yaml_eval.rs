#![no_main]

use herald_match::{evaluate_match_tree, render_match_trace, MatchNode, TokenSet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(mut node) = serde_yaml::from_str::<MatchNode>(&raw) else {
        return;
    };
    if node.compile_expressions().is_err() {
        return;
    }

    let tokens = TokenSet::from_tokens(&["deploy", "status", "jira", "help"]);
    let first = evaluate_match_tree(&node, &tokens);
    let second = evaluate_match_tree(&node, &tokens);
    assert_eq!(first, second, "evaluation must be deterministic");

    let lines = render_match_trace(&first);
    assert!(!lines.is_empty(), "a trace always renders at least one line");
});
