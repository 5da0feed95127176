#![no_main]

use herald_match::{compile_expression, ExpressionError, TokenSet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(compiled) = compile_expression(&raw) else {
        return;
    };

    // The stored source is the exact text that produced the expression, so
    // compiling it again must succeed.
    let reparsed = match compile_expression(compiled.source()) {
        Ok(expression) => expression,
        Err(error) => panic!("stored source failed to reparse: {error}"),
    };

    let tokens = TokenSet::from_tokens(&["jira", "create", "deploy", "status"]);
    let first = compiled.evaluate(&tokens);
    let second = compiled.evaluate(&tokens);
    assert_eq!(first, second, "evaluation must be deterministic");
    assert_eq!(
        reparsed.evaluate(&tokens),
        first,
        "reparsed source must evaluate identically"
    );

    // Every other fault is rejected at compile time.
    if let Err(error) = first {
        assert!(
            matches!(error, ExpressionError::UnknownFunction(_)),
            "unexpected evaluation fault: {error}"
        );
    }
});
