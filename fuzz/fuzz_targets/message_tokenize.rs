#![no_main]

use herald_match::tokenize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    // Plain splitting keeps empty tokens, so rejoining restores the input.
    let plain = tokenize(&raw, false);
    assert!(!plain.is_empty(), "plain split always yields a token");
    assert_eq!(plain.join(" "), raw, "plain split must round-trip");

    // Quote-aware tokens are lifted straight out of the input text; quoted
    // groups lose their delimiters but never gain characters.
    let quoted = tokenize(&raw, true);
    for token in &quoted {
        assert!(
            raw.contains(token.as_str()),
            "token `{token}` not present in input"
        );
    }
});
