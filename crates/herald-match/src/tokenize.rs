//! Message-text tokenization with optional quote globbing.

use std::sync::OnceLock;

use regex::Regex;

static GLOB_TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn glob_token_pattern() -> &'static Regex {
    GLOB_TOKEN_PATTERN.get_or_init(|| {
        Regex::new(r#""([^"]*?)"|(\S+)"#).expect("glob token pattern must compile")
    })
}

/// Splits `text` into argument tokens.
///
/// With `honor_quotes` set, a double-quoted run becomes a single token with
/// the quotes stripped, so `jira create "fix the thing"` yields three tokens.
/// Without it, the text splits on single spaces and repeated spaces yield
/// empty tokens; knowledge matching relies on that legacy split.
pub fn tokenize(text: &str, honor_quotes: bool) -> Vec<String> {
    if honor_quotes {
        glob_token_pattern()
            .captures_iter(text)
            .map(|captures| match captures.get(1) {
                Some(quoted) => quoted.as_str().to_string(),
                None => captures[2].to_string(),
            })
            .collect()
    } else {
        text.split(' ').map(str::to_string).collect()
    }
}
