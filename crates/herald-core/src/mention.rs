//! Bot-mention detection and stripping helpers.

/// The literal mention markup Slack inserts for a user.
pub fn bot_mention(bot_user_id: &str) -> String {
    format!("<@{bot_user_id}>")
}

pub fn contains_bot_mention(text: &str, bot_user_id: &str) -> bool {
    text.contains(&bot_mention(bot_user_id))
}

/// True when `token` is exactly the bot mention (surrounding whitespace
/// ignored), so argument parsing can drop it wherever it appears.
pub fn is_bot_mention_token(token: &str, bot_user_id: &str) -> bool {
    token.trim() == bot_mention(bot_user_id)
}

/// Removes every occurrence of the bot mention from `text` and trims the
/// remainder.
pub fn strip_bot_mention(text: &str, bot_user_id: &str) -> String {
    text.replace(&bot_mention(bot_user_id), "").trim().to_string()
}
