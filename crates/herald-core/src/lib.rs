//! Shared contract types for Herald: the inbound message model, outbound
//! reply payloads with their routing directives, the transport gateway
//! trait, and bot-mention helpers.

pub mod gateway;
pub mod mention;
pub mod message;
pub mod reply;

pub use gateway::{ChatGateway, PostedMessage, ThreadMessage};
pub use mention::{bot_mention, contains_bot_mention, is_bot_mention_token, strip_bot_mention};
pub use message::{ChatMessage, MessageKind};
pub use reply::{MessageFragment, ReplyPayload, RouteDirective};
