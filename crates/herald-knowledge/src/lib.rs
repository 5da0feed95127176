//! Declarative knowledge rules loaded from YAML files.
//!
//! A knowledge file pairs a match tree with a markdown prompt and optional
//! links. The loader walks a directory of such files, injects platform
//! context derived from each file's path, compiles any attached boolean
//! expressions, and registers the resulting rules with the dispatcher.

pub mod asset;
pub mod loader;
pub mod platforms;

pub use asset::{knowledge_rule, ChannelContext, KnowledgeAsset};
pub use loader::{discover_rule_files, load_assets, register_knowledge_rules};
pub use platforms::{path_context_expression, path_context_terms, path_context_tokens};
