//! Rule registry and first-match dispatch for inbound chat messages.
//!
//! Commands and knowledge assets register [`RuleDescriptor`]s in a single
//! append-only [`RuleRegistry`]. For each inbound message the [`Dispatcher`]
//! scans the registry in registration order, applies every rule's gate
//! policy, and stops at the first rule that produces a non-empty reply.

pub mod allow_list;
pub mod descriptor;
pub mod dispatcher;
pub mod registry;

pub use allow_list::AllowList;
pub use descriptor::{
    ChannelContextRule, DispatchContext, InterestSpec, KnowledgeGates, RuleCallback,
    RuleDescriptor,
};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use registry::RuleRegistry;
