//! Session management for DocQA.
//!
//! A session is an opaque cookie token mapped to one long-lived value
//! (the gateway stores a conversational agent there). The registry keeps
//! the map bounded by capacity and idle time and runs each value's
//! teardown when it leaves.

pub mod history;
pub mod registry;

pub use history::ConversationHistory;
pub use registry::{EvictionReason, SessionRegistry, SessionResource};
