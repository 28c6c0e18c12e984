//! Core of the streaming tool-calling orchestrator: the turn loop, the
//! in-stream tool-call parser, the tool registry/adapter, the dispatcher,
//! the result cache, and the approval subsystem. The binary crate supplies
//! the concrete LLM transport, terminal renderer, and interactive approver.

pub mod approval;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod message;
pub mod orchestrator;
pub mod parser;
pub mod renderer;
pub mod session;
pub mod signature;
pub mod tools;
pub mod transport;

pub use config::{ConfigPatch, OrchestratorConfig};
pub use error::OrchestratorError;
pub use message::{ConversationHistory, Message, Role};
pub use orchestrator::{Orchestrator, TerminationReason, TurnResult};
pub use session::{OrchestratorState, SessionId};
