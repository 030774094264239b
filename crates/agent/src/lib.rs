//! The conversation loop: the heart of Quill.
//!
//! A user message becomes a sequence of model turns:
//!
//! 1. **Build context** (system prompt + display history + the new message)
//! 2. **Stream** a model turn, releasing text to the display at a bounded rate
//! 3. **If tools ran**: feed their results back and loop to step 2
//! 4. **Otherwise** return the answer
//!
//! The loop ends when a turn contains no tool activity, or fails with
//! `ToolLoopExceeded` once the iteration limit is reached.

pub mod context;
pub mod flush;
pub mod orchestrator;
pub mod session;
pub mod transcript;
pub mod turn;

pub use context::to_model_messages;
pub use flush::FlushController;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use session::Session;
pub use transcript::Transcript;
pub use turn::{Reply, ToolFault, TurnError, TurnState};
