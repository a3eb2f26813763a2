//! Agent module - the tool-calling conversation loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CLI / WS   │────>│  AgentLoop  │────>│ LLMProvider │
//! │  / harness  │     │             │     │  (OpenAI)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                 ┌──────────┴──────────┐
//!                 ▼                     ▼
//!          ┌─────────────┐       ┌─────────────┐
//!          │   Session   │       │    Tools    │
//!          │   Router    │       │  Registry   │
//!          └─────────────┘       └─────────────┘
//! ```
//!
//! A run appends the user message, calls the model with the purpose's system
//! prompt plus session history, executes requested tools and commits each
//! round (assistant message + tool results) atomically.

mod context;
mod r#loop;

pub use context::{
    trim_history, AgentPurpose, ContextBuilder, EVALUATOR_SYSTEM_PROMPT, REGULAR_SYSTEM_PROMPT,
};
pub use r#loop::AgentLoop;
