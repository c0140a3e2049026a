//! # Recall Agent
//!
//! The interactive loop on top of recall-core:
//! 1. User types a prompt (or `retrieve: <text>` to search memory)
//! 2. The planner asks the backend for a plan, routing arithmetic to the calculator
//! 3. A human confirms or declines the plan
//! 4. A confirmed plan is executed by a second backend call
//! 5. The exchange is written to long-term memory
//!
//! The last few turns travel with each prompt as short-term context.

mod agent;
mod history;
mod planner;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, SEED_DOCUMENTS};
pub use history::{History, Speaker, Turn, CONTEXT_TURNS};
pub use planner::{detect_tool_call, Plan, Planner, SYSTEM_INSTRUCTION};
