//! Interview core: keyword ranking, turn generation, reply evaluation, and
//! the dialogue state machine, plus the HTTP handlers and session registry
//! the serving layer uses.

pub mod evaluator;
pub mod generator;
pub mod handlers;
pub mod history;
pub mod keywords;
pub mod machine;
pub mod prompts;
pub mod registry;
