//! Build orchestration: intent -> analysis -> plan -> scaffold ->
//! generate/verify passes -> finalize

mod finalize;
mod orchestrator;
pub mod passes;
pub mod phase;
pub mod prompts;
pub mod retry;

pub use orchestrator::{BuildRequest, Pipeline, RunResult};
