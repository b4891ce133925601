//! Oracle client: the external generation service
//!
//! The orchestrator only sees the [`Oracle`] trait. [`ClaudeOracle`] drives
//! the `claude` CLI in stream-json mode.

mod claude;
pub mod stream;

pub use claude::ClaudeOracle;
pub use stream::{EventKind, StreamEvent};

use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Token and cost counters reported by one call (or summed over many)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.cost_usd += other.cost_usd;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_creation_tokens
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Replaces the base system prompt
    pub system_prompt: Option<String>,
    /// Appended to the base system prompt
    pub append_system_prompt: Option<String>,
    pub max_turns: u32,
    pub model: String,
    pub working_dir: PathBuf,
    pub allowed_tools: Vec<String>,
    /// Prior conversation to continue
    pub session_id: Option<String>,
    pub images: Vec<PathBuf>,
    pub timeout: Duration,
}

impl GenerateOptions {
    pub fn new(model: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            system_prompt: None,
            append_system_prompt: None,
            max_turns: 1,
            model: model.into(),
            working_dir: working_dir.into(),
            allowed_tools: Vec::new(),
            session_id: None,
            images: Vec::new(),
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OracleResponse {
    pub text: String,
    pub session_id: Option<String>,
    pub usage: Usage,
    pub turns: Option<u32>,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one request, delivering incremental events to `on_event`
    async fn generate_streaming(
        &self,
        cancel: &CancellationToken,
        message: &str,
        options: &GenerateOptions,
        on_event: &mut (dyn for<'e> FnMut(&'e StreamEvent) + Send),
    ) -> Result<OracleResponse, OracleError>;

    async fn generate(
        &self,
        cancel: &CancellationToken,
        message: &str,
        options: &GenerateOptions,
    ) -> Result<OracleResponse, OracleError> {
        let mut ignore = |_: &StreamEvent| {};
        self.generate_streaming(cancel, message, options, &mut ignore)
            .await
    }
}
