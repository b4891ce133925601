use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory new projects are created under
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_bundle_id_prefix")]
    pub bundle_id_prefix: String,

    /// Domain used for app clip associated domains
    #[serde(default = "default_app_clip_domain")]
    pub app_clip_domain: String,

    /// Minimum OS per platform (`ios`, `watchos`, ...)
    #[serde(default)]
    pub deployment_targets: BTreeMap<String, String>,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub toolchain: ToolchainConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    /// Directory holding `<rule_key>.md` guidance files
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,

    /// Usage ledger location; defaults to the user data directory
    #[serde(default)]
    pub usage_ledger: Option<PathBuf>,

    #[serde(default)]
    pub finalize: FinalizeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_model")]
    pub model: String,

    /// Tools allowed during generation passes
    #[serde(default = "default_build_tools")]
    pub tools: Vec<String>,

    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,

    #[serde(default = "default_analysis_turns")]
    pub analysis_turns: u32,

    #[serde(default = "default_plan_turns")]
    pub plan_turns: u32,

    #[serde(default = "default_build_turns")]
    pub build_turns: u32,

    #[serde(default = "default_recovery_turns")]
    pub recovery_turns: u32,

    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    #[serde(default = "default_intent_timeout_sec")]
    pub intent_timeout_sec: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            binary: default_oracle_binary(),
            model: default_model(),
            tools: default_build_tools(),
            permission_mode: default_permission_mode(),
            analysis_turns: default_analysis_turns(),
            plan_turns: default_plan_turns(),
            build_turns: default_build_turns(),
            recovery_turns: default_recovery_turns(),
            timeout_sec: default_timeout_sec(),
            intent_timeout_sec: default_intent_timeout_sec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PipelineConfig {
    /// Upper bound on generate/verify passes
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Build every scheme once the report is complete
    #[serde(default)]
    pub build_check: bool,

    /// Build destination per platform
    #[serde(default = "default_destinations")]
    pub destinations: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            build_check: false,
            destinations: default_destinations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ToolchainConfig {
    #[serde(default = "default_xcodegen")]
    pub xcodegen: PathBuf,

    #[serde(default = "default_xcodebuild")]
    pub xcodebuild: PathBuf,

    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            xcodegen: default_xcodegen(),
            xcodebuild: default_xcodebuild(),
            build_timeout_secs: default_build_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct BackendConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub project_ref: Option<String>,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project_ref: None,
            token_env: default_token_env(),
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FinalizeConfig {
    #[serde(default = "default_true")]
    pub git: bool,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            git: true,
            commit_message: default_commit_message(),
        }
    }
}
