use std::path::PathBuf;
use thiserror::Error;

use crate::verify::FileIssue;

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum AppforgeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Usage ledger error: {0}")]
    Usage(#[from] UsageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("pipeline.max_passes must be at least 1")]
    ZeroPasses,

    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("Invalid bundle id prefix '{0}'")]
    InvalidBundlePrefix(String),
}

/// Failures turning oracle text into a validated plan.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("No structured data block found in oracle output")]
    NoStructuredData,

    #[error("Failed to decode plan JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plan declares no files")]
    NoFiles,

    #[error("Unsupported platform '{0}'")]
    UnsupportedPlatform(String),

    #[error("Device family is not meaningful on {platform}")]
    DeviceFamilyNotSupported { platform: String },

    #[error("Extension kind '{kind}' is not allowed on {platform}")]
    ExtensionForbidden { kind: String, platform: String },
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Oracle reported an error: {0}")]
    Reported(String),

    #[error("Oracle produced no result event")]
    NoResult,
}

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Failed to launch '{binary}': {source}")]
    Launch {
        binary: String,
        source: std::io::Error,
    },

    #[error("Project generation failed with exit code {code}: {log}")]
    GenerateFailed { code: i32, log: String },
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk workspace: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Failed to build glob pattern '{pattern}': {source}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend token variable '{0}' is not set")]
    MissingToken(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend rejected statement ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("Failed to read usage ledger '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write usage ledger '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("Failed to run git: {0}")]
    Launch(#[from] std::io::Error),

    #[error("git {step} failed: {stderr}")]
    Git { step: String, stderr: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Oracle error during {phase}: {source}")]
    Oracle {
        phase: &'static str,
        #[source]
        source: OracleError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error(
        "Build incomplete after {passes} passes; unresolved files:\n{}",
        format_unresolved(unresolved)
    )]
    Incomplete {
        passes: u32,
        unresolved: Vec<FileIssue>,
    },

    #[error(
        "Generation stalled at pass {pass} ({valid} valid, previous {previous}); unresolved files:\n{}",
        format_unresolved(unresolved)
    )]
    Stalled {
        pass: u32,
        valid: usize,
        previous: usize,
        unresolved: Vec<FileIssue>,
    },
}

fn format_unresolved(issues: &[FileIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {}: {}", i.path, i.reason))
        .collect::<Vec<_>>()
        .join("\n")
}
