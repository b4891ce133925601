//! Native toolchain: project generation and optional build check

use crate::config::ToolchainConfig;
use crate::error::ToolchainError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Descriptor file the project generator reads
pub const DESCRIPTOR_FILE: &str = "project.yml";

const LOG_TAIL_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    pub exit_code: i32,
    /// Tail of combined stdout and stderr
    pub log: String,
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Regenerate the IDE project from the on-disk descriptor
    async fn generate_project(&self, project_dir: &Path) -> Result<(), ToolchainError>;

    /// Build one scheme for one destination
    async fn build(
        &self,
        project_dir: &Path,
        project_name: &str,
        scheme: &str,
        destination: &str,
    ) -> Result<BuildOutcome, ToolchainError>;
}

fn tail(log: &str) -> String {
    let count = log.chars().count();
    if count <= LOG_TAIL_CHARS {
        return log.to_string();
    }
    log.chars().skip(count - LOG_TAIL_CHARS).collect()
}

pub struct XcodeToolchain {
    pub xcodegen: PathBuf,
    pub xcodebuild: PathBuf,
    pub timeout: Duration,
}

impl XcodeToolchain {
    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            xcodegen: config.xcodegen.clone(),
            xcodebuild: config.xcodebuild.clone(),
            timeout: Duration::from_secs(config.build_timeout_secs),
        }
    }

    async fn run(
        &self,
        binary: &Path,
        args: &[String],
        dir: &Path,
    ) -> Result<(i32, String), ToolchainError> {
        let launch = |source| ToolchainError::Launch {
            binary: binary.display().to_string(),
            source,
        };
        debug!("Running {} {}", binary.display(), args.join(" "));
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(binary)
                .args(args)
                .current_dir(dir)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            launch(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out after {:?}", self.timeout),
            ))
        })?
        .map_err(launch)?;

        let mut log = String::from_utf8_lossy(&output.stdout).to_string();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.code().unwrap_or(-1), log))
    }
}

#[async_trait]
impl Toolchain for XcodeToolchain {
    async fn generate_project(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        let args = vec![
            "generate".to_string(),
            "--spec".to_string(),
            DESCRIPTOR_FILE.to_string(),
            "--quiet".to_string(),
        ];
        let (code, log) = self.run(&self.xcodegen, &args, project_dir).await?;
        if code != 0 {
            return Err(ToolchainError::GenerateFailed {
                code,
                log: tail(&log),
            });
        }
        Ok(())
    }

    async fn build(
        &self,
        project_dir: &Path,
        project_name: &str,
        scheme: &str,
        destination: &str,
    ) -> Result<BuildOutcome, ToolchainError> {
        let args = vec![
            "-project".to_string(),
            format!("{}.xcodeproj", project_name),
            "-scheme".to_string(),
            scheme.to_string(),
            "-destination".to_string(),
            destination.to_string(),
            "-quiet".to_string(),
            "build".to_string(),
            "CODE_SIGNING_ALLOWED=NO".to_string(),
        ];
        let (exit_code, log) = self.run(&self.xcodebuild, &args, project_dir).await?;
        Ok(BuildOutcome {
            success: exit_code == 0,
            exit_code,
            log: tail(&log),
        })
    }
}
