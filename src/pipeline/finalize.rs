use crate::config::FinalizeConfig;
use crate::error::FinalizeError;
use crate::toolchain::Toolchain;
use crate::workspace::Workspace;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

const GITIGNORE: &str = "xcuserdata/\nDerivedData/\nbuild/\n.DS_Store\n";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub regenerated: bool,
    pub committed: bool,
    pub warnings: Vec<String>,
}

async fn git(dir: &Path, step: &str, args: &[&str]) -> Result<(), FinalizeError> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["-c", "user.name=appforge", "-c", "user.email=appforge@localhost"])
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        return Err(FinalizeError::Git {
            step: step.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn commit(ws: &Workspace, message: &str) -> Result<(), FinalizeError> {
    let dir = ws.root();
    if !dir.join(".git").exists() {
        git(dir, "init", &["init", "--quiet"]).await?;
    }
    if !dir.join(".gitignore").exists() {
        ws.write_file(".gitignore", GITIGNORE)
            .map_err(|e| FinalizeError::Git {
                step: "gitignore".to_string(),
                stderr: e.to_string(),
            })?;
    }
    git(dir, "add", &["add", "-A"]).await?;
    git(dir, "commit", &["commit", "--quiet", "--allow-empty", "-m", message]).await
}

/// Best-effort wrap-up; every failure becomes a warning
pub async fn finalize(
    ws: &Workspace,
    project_name: &str,
    toolchain: &dyn Toolchain,
    config: &FinalizeConfig,
) -> FinalizeReport {
    let mut report = FinalizeReport::default();

    let project = ws.path(&format!("{}.xcodeproj", project_name));
    if !project.exists() {
        match toolchain.generate_project(ws.root()).await {
            Ok(()) => report.regenerated = true,
            Err(e) => {
                warn!("Project regeneration failed: {}", e);
                report.warnings.push(e.to_string());
            }
        }
    }

    if config.git {
        match commit(ws, &config.commit_message).await {
            Ok(()) => {
                info!("Committed {}", ws.root().display());
                report.committed = true;
            }
            Err(e) => {
                warn!("Git finalize failed: {}", e);
                report.warnings.push(e.to_string());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolchainError;
    use crate::toolchain::BuildOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingToolchain {
        generated: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl Toolchain for CountingToolchain {
        async fn generate_project(&self, _dir: &Path) -> Result<(), ToolchainError> {
            self.generated.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ToolchainError::GenerateFailed {
                    code: 1,
                    log: "boom".to_string(),
                });
            }
            Ok(())
        }

        async fn build(
            &self,
            _dir: &Path,
            _project: &str,
            _scheme: &str,
            _destination: &str,
        ) -> Result<BuildOutcome, ToolchainError> {
            Ok(BuildOutcome {
                success: true,
                exit_code: 0,
                log: String::new(),
            })
        }
    }

    fn no_git() -> FinalizeConfig {
        FinalizeConfig {
            git: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_regenerates_missing_project() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path());
        let toolchain = CountingToolchain::default();

        let report = finalize(&ws, "Meals", &toolchain, &no_git()).await;
        assert!(report.regenerated);
        assert!(!report.committed);
        assert_eq!(toolchain.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_project_is_left_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Meals.xcodeproj")).unwrap();
        let ws = Workspace::open(dir.path());
        let toolchain = CountingToolchain::default();

        let report = finalize(&ws, "Meals", &toolchain, &no_git()).await;
        assert!(!report.regenerated);
        assert_eq!(toolchain.generated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_become_warnings() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path());
        let toolchain = CountingToolchain {
            fail: true,
            ..Default::default()
        };

        let report = finalize(&ws, "Meals", &toolchain, &no_git()).await;
        assert!(!report.regenerated);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_commits_when_git_available() {
        let has_git = std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success());
        if !has_git {
            return;
        }

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Meals.xcodeproj")).unwrap();
        std::fs::write(dir.path().join("App.swift"), "struct App {}\n").unwrap();
        let ws = Workspace::open(dir.path());

        let report = finalize(&ws, "Meals", &CountingToolchain::default(), &FinalizeConfig::default()).await;
        assert!(report.committed, "{:?}", report.warnings);
        assert!(dir.path().join(".git").exists());
        assert!(dir.path().join(".gitignore").exists());
    }
}
