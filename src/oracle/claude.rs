use super::stream::{StreamAccumulator, StreamEvent};
use super::{GenerateOptions, Oracle, OracleResponse};
use crate::config::OracleConfig;
use crate::error::OracleError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ClaudeOracle {
    pub binary: PathBuf,
    pub permission_mode: String,
}

impl ClaudeOracle {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            permission_mode: config.permission_mode.clone(),
        }
    }

    fn command(&self) -> Command {
        // Plain names are resolved through PATH
        let binary_str = self.binary.to_string_lossy();
        if binary_str.contains('/') || binary_str.contains('\\') {
            Command::new(&self.binary)
        } else {
            Command::new(binary_str.as_ref())
        }
    }

    fn build_prompt(message: &str, options: &GenerateOptions) -> String {
        if options.images.is_empty() {
            return message.to_string();
        }
        let images = options
            .images
            .iter()
            .map(|p| format!("- {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\n\n## Attached images\nRead these reference images before answering:\n{}",
            message, images
        )
    }

    fn args(&self, prompt: &str, options: &GenerateOptions) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            options.model.clone(),
            "--max-turns".to_string(),
            options.max_turns.to_string(),
            "--permission-mode".to_string(),
            self.permission_mode.clone(),
        ];
        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }
        if let Some(system) = &options.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(system.clone());
        }
        if let Some(append) = &options.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(append.clone());
        }
        if let Some(session) = &options.session_id {
            args.push("--resume".to_string());
            args.push(session.clone());
        }
        args
    }
}

#[async_trait]
impl Oracle for ClaudeOracle {
    fn name(&self) -> &'static str {
        "claude_cli"
    }

    async fn generate_streaming(
        &self,
        cancel: &CancellationToken,
        message: &str,
        options: &GenerateOptions,
        on_event: &mut (dyn for<'e> FnMut(&'e StreamEvent) + Send),
    ) -> Result<OracleResponse, OracleError> {
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }

        let prompt = Self::build_prompt(message, options);
        let mut cmd = self.command();
        cmd.current_dir(&options.working_dir)
            .args(self.args(&prompt, options))
            .env_remove("ANTHROPIC_API_KEY")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Spawning {} (model {}, max turns {})",
            self.binary.display(),
            options.model,
            options.max_turns
        );
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().ok_or(OracleError::NoResult)?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut acc = StreamAccumulator::default();
        let mut lines = BufReader::new(stdout).lines();
        let read = async {
            while let Some(line) = lines.next_line().await? {
                for event in acc.push_line(&line) {
                    on_event(&event);
                }
            }
            Ok::<_, std::io::Error>(())
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            r = tokio::time::timeout(options.timeout, read) => Some(r),
        };

        match outcome {
            None => {
                let _ = child.kill().await;
                return Err(OracleError::Cancelled);
            }
            Some(Err(_)) => {
                let _ = child.kill().await;
                return Err(OracleError::Timeout(options.timeout));
            }
            Some(Ok(Err(e))) => return Err(OracleError::Io(e)),
            Some(Ok(Ok(()))) => {}
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() && !acc.has_result() {
            return Err(OracleError::NonZeroExit {
                code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        acc.finish()
    }
}
