mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "appforge.yaml";

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            output_dir: default_output_dir(),
            bundle_id_prefix: default_bundle_id_prefix(),
            app_clip_domain: default_app_clip_domain(),
            deployment_targets: BTreeMap::new(),
            oracle: OracleConfig::default(),
            retry: RetryConfig::default(),
            pipeline: PipelineConfig::default(),
            toolchain: ToolchainConfig::default(),
            backend: BackendConfig::default(),
            rules_dir: None,
            usage_ledger: None,
            finalize: FinalizeConfig::default(),
        }
    }
}

fn valid_bundle_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicit file, else `appforge.yaml` if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_passes == 0 {
            return Err(ConfigError::ZeroPasses);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !valid_bundle_prefix(&self.bundle_id_prefix) {
            return Err(ConfigError::InvalidBundlePrefix(
                self.bundle_id_prefix.clone(),
            ));
        }
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.usage_ledger
            .clone()
            .unwrap_or_else(default_ledger_path)
    }

    pub fn destination_for(&self, platform: &str) -> String {
        self.pipeline
            .destinations
            .get(platform)
            .cloned()
            .or_else(|| default_destinations().get(platform).cloned())
            .unwrap_or_else(|| format!("generic/platform={}", platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.max_passes, 6);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.finalize.git);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str(
            "bundle_id_prefix: io.acme\npipeline:\n  max_passes: 4\noracle:\n  model: opus\n",
        )
        .unwrap();
        assert_eq!(config.bundle_id_prefix, "io.acme");
        assert_eq!(config.pipeline.max_passes, 4);
        assert_eq!(config.oracle.model, "opus");
        assert_eq!(config.oracle.permission_mode, "acceptEdits");
        assert_eq!(config.destination_for("ios"), "generic/platform=iOS Simulator");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.max_passes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPasses)));

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAttempts)));

        for prefix in ["", "com..example", "com.exa_mple", ".com"] {
            let mut config = Config::default();
            config.bundle_id_prefix = prefix.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidBundlePrefix(_))),
                "{}",
                prefix
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appforge.yaml");
        std::fs::write(&path, "output_dir: /tmp/apps\nfinalize:\n  git: false\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/apps"));
        assert!(!config.finalize.git);

        let missing = Config::load(&dir.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    }
}
