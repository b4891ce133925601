//! Project workspace on disk
//!
//! One run owns one directory. Everything written here is left in place on
//! failure so a later run (or a human) can pick up from it.

mod project_config;
mod scaffold;

pub use project_config::{ProjectConfig, PROJECT_CONFIG_FILE};
pub use scaffold::{materialize, strip_superseded_placeholders};

use crate::error::WorkspaceError;
use crate::plan::Plan;
use crate::verify::CompletionReport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run state directory inside a project
pub const STATE_DIR: &str = ".appforge";
pub const PLAN_FILE: &str = "plan.json";
pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.md";

/// First of `<name>`, `<name>-2`, `<name>-3`, ... that does not exist yet
pub fn resolve_project_dir(output_dir: &Path, app_name: &str) -> PathBuf {
    let first = output_dir.join(app_name);
    if !first.exists() {
        return first;
    }
    let mut n = 2;
    loop {
        let candidate = output_dir.join(format!("{}-{}", app_name, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Claim a fresh project directory under `output_dir`
    pub fn create(output_dir: &Path, app_name: &str) -> Result<Self, WorkspaceError> {
        let root = resolve_project_dir(output_dir, app_name);
        std::fs::create_dir_all(&root).map_err(|source| WorkspaceError::CreateDir {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Use an existing project directory
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn ensure_dir(&self, rel: &str) -> Result<PathBuf, WorkspaceError> {
        let dir = self.path(rel);
        std::fs::create_dir_all(&dir).map_err(|source| WorkspaceError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Write a file atomically, creating parent directories
    pub fn write_file(&self, rel: &str, contents: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.path(rel);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        std::fs::create_dir_all(&parent).map_err(|source| WorkspaceError::CreateDir {
            path: parent.clone(),
            source,
        })?;

        let write_err = |source| WorkspaceError::Write {
            path: path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(path)
    }

    pub fn read_file(&self, rel: &str) -> Result<String, WorkspaceError> {
        let path = self.path(rel);
        std::fs::read_to_string(&path).map_err(|source| WorkspaceError::Read { path, source })
    }

    pub fn write_json<T: Serialize>(&self, rel: &str, value: &T) -> Result<PathBuf, WorkspaceError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_file(rel, &(json + "\n"))
    }

    pub fn read_json<T: DeserializeOwned>(&self, rel: &str) -> Result<T, WorkspaceError> {
        let content = self.read_file(rel)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn state_file(name: &str) -> String {
        format!("{}/{}", STATE_DIR, name)
    }

    pub fn save_plan(&self, plan: &Plan) -> Result<PathBuf, WorkspaceError> {
        self.write_json(&Self::state_file(PLAN_FILE), plan)
    }

    pub fn load_plan(&self) -> Result<Plan, WorkspaceError> {
        self.read_json(&Self::state_file(PLAN_FILE))
    }

    pub fn save_report(&self, report: &CompletionReport) -> Result<PathBuf, WorkspaceError> {
        self.write_json(&Self::state_file(REPORT_FILE), report)
    }

    pub fn save_summary(&self, markdown: &str) -> Result<PathBuf, WorkspaceError> {
        self.write_file(&Self::state_file(SUMMARY_FILE), markdown)
    }

    pub fn save_project_config(&self, config: &ProjectConfig) -> Result<PathBuf, WorkspaceError> {
        self.write_json(PROJECT_CONFIG_FILE, config)
    }

    pub fn load_project_config(&self) -> Result<ProjectConfig, WorkspaceError> {
        self.read_json(PROJECT_CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Platform;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_project_dir_suffixes() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_project_dir(dir.path(), "Meals"), dir.path().join("Meals"));

        std::fs::create_dir(dir.path().join("Meals")).unwrap();
        assert_eq!(resolve_project_dir(dir.path(), "Meals"), dir.path().join("Meals-2"));

        std::fs::create_dir(dir.path().join("Meals-2")).unwrap();
        assert_eq!(resolve_project_dir(dir.path(), "Meals"), dir.path().join("Meals-3"));
    }

    #[test]
    fn test_create_claims_distinct_dirs() {
        let dir = TempDir::new().unwrap();
        let a = Workspace::create(dir.path(), "Meals").unwrap();
        let b = Workspace::create(dir.path(), "Meals").unwrap();
        assert_ne!(a.root(), b.root());
        assert!(b.root().ends_with("Meals-2"));
    }

    #[test]
    fn test_write_and_read_nested() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path());
        ws.write_file("a/b/c.txt", "hello").unwrap();
        assert_eq!(ws.read_file("a/b/c.txt").unwrap(), "hello");
        ws.write_file("a/b/c.txt", "again").unwrap();
        assert_eq!(ws.read_file("a/b/c.txt").unwrap(), "again");
    }

    #[test]
    fn test_plan_round_trip_through_state_dir() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path());
        let plan = Plan::new("Meals", Platform::Tvos);
        ws.save_plan(&plan).unwrap();
        assert!(dir.path().join(".appforge/plan.json").exists());
        assert_eq!(ws.load_plan().unwrap(), plan);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path());
        assert!(matches!(ws.read_file("nope"), Err(WorkspaceError::Read { .. })));
    }
}
