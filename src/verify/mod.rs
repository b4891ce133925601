//! Completion verifier
//!
//! Resolves every planned file against the workspace and classifies it as
//! missing, invalid, or valid. Reports are recomputed from scratch each pass.

use crate::plan::{FileEntry, Plan, EXTENSION_FOLDER, SHARED_FOLDER};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sole content of a scaffolded source file
pub const PLACEHOLDER_MARKER: &str = "// appforge:placeholder";

pub const REASON_MISSING: &str = "missing";
pub const REASON_EMPTY: &str = "empty";
pub const REASON_PLACEHOLDER: &str = "placeholder";
pub const REASON_MISSING_TYPE: &str = "missing expected type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Missing,
    Invalid,
    Valid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    /// Path as planned
    pub path: String,
    /// Path checked, relative to the workspace root
    pub resolved: String,
    pub state: FileState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// An unresolved planned file and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIssue {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub files: Vec<FileStatus>,
    pub valid_count: usize,
    pub missing: Vec<FileIssue>,
    pub invalid: Vec<FileIssue>,
    pub total_planned: usize,
    pub complete: bool,
}

impl CompletionReport {
    pub fn from_statuses(files: Vec<FileStatus>) -> Self {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();
        let mut valid_count = 0;
        for status in &files {
            let issue = || FileIssue {
                path: status.resolved.clone(),
                reason: status.reason.clone(),
            };
            match status.state {
                FileState::Missing => missing.push(issue()),
                FileState::Invalid => invalid.push(issue()),
                FileState::Valid => valid_count += 1,
            }
        }
        let complete = missing.is_empty() && invalid.is_empty();
        Self {
            total_planned: files.len(),
            files,
            valid_count,
            missing,
            invalid,
            complete,
        }
    }

    /// Missing files first, then invalid ones
    pub fn unresolved(&self) -> Vec<FileIssue> {
        self.missing.iter().chain(&self.invalid).cloned().collect()
    }
}

fn is_platform_neutral(path: &str) -> bool {
    [EXTENSION_FOLDER, SHARED_FOLDER]
        .iter()
        .any(|folder| path.strip_prefix(*folder).is_some_and(|rest| rest.starts_with('/')))
}

/// Expected location of a planned file, relative to `root`
pub fn resolve_path(plan: &Plan, root: &Path, entry: &FileEntry) -> String {
    if root.join(&entry.path).is_file() {
        return entry.path.clone();
    }
    if is_platform_neutral(&entry.path) {
        return entry.path.clone();
    }
    format!("{}/{}", plan.source_folder(entry.platform), entry.path)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `symbol` appears in `content` as a whole token
pub fn contains_token(content: &str, symbol: &str) -> bool {
    let bounded = symbol.chars().next().is_some_and(is_word_char)
        && symbol.chars().last().is_some_and(is_word_char);
    if !bounded {
        return content.contains(symbol);
    }
    match Regex::new(&format!(r"\b{}\b", regex::escape(symbol))) {
        Ok(re) => re.is_match(content),
        Err(_) => content.contains(symbol),
    }
}

/// Classify file content against the planned symbol
pub fn classify_content(content: &str, type_name: &str) -> (FileState, &'static str) {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return (FileState::Invalid, REASON_EMPTY);
    }
    if trimmed == PLACEHOLDER_MARKER {
        return (FileState::Invalid, REASON_PLACEHOLDER);
    }
    let symbol = type_name.trim();
    if !symbol.is_empty() && !contains_token(content, symbol) {
        return (FileState::Invalid, REASON_MISSING_TYPE);
    }
    (FileState::Valid, "")
}

pub fn verify_file(plan: &Plan, root: &Path, entry: &FileEntry) -> FileStatus {
    let resolved = resolve_path(plan, root, entry);
    let (state, reason) = match std::fs::read(root.join(&resolved)) {
        Ok(bytes) => classify_content(&String::from_utf8_lossy(&bytes), &entry.type_name),
        Err(_) => (FileState::Missing, REASON_MISSING),
    };
    FileStatus {
        path: entry.path.clone(),
        resolved,
        state,
        reason: reason.to_string(),
    }
}

/// Recompute the completion report for every planned file
pub fn verify_plan(plan: &Plan, root: &Path) -> CompletionReport {
    let statuses = plan
        .ordered_files()
        .into_iter()
        .map(|entry| verify_file(plan, root, entry))
        .collect();
    CompletionReport::from_statuses(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Platform, WatchMode};
    use std::fs;
    use tempfile::TempDir;

    fn entry(path: &str, type_name: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolution_defaults_to_app_folder() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::new("Meals", Platform::Ios);
        assert_eq!(
            resolve_path(&plan, dir.path(), &entry("Models/Meal.swift", "Meal")),
            "Meals/Models/Meal.swift"
        );
    }

    #[test]
    fn test_resolution_keeps_neutral_folders() {
        let dir = TempDir::new().unwrap();
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.platforms = vec![Platform::Macos];
        for path in ["Targets/MealsWidget/Widget.swift", "Shared/Store.swift"] {
            assert_eq!(resolve_path(&plan, dir.path(), &entry(path, "")), path);
        }
        assert_eq!(
            resolve_path(&plan, dir.path(), &entry("SharedThing.swift", "")),
            "MealsiOS/SharedThing.swift"
        );
    }

    #[test]
    fn test_resolution_prefers_existing_verbatim_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Meals/App.swift", "struct App {}");
        let plan = Plan::new("Meals", Platform::Ios);
        assert_eq!(
            resolve_path(&plan, dir.path(), &entry("Meals/App.swift", "App")),
            "Meals/App.swift"
        );
    }

    #[test]
    fn test_resolution_uses_platform_folder() {
        let dir = TempDir::new().unwrap();
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.watch_mode = WatchMode::Paired;
        let mut e = entry("ContentView.swift", "ContentView");
        e.platform = Some(Platform::Watchos);
        assert_eq!(resolve_path(&plan, dir.path(), &e), "MealsWatch/ContentView.swift");
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_content("  \n\t", "Meal"), (FileState::Invalid, REASON_EMPTY));
        assert_eq!(
            classify_content("\n// appforge:placeholder\n", "Meal"),
            (FileState::Invalid, REASON_PLACEHOLDER)
        );
        assert_eq!(
            classify_content("struct Other {}", "Meal"),
            (FileState::Invalid, REASON_MISSING_TYPE)
        );
        assert_eq!(classify_content("struct Meal {}", "Meal").0, FileState::Valid);
        assert_eq!(
            classify_content("struct MealPlan {}", "Meal"),
            (FileState::Invalid, REASON_MISSING_TYPE)
        );
        assert_eq!(classify_content("let x = 1", "").0, FileState::Valid);
    }

    #[test]
    fn test_verify_plan_report() {
        let dir = TempDir::new().unwrap();
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.files = vec![
            entry("Models/Meal.swift", "Meal"),
            entry("Views/List.swift", "MealList"),
            entry("Shared/Store.swift", "Store"),
            entry("Views/Detail.swift", "MealDetail"),
        ];
        write(dir.path(), "Meals/Models/Meal.swift", "import Foundation\nstruct Meal {}\n");
        write(dir.path(), "Meals/Views/List.swift", PLACEHOLDER_MARKER);
        write(dir.path(), "Shared/Store.swift", "final class Store {}");

        let report = verify_plan(&plan, dir.path());
        assert_eq!(report.total_planned, 4);
        assert_eq!(report.valid_count, 2);
        assert!(!report.complete);
        assert_eq!(
            report.missing,
            vec![FileIssue {
                path: "Meals/Views/Detail.swift".to_string(),
                reason: REASON_MISSING.to_string()
            }]
        );
        assert_eq!(report.invalid[0].reason, REASON_PLACEHOLDER);
        assert_eq!(report.unresolved().len(), 2);
    }

    #[test]
    fn test_empty_plan_is_complete() {
        let dir = TempDir::new().unwrap();
        let plan = Plan::new("Meals", Platform::Ios);
        let report = verify_plan(&plan, dir.path());
        assert!(report.complete);
        assert_eq!(report.total_planned, 0);
    }
}
