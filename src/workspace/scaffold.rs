use super::Workspace;
use crate::compiler::{derive_artifacts, TargetGraph};
use crate::error::WorkspaceError;
use crate::plan::{Plan, SHARED_FOLDER};
use crate::toolchain::DESCRIPTOR_FILE;
use crate::verify::PLACEHOLDER_MARKER;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name used for scaffolded placeholders
pub const PLACEHOLDER_FILE: &str = "Placeholder.swift";

const SOURCE_PATTERN: &str = "**/*.swift";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldSummary {
    pub files_written: usize,
    /// Source folders that received a placeholder
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripSummary {
    /// Placeholder files deleted
    pub removed: Vec<PathBuf>,
    /// Files that had the marker line removed
    pub cleaned: Vec<PathBuf>,
}

fn source_matcher() -> Result<GlobSet, WorkspaceError> {
    let glob = Glob::new(SOURCE_PATTERN).map_err(|e| WorkspaceError::GlobPattern {
        pattern: SOURCE_PATTERN.to_string(),
        source: e,
    })?;
    let mut builder = GlobSetBuilder::new();
    builder.add(glob);
    builder.build().map_err(|e| WorkspaceError::GlobPattern {
        pattern: SOURCE_PATTERN.to_string(),
        source: e,
    })
}

/// Swift sources under `dir`, skipping hidden and ignored paths
fn source_files(dir: &Path) -> Result<Vec<PathBuf>, WorkspaceError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let matcher = source_matcher()?;
    let mut files = Vec::new();
    for entry in WalkBuilder::new(dir).hidden(true).build() {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path);
        if matcher.is_match(rel) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn placeholder_contents() -> String {
    format!("{}\n", PLACEHOLDER_MARKER)
}

/// Write the serialized target graph as the project descriptor
pub fn write_descriptor(ws: &Workspace, graph: &TargetGraph) -> Result<PathBuf, WorkspaceError> {
    let yaml = graph.to_yaml()?;
    ws.write_file(DESCRIPTOR_FILE, &yaml)
}

/// Source folders every target reads from, plus the shared folder
fn source_folders(graph: &TargetGraph) -> BTreeSet<String> {
    let mut folders: BTreeSet<String> = graph
        .targets
        .values()
        .flat_map(|t| t.sources.iter().map(|s| s.path.clone()))
        .collect();
    folders.insert(SHARED_FOLDER.to_string());
    folders
}

/// Write the descriptor and derived artifacts, and make sure every source
/// folder exists and holds at least one Swift file
pub fn materialize(
    ws: &Workspace,
    plan: &Plan,
    graph: &TargetGraph,
) -> Result<ScaffoldSummary, WorkspaceError> {
    let mut summary = ScaffoldSummary::default();

    write_descriptor(ws, graph)?;
    summary.files_written += 1;

    for artifact in derive_artifacts(plan, graph) {
        ws.write_file(&artifact.path, &artifact.contents)?;
        summary.files_written += 1;
    }

    for folder in source_folders(graph) {
        let dir = ws.ensure_dir(&folder)?;
        if source_files(&dir)?.is_empty() {
            ws.write_file(&format!("{}/{}", folder, PLACEHOLDER_FILE), &placeholder_contents())?;
            summary.files_written += 1;
            summary.placeholders.push(folder);
        }
    }

    debug!(
        "Scaffolded {} files ({} placeholders) in {}",
        summary.files_written,
        summary.placeholders.len(),
        ws.root().display()
    );
    Ok(summary)
}

fn is_marker_only(content: &str) -> bool {
    content.trim() == PLACEHOLDER_MARKER
}

/// Remove placeholders that real sources have superseded.
///
/// A placeholder file is deleted once its folder holds any other Swift file
/// with real content. Any other file that still carries the marker line next
/// to real content has the marker line removed.
pub fn strip_superseded_placeholders(root: &Path) -> Result<StripSummary, WorkspaceError> {
    // (path, decoded content, decoded without loss)
    let mut sources = Vec::new();
    for path in source_files(root)? {
        let bytes = std::fs::read(&path).map_err(|source| WorkspaceError::Read {
            path: path.clone(),
            source,
        })?;
        let (content, exact) = match String::from_utf8(bytes) {
            Ok(content) => (content, true),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), false),
        };
        sources.push((path, content, exact));
    }

    let real: Vec<&PathBuf> = sources
        .iter()
        .filter(|(_, content, _)| !content.trim().is_empty() && !is_marker_only(content))
        .map(|(path, _, _)| path)
        .collect();

    let mut summary = StripSummary::default();
    for (path, content, exact) in &sources {
        let is_placeholder = path.file_name().and_then(|n| n.to_str()) == Some(PLACEHOLDER_FILE);

        if is_placeholder && is_marker_only(content) {
            let Some(dir) = path.parent() else { continue };
            let superseded = real.iter().any(|other| *other != path && other.starts_with(dir));
            if superseded {
                std::fs::remove_file(path).map_err(|source| WorkspaceError::Write {
                    path: path.clone(),
                    source,
                })?;
                summary.removed.push(path.strip_prefix(root).unwrap_or(path).to_path_buf());
            }
            continue;
        }

        let has_marker = content.lines().any(|l| l.trim() == PLACEHOLDER_MARKER);
        if has_marker && !is_marker_only(content) {
            if !exact {
                warn!("Leaving marker in non-UTF-8 file {}", path.display());
                continue;
            }
            let kept: Vec<&str> = content
                .lines()
                .filter(|l| l.trim() != PLACEHOLDER_MARKER)
                .collect();
            let cleaned = kept.join("\n").trim_start_matches('\n').to_string() + "\n";
            std::fs::write(path, cleaned).map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;
            summary.cleaned.push(path.strip_prefix(root).unwrap_or(path).to_path_buf());
        }
    }

    if !summary.removed.is_empty() || !summary.cleaned.is_empty() {
        debug!(
            "Stripped {} placeholders, cleaned {} files",
            summary.removed.len(),
            summary.cleaned.len()
        );
    }
    Ok(summary)
}
