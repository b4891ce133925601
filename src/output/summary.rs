use crate::oracle::Usage;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;

/// What a run did, written on success and failure alike
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub run_id: String,
    pub app_name: String,
    pub project_dir: PathBuf,
    pub bundle_id: String,
    pub platforms: Vec<String>,
    pub outcome: String,
    pub passes: u32,
    pub valid_counts: Vec<usize>,
    pub planned_files: usize,
    pub completed_files: usize,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: &str, app_name: &str, project_dir: PathBuf) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            app_name: app_name.to_string(),
            project_dir,
            bundle_id: String::new(),
            platforms: Vec::new(),
            outcome: String::new(),
            passes: 0,
            valid_counts: Vec::new(),
            planned_files: 0,
            completed_files: 0,
            usage: Usage::default(),
            build_succeeded: None,
            error: None,
        }
    }
}

pub fn build_summary_markdown(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("# appforge: {}\n\n", summary.app_name));
    md.push_str(&format!("**Generated:** {}\n", summary.timestamp));
    md.push_str(&format!("**Run:** {}\n", summary.run_id));
    md.push_str(&format!("**Project:** {}\n", summary.project_dir.display()));
    if !summary.bundle_id.is_empty() {
        md.push_str(&format!("**Bundle id:** {}\n", summary.bundle_id));
    }
    if !summary.platforms.is_empty() {
        md.push_str(&format!("**Platforms:** {}\n", summary.platforms.join(", ")));
    }

    let icon = match summary.outcome.as_str() {
        "success" => "✅",
        "stalled" => "⏸️",
        "exhausted_retries" => "⏱️",
        "cancelled" => "⏹️",
        _ => "❌",
    };
    md.push_str(&format!("**Outcome:** {} {}\n\n", icon, summary.outcome));

    md.push_str("## Passes\n\n");
    md.push_str("| Pass | Valid files |\n");
    md.push_str("|------|-------------|\n");
    for (i, valid) in summary.valid_counts.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {}/{} |\n",
            i + 1,
            valid,
            summary.planned_files
        ));
    }
    md.push('\n');

    md.push_str("## Usage\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Cost | ${:.4} |\n", summary.usage.cost_usd));
    md.push_str(&format!("| Input tokens | {} |\n", summary.usage.input_tokens));
    md.push_str(&format!("| Output tokens | {} |\n", summary.usage.output_tokens));
    md.push_str(&format!(
        "| Cache read tokens | {} |\n",
        summary.usage.cache_read_tokens
    ));
    md.push_str(&format!(
        "| Cache creation tokens | {} |\n",
        summary.usage.cache_creation_tokens
    ));

    if let Some(ok) = summary.build_succeeded {
        md.push_str(&format!(
            "\n**Build check:** {}\n",
            if ok { "passed" } else { "failed" }
        ));
    }

    if let Some(error) = &summary.error {
        md.push_str("\n## Error\n\n```\n");
        md.push_str(error);
        md.push_str("\n```\n");
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_lists_passes_and_error() {
        let mut summary = RunSummary::new("run-1", "Meals", PathBuf::from("apps/Meals"));
        summary.outcome = "stalled".to_string();
        summary.planned_files = 4;
        summary.valid_counts = vec![1, 2, 2];
        summary.usage.cost_usd = 0.5;
        summary.error = Some("Generation stalled".to_string());

        let md = build_summary_markdown(&summary);
        assert!(md.starts_with("# appforge: Meals\n"));
        assert!(md.contains("**Outcome:** ⏸️ stalled"));
        assert!(md.contains("| 3 | 2/4 |"));
        assert!(md.contains("| Cost | $0.5000 |"));
        assert!(md.contains("## Error"));
        assert!(!md.contains("Build check"));
    }
}
