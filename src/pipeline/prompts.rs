use crate::plan::{AnalysisResult, IntentHint, Plan};
use crate::verify::{resolve_path, CompletionReport, FileState};
use std::fmt::Write as _;
use std::path::Path;

const INTENT_PROMPT: &str = include_str!("../../prompts/intent.md");
const ANALYSIS_PROMPT: &str = include_str!("../../prompts/analysis.md");
const PLAN_PROMPT: &str = include_str!("../../prompts/plan.md");
pub const BUILD_SYSTEM_PROMPT: &str = include_str!("../../prompts/build.md");
const RECOVERY_PROMPT: &str = include_str!("../../prompts/recovery.md");

pub fn intent_prompt(request: &str) -> String {
    format!("{}\n{}\n", INTENT_PROMPT.trim_end(), request.trim())
}

pub fn analysis_prompt(request: &str, hint: &IntentHint) -> String {
    let mut prompt = format!("{}\n\n## Request\n\n{}\n", ANALYSIS_PROMPT.trim_end(), request.trim());
    if let Some(platform) = hint.platform_hint {
        let _ = write!(prompt, "\nThe user most likely wants a {} app.\n", platform);
    }
    prompt
}

pub fn plan_prompt(request: &str, analysis: &AnalysisResult) -> String {
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_default();
    format!(
        "{}\n\n## Request\n\n{}\n\n## Analysis\n\n```json\n{}\n```\n",
        PLAN_PROMPT.trim_end(),
        request.trim(),
        analysis_json
    )
}

/// First-pass prompt: the full manifest plus guidance and backend setup
pub fn build_prompt(plan: &Plan, root: &Path, guidance: &str, backend_sql: &[String]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "# {}\n", plan.display_name);
    if !plan.description.is_empty() {
        let _ = writeln!(prompt, "{}\n", plan.description);
    }
    if !plan.features.is_empty() {
        let _ = writeln!(prompt, "## Features\n");
        for feature in &plan.features {
            let _ = writeln!(prompt, "- {}", feature);
        }
        prompt.push('\n');
    }

    let _ = writeln!(prompt, "## Files\n");
    for entry in plan.ordered_files() {
        let path = resolve_path(plan, root, entry);
        let _ = write!(prompt, "- `{}` defines `{}`", path, entry.type_name);
        if !entry.purpose.is_empty() {
            let _ = write!(prompt, ": {}", entry.purpose);
        }
        prompt.push('\n');
        if !entry.components.is_empty() {
            let _ = writeln!(prompt, "  - components: {}", entry.components);
        }
        if !entry.data_access.is_empty() {
            let _ = writeln!(prompt, "  - data access: {}", entry.data_access);
        }
        if !entry.depends_on.is_empty() {
            let _ = writeln!(prompt, "  - depends on: {}", entry.depends_on.join(", "));
        }
    }

    if !plan.models.is_empty() {
        let _ = writeln!(prompt, "\n## Data models\n");
        for model in &plan.models {
            let props: Vec<String> = model
                .properties
                .iter()
                .map(|p| format!("{}: {}", p.name, p.property_type))
                .collect();
            let _ = writeln!(prompt, "- {} ({})", model.name, props.join(", "));
        }
    }

    if !backend_sql.is_empty() {
        let _ = writeln!(
            prompt,
            "\n## Backend\n\nThe remote database uses this schema. Talk to it through a single client type in Shared/.\n\n```sql\n{}\n```",
            backend_sql.join("\n")
        );
    }

    if !guidance.is_empty() {
        prompt.push('\n');
        prompt.push_str(guidance);
    }
    prompt
}

/// Later-pass prompt listing only what is still unresolved
pub fn recovery_prompt(plan: &Plan, report: &CompletionReport) -> String {
    let mut prompt = format!("{}\n\n", RECOVERY_PROMPT.trim_end());
    for status in report.files.iter().filter(|s| s.state != FileState::Valid) {
        let type_name = plan
            .files
            .iter()
            .find(|f| f.path == status.path)
            .map(|f| f.type_name.as_str())
            .unwrap_or_default();
        let _ = writeln!(
            prompt,
            "- `{}` ({}) must define `{}`",
            status.resolved, status.reason, type_name
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FileEntry, Platform};
    use crate::verify::verify_plan;
    use tempfile::TempDir;

    fn plan() -> Plan {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.files = vec![
            FileEntry {
                path: "Models/Meal.swift".to_string(),
                type_name: "Meal".to_string(),
                purpose: "A logged meal".to_string(),
                ..Default::default()
            },
            FileEntry {
                path: "Shared/MealStore.swift".to_string(),
                type_name: "MealStore".to_string(),
                ..Default::default()
            },
        ];
        plan
    }

    #[test]
    fn test_build_prompt_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let prompt = build_prompt(&plan(), dir.path(), "## Guidance: haptics\n\nx\n", &[]);
        assert!(prompt.contains("- `Meals/Models/Meal.swift` defines `Meal`: A logged meal"));
        assert!(prompt.contains("- `Shared/MealStore.swift` defines `MealStore`"));
        assert!(prompt.contains("## Guidance: haptics"));
        assert!(!prompt.contains("## Backend"));
    }

    #[test]
    fn test_recovery_lists_only_unresolved() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Meals/Models")).unwrap();
        std::fs::write(dir.path().join("Meals/Models/Meal.swift"), "struct Meal {}").unwrap();

        let plan = plan();
        let report = verify_plan(&plan, dir.path());
        let prompt = recovery_prompt(&plan, &report);
        assert!(prompt.contains("`Shared/MealStore.swift` (missing) must define `MealStore`"));
        assert!(!prompt.contains("Meal.swift`"));
    }

    #[test]
    fn test_analysis_prompt_mentions_hint() {
        let hint = IntentHint {
            platform_hint: Some(Platform::Watchos),
            ..IntentHint::fallback()
        };
        assert!(analysis_prompt("a step counter", &hint).contains("a watchos app"));
        assert!(!analysis_prompt("a step counter", &IntentHint::fallback()).contains("most likely"));
    }
}
