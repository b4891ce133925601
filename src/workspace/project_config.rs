use crate::compiler::{self, TargetGraph};
use crate::error::PlanError;
use crate::plan::{
    validate_targets,     BackendNeeds, Design, DeviceFamily, ExtensionEntry, Package, Permission, Plan, Platform,
    WatchMode,
};
use serde::{Deserialize, Serialize};

pub const PROJECT_CONFIG_FILE: &str = "project_config.json";

/// Durable, editable description of a generated project.
///
/// The compiler re-reads this on later edit and fix runs, so it carries every
/// plan field that affects the target graph but none of the file manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub app_name: String,
    #[serde(default)]
    pub display_name: String,
    pub bundle_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_family: Option<DeviceFamily>,
    #[serde(default)]
    pub watch_mode: WatchMode,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub extensions: Vec<ExtensionEntry>,
    #[serde(default)]
    pub localizations: Vec<String>,
    #[serde(default)]
    pub rule_keys: Vec<String>,
    /// Entitlements the compiler added on its own
    #[serde(default)]
    pub auto_entitlements: Vec<String>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub design: Design,
    #[serde(default)]
    pub backend: BackendNeeds,
    /// Fingerprint of the last descriptor written
    #[serde(default)]
    pub graph_fingerprint: String,
}

impl ProjectConfig {
    pub fn from_plan(plan: &Plan, graph: &TargetGraph, bundle_id: &str) -> Self {
        Self {
            app_name: plan.app_name.clone(),
            display_name: plan.display_name.clone(),
            bundle_id: bundle_id.to_string(),
            platform: plan.platform,
            platforms: plan.platforms.clone(),
            device_family: plan.device_family,
            watch_mode: plan.watch_mode,
            permissions: plan.permissions.clone(),
            extensions: plan.extensions.clone(),
            localizations: plan.localizations.clone(),
            rule_keys: plan.rule_keys.clone(),
            auto_entitlements: compiler::auto_entitlements(graph),
            packages: plan.packages.clone(),
            design: plan.design.clone(),
            backend: plan.backend.clone(),
            graph_fingerprint: graph.fingerprint().unwrap_or_default(),
        }
    }

    /// A compile-ready plan with an empty file manifest.
    ///
    /// The config may have been edited by hand, so the target-shaping fields
    /// are validated again.
    pub fn to_plan(&self) -> Result<Plan, PlanError> {
        let mut plan = Plan::new(&self.app_name, self.platform);
        if !self.display_name.is_empty() {
            plan.display_name = self.display_name.clone();
        }
        plan.platforms = self.platforms.clone();
        plan.device_family = self.device_family;
        plan.watch_mode = self.watch_mode;
        plan.permissions = self.permissions.clone();
        plan.extensions = self.extensions.clone();
        plan.localizations = self.localizations.clone();
        plan.rule_keys = self.rule_keys.clone();
        plan.packages = self.packages.clone();
        plan.design = self.design.clone();
        plan.backend = self.backend.clone();
        validate_targets(&plan)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions};
    use crate::plan::{ExtensionKind, FileEntry};
    use std::collections::BTreeMap;

    fn sample_plan() -> Plan {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.display_name = "Meal Pal".to_string();
        plan.watch_mode = WatchMode::Paired;
        plan.files = vec![FileEntry {
            path: "App.swift".to_string(),
            ..Default::default()
        }];
        plan.extensions = vec![ExtensionEntry {
            kind: ExtensionKind::Widget,
            name: String::new(),
            purpose: "Today".to_string(),
            platform: None,
            info_properties: BTreeMap::new(),
            entitlements: BTreeMap::new(),
            settings: BTreeMap::new(),
        }];
        plan.permissions = vec![Permission {
            key: "NSHealthShareUsageDescription".to_string(),
            description: "Steps".to_string(),
            subsystem: String::new(),
        }];
        plan.localizations = vec!["en".to_string(), "fr".to_string()];
        plan
    }

    #[test]
    fn test_recompiles_to_same_graph() {
        let plan = sample_plan();
        let opts = CompileOptions::default();
        let graph = compile(&plan, &opts);
        let config = ProjectConfig::from_plan(&plan, &graph, "com.example.meals");

        let json = serde_json::to_string(&config).unwrap();
        let restored: ProjectConfig = serde_json::from_str(&json).unwrap();
        let replanned = restored.to_plan().unwrap();

        assert!(replanned.files.is_empty());
        let regraph = compile(&replanned, &opts);
        assert_eq!(regraph, graph);
        assert_eq!(regraph.fingerprint().unwrap(), config.graph_fingerprint);
    }

    #[test]
    fn test_records_auto_entitlements() {
        let plan = sample_plan();
        let graph = compile(&plan, &CompileOptions::default());
        let config = ProjectConfig::from_plan(&plan, &graph, "com.example.meals");
        assert!(config
            .auto_entitlements
            .contains(&"com.apple.developer.healthkit".to_string()));
        assert!(config
            .auto_entitlements
            .contains(&"com.apple.security.application-groups".to_string()));
    }

    #[test]
    fn test_edited_config_is_validated() {
        let plan = sample_plan();
        let graph = compile(&plan, &CompileOptions::default());
        let mut config = ProjectConfig::from_plan(&plan, &graph, "com.example.meals");
        config.extensions[0].kind = ExtensionKind::TvTopShelf;

        assert!(matches!(
            config.to_plan(),
            Err(PlanError::ExtensionForbidden { .. })
        ));
    }

}
