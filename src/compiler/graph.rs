//! Target graph: the compiled build descriptor
//!
//! Field names follow the XcodeGen `project.yml` format so the graph can be
//! serialized directly. All maps are `BTreeMap` so output is deterministic.

use crate::plan::Platform;
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetType {
    #[serde(rename = "application")]
    Application,
    #[serde(rename = "app-extension")]
    AppExtension,
    #[serde(rename = "application.on-demand-install-capable")]
    AppClip,
    #[serde(rename = "application.watchapp2-container")]
    WatchContainer,
    #[serde(rename = "application.watchapp2")]
    WatchApplication,
    #[serde(rename = "watchkit2-extension")]
    WatchExtension,
}

impl TargetType {
    /// Targets that can be launched from a scheme
    pub fn is_runnable(self) -> bool {
        matches!(
            self,
            TargetType::Application | TargetType::WatchApplication | TargetType::AppClip
        )
    }

    /// Targets that own an app icon asset catalog
    pub fn owns_app_icon(self) -> bool {
        matches!(
            self,
            TargetType::Application | TargetType::WatchApplication | TargetType::AppClip
        )
    }
}

fn serialize_platform<S: Serializer>(platform: &Platform, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(platform.sdk_name())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFolder {
    pub path: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
}

impl SourceFolder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

/// A generated plist (Info metadata or entitlements) attached to a target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlistSpec {
    pub path: String,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dependency {
    Target { target: String, embed: bool },
    Package { package: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetSettings {
    pub base: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(skip)]
    pub name: String,

    #[serde(skip)]
    pub bundle_id: String,

    #[serde(rename = "type")]
    pub target_type: TargetType,

    #[serde(serialize_with = "serialize_platform")]
    pub platform: Platform,

    pub deployment_target: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceFolder>,

    pub settings: TargetSettings,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<PlistSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<PlistSpec>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl Target {
    /// Ids of targets bundled into this one at build time
    pub fn embedded_targets(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter_map(|d| match d {
                Dependency::Target {
                    target,
                    embed: true,
                } => Some(target.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn embed(&mut self, target: &str) {
        self.dependencies.push(Dependency::Target {
            target: target.to_string(),
            embed: true,
        });
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.base.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeBuild {
    pub targets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeRun {
    pub config: String,
    pub executable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scheme {
    pub build: SchemeBuild,
    pub run: SchemeRun,
}

impl Scheme {
    pub fn new(members: &[&str], executable: &str) -> Self {
        Self {
            build: SchemeBuild {
                targets: members
                    .iter()
                    .map(|m| (m.to_string(), "all".to_string()))
                    .collect(),
            },
            run: SchemeRun {
                config: "Debug".to_string(),
                executable: executable.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSpec {
    pub url: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOptions {
    pub bundle_id_prefix: String,
    pub deployment_target: BTreeMap<String, String>,
    pub development_language: String,
    pub create_intermediate_groups: bool,
}

/// The compiled, platform-aware build descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetGraph {
    pub name: String,

    pub options: ProjectOptions,

    pub settings: TargetSettings,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, PackageSpec>,

    pub targets: BTreeMap<String, Target>,

    pub schemes: BTreeMap<String, Scheme>,
}

impl TargetGraph {
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn add_target(&mut self, target: Target) {
        self.targets.insert(target.name.clone(), target);
    }

    /// Embed edges that do not resolve to a target in this graph
    pub fn unresolved_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for (name, target) in &self.targets {
            for dep in target.embedded_targets() {
                if !self.targets.contains_key(dep) {
                    missing.push((name.clone(), dep.to_string()));
                }
            }
        }
        missing
    }

    /// Names of the targets that embed `name`
    pub fn embedders_of(&self, name: &str) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|(_, t)| t.embedded_targets().contains(&name))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Serialize to the on-disk descriptor format
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Content hash of the serialized descriptor
    pub fn fingerprint(&self) -> Result<String, serde_yaml::Error> {
        let yaml = self.to_yaml()?;
        let hash = Sha256::digest(yaml.as_bytes());
        Ok(format!("{:x}", hash)[..16].to_string())
    }
}
