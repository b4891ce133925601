//! Tolerant decoding of oracle plan output
//!
//! The oracle is untrusted: keys arrive in snake or camel case, some fields
//! flip between a scalar and an array, and values carry stray commentary.
//! Everything is decoded into these raw shapes first and then normalized
//! into a [`Plan`] by [`super::normalize`].

use crate::error::PlanError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::extract::extract_json;
use super::normalize::normalize_plan;
use super::types::Plan;

/// A field that may be a single value or a list of values
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl OneOrMany<String> {
    /// Flatten into one comma-separated note
    pub fn joined(self) -> String {
        self.into_vec()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFeature {
    Name(String),
    Detailed {
        #[serde(alias = "title")]
        name: String,
        #[serde(default)]
        description: String,
    },
}

impl RawFeature {
    pub fn name(&self) -> &str {
        match self {
            RawFeature::Name(n) => n,
            RawFeature::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFile {
    #[serde(alias = "file", alias = "filePath", alias = "file_path")]
    pub path: String,

    #[serde(alias = "typeName", alias = "type", alias = "symbol", alias = "typeDeclaration")]
    pub type_name: String,

    #[serde(alias = "description")]
    pub purpose: String,

    pub platform: Option<String>,

    pub components: OneOrMany<String>,

    #[serde(alias = "dataAccess")]
    pub data_access: OneOrMany<String>,

    #[serde(alias = "dependsOn", alias = "dependencies")]
    pub depends_on: OneOrMany<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProperty {
    pub name: String,

    #[serde(alias = "type", alias = "propertyType")]
    pub property_type: String,

    #[serde(alias = "defaultValue", alias = "default")]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawModel {
    pub name: String,

    #[serde(alias = "storageMode", alias = "storage_mode")]
    pub storage: String,

    #[serde(alias = "fields")]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPermission {
    pub key: String,

    #[serde(alias = "reason", alias = "usage")]
    pub description: String,

    #[serde(alias = "framework", alias = "target")]
    pub subsystem: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExtension {
    #[serde(alias = "type")]
    pub kind: String,

    pub name: String,

    #[serde(alias = "description")]
    pub purpose: String,

    pub platform: Option<String>,

    #[serde(alias = "infoPlist", alias = "info_plist", alias = "infoProperties")]
    pub info_properties: BTreeMap<String, Value>,

    pub entitlements: BTreeMap<String, Value>,

    #[serde(alias = "buildSettings", alias = "build_settings")]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPackage {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        url: String,
        #[serde(default, alias = "version", alias = "minVersion", alias = "from")]
        min_version: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPalette {
    pub primary: Option<String>,
    #[serde(alias = "accentColor", alias = "accent_color")]
    pub accent: Option<String>,
    #[serde(alias = "backgroundColor", alias = "background_color")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDesign {
    #[serde(alias = "supportsDarkMode", alias = "dark_mode", alias = "darkMode")]
    pub supports_dark_mode: bool,

    #[serde(alias = "colors")]
    pub palette: RawPalette,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBackend {
    Flag(bool),
    Detailed {
        #[serde(default = "default_required")]
        required: bool,
        #[serde(default)]
        provider: Option<String>,
    },
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlan {
    #[serde(alias = "appName", alias = "name")]
    pub app_name: String,

    pub description: String,

    pub features: Vec<RawFeature>,

    #[serde(alias = "targetPlatform", alias = "primary_platform", alias = "primaryPlatform")]
    pub platform: String,

    #[serde(alias = "targetPlatforms", alias = "additional_platforms")]
    pub platforms: OneOrMany<String>,

    #[serde(alias = "deviceFamily")]
    pub device_family: Option<String>,

    #[serde(alias = "watchProjectMode", alias = "watch_mode", alias = "watchMode")]
    pub watch_project_mode: Option<String>,

    pub files: Vec<RawFile>,

    #[serde(alias = "dataModels", alias = "data_models")]
    pub models: Vec<RawModel>,

    pub permissions: Vec<RawPermission>,

    pub extensions: Vec<RawExtension>,

    #[serde(alias = "locales")]
    pub localizations: OneOrMany<String>,

    #[serde(alias = "ruleKeys", alias = "rules")]
    pub rule_keys: OneOrMany<String>,

    #[serde(alias = "buildOrder")]
    pub build_order: Vec<String>,

    #[serde(alias = "swift_packages", alias = "swiftPackages")]
    pub packages: Vec<RawPackage>,

    pub design: Option<RawDesign>,

    pub backend: Option<RawBackend>,
}

/// Parse raw oracle output into a validated plan
pub fn parse_plan(raw: &str) -> Result<Plan, PlanError> {
    let json = extract_json(raw).ok_or(PlanError::NoStructuredData)?;
    let value: Value = serde_json::from_str(&json)?;

    // Some prompts produce {"plan": {...}}
    let value = match value.get("plan") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => value,
    };

    let raw_plan: RawPlan = serde_json::from_value(value)?;
    debug!(
        "Decoded raw plan '{}' with {} files",
        raw_plan.app_name,
        raw_plan.files.len()
    );
    normalize_plan(raw_plan)
}
