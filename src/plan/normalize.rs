//! Normalization and validation of a decoded plan

use crate::error::PlanError;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::parser::{RawBackend, RawPackage, RawPlan};
use super::rules::filter_rule_keys;
use super::types::{
    BackendNeeds, DataModel, Design, DeviceFamily, ExtensionEntry, ExtensionKind, FileEntry,
    ModelProperty, Package, Palette, Permission, Plan, Platform, WatchMode,
};

/// Identifier-safe form of an app name: alphanumerics only, words joined in
/// title case ("meal planner" -> "MealPlanner")
pub fn identifier_name(raw: &str) -> String {
    let mut out = String::new();
    for word in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert_str(0, "App");
    }
    out
}

/// Relative path form used everywhere: no leading `./` or `/`, forward slashes
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    path.trim_start_matches('/').to_string()
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn is_info_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Apply the normalization rules in order, then validate.
pub fn normalize_plan(raw: RawPlan) -> Result<Plan, PlanError> {
    // 1. Platforms
    let platform = if raw.platform.trim().is_empty() {
        Platform::Ios
    } else {
        Platform::parse(&raw.platform)
            .ok_or_else(|| PlanError::UnsupportedPlatform(raw.platform.trim().to_string()))?
    };

    let mut additional: Vec<Platform> = Vec::new();
    for name in raw.platforms.into_vec() {
        match Platform::parse(&name) {
            Some(p) if p != platform && !additional.contains(&p) => additional.push(p),
            Some(_) => {}
            None => debug!("Dropping unsupported platform '{}'", name),
        }
    }

    // 2. Companion pairing
    let mut watch_mode = match raw.watch_project_mode.as_deref() {
        Some(mode) => WatchMode::parse(mode).unwrap_or_else(|| {
            warn!("Unknown watch project mode '{}', ignoring", mode);
            WatchMode::Disabled
        }),
        None => WatchMode::Disabled,
    };

    let mut platform = platform;
    if let Some(idx) = additional.iter().position(|p| p.is_companion()) {
        additional.remove(idx);
        if watch_mode == WatchMode::Disabled {
            watch_mode = WatchMode::Paired;
        }
    }
    if platform == Platform::Watchos && watch_mode == WatchMode::Disabled {
        watch_mode = WatchMode::Standalone;
    }

    match watch_mode {
        WatchMode::Standalone if platform != Platform::Watchos => {
            debug!("Coercing primary platform {} to watchos for standalone watch app", platform);
            platform = Platform::Watchos;
            additional.clear();
        }
        WatchMode::Standalone => additional.clear(),
        WatchMode::Paired if platform != Platform::Ios => {
            debug!("Coercing primary platform {} to ios as watch host", platform);
            if platform != Platform::Watchos && !additional.contains(&platform) && !additional.is_empty() {
                additional.push(platform);
            }
            additional.retain(|p| *p != Platform::Ios);
            platform = Platform::Ios;
        }
        _ => {}
    }

    // 3. Device family
    let device_family = match raw.device_family.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => match DeviceFamily::parse(name) {
            Some(family) => Some(family),
            None => {
                debug!("Dropping unknown device family '{}'", name);
                None
            }
        },
    };
    if device_family.is_some() && !platform.has_device_family() {
        return Err(PlanError::DeviceFamilyNotSupported {
            platform: platform.to_string(),
        });
    }

    // 4. Packages, deduplicated by name (first wins)
    let mut seen_packages = HashSet::new();
    let mut packages = Vec::new();
    for pkg in raw.packages {
        let pkg = match pkg {
            RawPackage::Name(name) => Package {
                name,
                url: String::new(),
                min_version: None,
            },
            RawPackage::Detailed {
                name,
                url,
                min_version,
            } => Package {
                name,
                url,
                min_version,
            },
        };
        let key = pkg.name.trim().to_lowercase();
        if key.is_empty() || !seen_packages.insert(key) {
            continue;
        }
        packages.push(pkg);
    }

    // 5. Files
    let mut plan_platforms = vec![platform];
    plan_platforms.extend(additional.iter().copied());
    if watch_mode != WatchMode::Disabled && !plan_platforms.contains(&Platform::Watchos) {
        plan_platforms.push(Platform::Watchos);
    }

    let mut seen_paths = HashSet::new();
    let mut files = Vec::new();
    for file in raw.files {
        let path = normalize_path(&file.path);
        if path.is_empty() {
            debug!("Dropping file entry without a path");
            continue;
        }
        let file_platform = match file.platform.as_deref().map(str::trim) {
            None | Some("") | Some("shared") | Some("all") => None,
            Some(name) => match Platform::parse(name) {
                Some(p) => Some(p),
                None => {
                    debug!("Dropping file '{}' for unsupported platform '{}'", path, name);
                    continue;
                }
            },
        };
        if !seen_paths.insert(path.clone()) {
            warn!("Duplicate planned file '{}', keeping the first entry", path);
            continue;
        }
        files.push(FileEntry {
            path,
            type_name: file.type_name.trim().to_string(),
            purpose: file.purpose,
            platform: file_platform,
            components: file.components.joined(),
            data_access: file.data_access.joined(),
            depends_on: file
                .depends_on
                .into_vec()
                .iter()
                .map(|p| normalize_path(p))
                .filter(|p| !p.is_empty())
                .collect(),
        });
    }
    if files.is_empty() {
        return Err(PlanError::NoFiles);
    }

    // 6. Models
    let models = raw
        .models
        .into_iter()
        .filter(|m| !m.name.trim().is_empty())
        .map(|m| DataModel {
            name: m.name.trim().to_string(),
            storage: m.storage,
            properties: m
                .properties
                .into_iter()
                .filter(|p| !p.name.trim().is_empty())
                .map(|p| ModelProperty {
                    name: p.name.trim().to_string(),
                    property_type: p.property_type.trim().to_string(),
                    default_value: p.default_value.map(value_to_string),
                })
                .collect(),
        })
        .collect();

    // 7. Permissions
    let mut permissions: Vec<Permission> = Vec::new();
    for perm in raw.permissions {
        let key = perm.key.trim().to_string();
        if !is_info_key(&key) {
            debug!("Dropping permission with unsupported key '{}'", perm.key);
            continue;
        }
        if permissions.iter().any(|p| p.key == key && p.subsystem == perm.subsystem) {
            continue;
        }
        permissions.push(Permission {
            key,
            description: perm.description.trim().to_string(),
            subsystem: perm.subsystem.trim().to_string(),
        });
    }

    // 8. Extensions
    let mut extensions = Vec::new();
    for ext in raw.extensions {
        let kind = ExtensionKind::parse(&ext.kind);
        let ext_platform = match ext.platform.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => match Platform::parse(name) {
                Some(p) => Some(p),
                None => {
                    debug!("Dropping {} extension for unsupported platform '{}'", kind, name);
                    continue;
                }
            },
        };
        let effective = ext_platform.unwrap_or(platform);
        if !plan_platforms.contains(&effective) {
            warn!(
                "Dropping {} extension targeting {} which the plan does not build",
                kind, effective
            );
            continue;
        }
        if !kind.allowed_on(effective) {
            return Err(PlanError::ExtensionForbidden {
                kind: kind.to_string(),
                platform: effective.to_string(),
            });
        }
        extensions.push(ExtensionEntry {
            kind,
            name: identifier_name_or_empty(&ext.name),
            purpose: ext.purpose,
            platform: ext_platform,
            info_properties: ext.info_properties,
            entitlements: ext.entitlements,
            settings: ext.settings,
        });
    }

    // 9. Localizations
    let mut localizations: Vec<String> = Vec::new();
    for locale in raw.localizations.into_vec() {
        let locale = locale.trim().replace('_', "-");
        if !locale.is_empty() && !localizations.contains(&locale) {
            localizations.push(locale);
        }
    }

    // 10. Rule keys
    let (rule_keys, _) = filter_rule_keys(&raw.rule_keys.into_vec(), &plan_platforms);

    // 11. Build order restricted to planned files
    let mut build_order = Vec::new();
    for path in raw.build_order.iter().map(|p| normalize_path(p)) {
        if seen_paths.contains(&path) && !build_order.contains(&path) {
            build_order.push(path);
        }
    }

    let display_name = if raw.app_name.trim().is_empty() {
        "App".to_string()
    } else {
        raw.app_name.trim().to_string()
    };

    let design = raw
        .design
        .map(|d| Design {
            supports_dark_mode: d.supports_dark_mode,
            palette: Palette {
                primary: d.palette.primary,
                accent: d.palette.accent,
                background: d.palette.background,
            },
        })
        .unwrap_or_default();

    let backend = match raw.backend {
        Some(RawBackend::Flag(required)) => BackendNeeds {
            required,
            provider: None,
        },
        Some(RawBackend::Detailed { required, provider }) => BackendNeeds { required, provider },
        None => BackendNeeds::default(),
    };

    Ok(Plan {
        app_name: identifier_name(&display_name),
        display_name,
        description: raw.description,
        features: raw
            .features
            .iter()
            .map(|f| f.name().trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        platform,
        platforms: additional,
        device_family,
        watch_mode,
        files,
        models,
        permissions,
        extensions,
        localizations,
        rule_keys,
        build_order,
        packages,
        design,
        backend,
    })
}

/// Re-check the target-shaping fields of an already built plan.
///
/// Used for plans reconstructed from an edited project config, which never
/// passed through [`normalize_plan`].
pub fn validate_targets(plan: &Plan) -> Result<(), PlanError> {
    match plan.watch_mode {
        WatchMode::Standalone if plan.platform != Platform::Watchos => {
            return Err(PlanError::UnsupportedPlatform(format!(
                "{} as a standalone watch app",
                plan.platform
            )));
        }
        WatchMode::Paired if plan.platform != Platform::Ios => {
            return Err(PlanError::UnsupportedPlatform(format!(
                "{} as a watch host",
                plan.platform
            )));
        }
        _ => {}
    }

    if plan.device_family.is_some() && !plan.platform.has_device_family() {
        return Err(PlanError::DeviceFamilyNotSupported {
            platform: plan.platform.to_string(),
        });
    }

    let built = plan.all_platforms();
    for ext in &plan.extensions {
        let effective = ext.platform.unwrap_or(plan.platform);
        if !built.contains(&effective) || !ext.kind.allowed_on(effective) {
            return Err(PlanError::ExtensionForbidden {
                kind: ext.kind.to_string(),
                platform: effective.to_string(),
            });
        }
    }
    Ok(())
}

fn identifier_name_or_empty(raw: &str) -> String {
    if raw.trim().is_empty() {
        String::new()
    } else {
        identifier_name(raw)
    }
}
