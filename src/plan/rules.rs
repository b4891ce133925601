//! Rule keys select supplementary guidance content per platform

use super::types::Platform;
use tracing::info;

/// Known rule keys and the platforms they apply to. Keys not listed here are
/// opaque and apply everywhere.
const RULE_PLATFORMS: &[(&str, &[Platform])] = &[
    ("haptics", &[Platform::Ios, Platform::Watchos]),
    ("camera", &[Platform::Ios, Platform::Macos, Platform::Visionos]),
    (
        "widgets",
        &[Platform::Ios, Platform::Watchos, Platform::Macos, Platform::Visionos],
    ),
    ("live_activities", &[Platform::Ios]),
    ("complications", &[Platform::Watchos]),
    ("spatial", &[Platform::Visionos]),
    ("immersive_space", &[Platform::Visionos]),
    ("menu_bar", &[Platform::Macos]),
    ("focus_navigation", &[Platform::Tvos]),
    ("healthkit", &[Platform::Ios, Platform::Watchos]),
];

/// Canonical form of a rule key
pub fn normalize_rule_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

pub fn rule_applies(key: &str, platform: Platform) -> bool {
    RULE_PLATFORMS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, platforms)| platforms.contains(&platform))
        .unwrap_or(true)
}

/// Outcome of filtering rule keys for one platform
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFilter {
    pub platform: Platform,
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

/// Normalize, dedupe and filter rule keys against the plan's platforms.
///
/// Logs one filter result per platform. A key survives if it applies to at
/// least one of the platforms.
pub fn filter_rule_keys(keys: &[String], platforms: &[Platform]) -> (Vec<String>, Vec<RuleFilter>) {
    let mut normalized: Vec<String> = Vec::new();
    for key in keys {
        let key = normalize_rule_key(key);
        if !key.is_empty() && !normalized.contains(&key) {
            normalized.push(key);
        }
    }

    let mut filters = Vec::with_capacity(platforms.len());
    for &platform in platforms {
        let (kept, dropped): (Vec<String>, Vec<String>) = normalized
            .iter()
            .cloned()
            .partition(|k| rule_applies(k, platform));
        info!(
            "Rule keys for {}: kept {:?}, dropped {:?}",
            platform, kept, dropped
        );
        filters.push(RuleFilter {
            platform,
            kept,
            dropped,
        });
    }

    let surviving = normalized
        .into_iter()
        .filter(|k| filters.iter().any(|f| f.kept.contains(k)))
        .collect();

    (surviving, filters)
}
