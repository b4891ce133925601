//! Per-kind extension defaults and override merging

use crate::plan::ExtensionKind;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const APP_GROUPS_KEY: &str = "com.apple.security.application-groups";
pub const ASSOCIATED_DOMAINS_KEY: &str = "com.apple.developer.associated-domains";
pub const PARENT_APP_KEY: &str = "com.apple.developer.parent-application-identifiers";

/// Values the defaults are derived from
#[derive(Debug, Clone)]
pub struct DefaultsContext<'a> {
    pub main_bundle_id: &'a str,
    pub app_group: &'a str,
    pub clip_domain: &'a str,
}

/// Default metadata and entitlement fragments for one extension kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionDefaults {
    pub info: BTreeMap<String, Value>,
    pub entitlements: BTreeMap<String, Value>,
}

fn extension_point(identifier: &str, principal_class: Option<&str>) -> Value {
    let mut ext = serde_json::Map::new();
    ext.insert(
        "NSExtensionPointIdentifier".to_string(),
        Value::String(identifier.to_string()),
    );
    if let Some(class) = principal_class {
        ext.insert(
            "NSExtensionPrincipalClass".to_string(),
            Value::String(format!("$(PRODUCT_MODULE_NAME).{}", class)),
        );
    }
    Value::Object(ext)
}

/// Lookup table of defaults keyed by the closed kind vocabulary
pub fn defaults_for(kind: &ExtensionKind, ctx: &DefaultsContext<'_>) -> ExtensionDefaults {
    let mut info = BTreeMap::new();
    let mut entitlements = BTreeMap::new();
    let app_group = || json!([ctx.app_group]);

    match kind {
        ExtensionKind::Widget | ExtensionKind::LiveActivity => {
            info.insert(
                "NSExtension".to_string(),
                extension_point("com.apple.widgetkit-extension", None),
            );
            entitlements.insert(APP_GROUPS_KEY.to_string(), app_group());
        }
        ExtensionKind::Share => {
            let mut ext = extension_point("com.apple.share-services", Some("ShareViewController"));
            if let Value::Object(map) = &mut ext {
                map.insert(
                    "NSExtensionAttributes".to_string(),
                    json!({
                        "NSExtensionActivationRule": {
                            "NSExtensionActivationSupportsText": true,
                            "NSExtensionActivationSupportsWebURLWithMaxCount": 1,
                            "NSExtensionActivationSupportsImageWithMaxCount": 1
                        }
                    }),
                );
            }
            info.insert("NSExtension".to_string(), ext);
            entitlements.insert(APP_GROUPS_KEY.to_string(), app_group());
        }
        ExtensionKind::NotificationService => {
            info.insert(
                "NSExtension".to_string(),
                extension_point("com.apple.usernotifications.service", Some("NotificationService")),
            );
        }
        ExtensionKind::SafariExtension => {
            info.insert(
                "NSExtension".to_string(),
                extension_point("com.apple.Safari.web-extension", Some("SafariWebExtensionHandler")),
            );
        }
        ExtensionKind::AppClip => {
            info.insert(
                "NSAppClip".to_string(),
                json!({
                    "NSAppClipRequestEphemeralUserNotification": false,
                    "NSAppClipRequestLocationConfirmation": false
                }),
            );
            entitlements.insert(
                PARENT_APP_KEY.to_string(),
                json!([format!("$(AppIdentifierPrefix){}", ctx.main_bundle_id)]),
            );
            entitlements.insert(
                ASSOCIATED_DOMAINS_KEY.to_string(),
                json!([format!("appclips:{}", ctx.clip_domain)]),
            );
        }
        ExtensionKind::TvTopShelf => {
            info.insert(
                "NSExtension".to_string(),
                extension_point("com.apple.tv-top-shelf", Some("ContentProvider")),
            );
        }
        ExtensionKind::Other(_) => {}
    }

    ExtensionDefaults { info, entitlements }
}

/// Merge plan overrides into defaults.
///
/// Last write wins per key. When both sides hold a map for the same key the
/// child keys are merged one level deep; anything nested further is replaced.
pub fn merge_overrides(
    defaults: &BTreeMap<String, Value>,
    overrides: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (child_key, child_value) in incoming {
                    existing.insert(child_key.clone(), child_value.clone());
                }
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Bundle-id suffix for an extension: the kind without underscores, or the
/// lower-cased target name when the kind is empty. Never contains `_`.
pub fn bundle_suffix(kind: &ExtensionKind, target_name: &str) -> String {
    let source = if kind.is_empty() {
        target_name.to_lowercase()
    } else {
        kind.as_str().to_lowercase()
    };
    let suffix: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if suffix.is_empty() {
        "extension".to_string()
    } else {
        suffix
    }
}

/// PascalCase form of a kind, used in generated target names
pub fn kind_title(kind: &ExtensionKind) -> String {
    kind.as_str()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Kinds that read the app's shared source folder
pub fn uses_shared_sources(kind: &ExtensionKind) -> bool {
    matches!(
        kind,
        ExtensionKind::Widget | ExtensionKind::LiveActivity | ExtensionKind::AppClip
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DefaultsContext<'static> {
        DefaultsContext {
            main_bundle_id: "com.example.meals",
            app_group: "group.com.example.meals",
            clip_domain: "example.com",
        }
    }

    #[test]
    fn test_widget_defaults() {
        let d = defaults_for(&ExtensionKind::Widget, &ctx());
        assert_eq!(
            d.info["NSExtension"]["NSExtensionPointIdentifier"],
            "com.apple.widgetkit-extension"
        );
        assert_eq!(d.entitlements[APP_GROUPS_KEY], json!(["group.com.example.meals"]));
    }

    #[test]
    fn test_app_clip_defaults() {
        let d = defaults_for(&ExtensionKind::AppClip, &ctx());
        assert!(d.info.contains_key("NSAppClip"));
        assert_eq!(
            d.entitlements[PARENT_APP_KEY],
            json!(["$(AppIdentifierPrefix)com.example.meals"])
        );
        assert_eq!(d.entitlements[ASSOCIATED_DOMAINS_KEY], json!(["appclips:example.com"]));
    }

    #[test]
    fn test_unknown_kind_has_no_defaults() {
        let d = defaults_for(&ExtensionKind::Other("intents".to_string()), &ctx());
        assert_eq!(d, ExtensionDefaults::default());
    }

    #[test]
    fn test_override_wins_and_unrelated_default_kept() {
        let mut defaults = BTreeMap::new();
        defaults.insert("X".to_string(), json!("default"));
        defaults.insert("Y".to_string(), json!("default"));
        let mut overrides = BTreeMap::new();
        overrides.insert("X".to_string(), json!("custom"));

        let merged = merge_overrides(&defaults, &overrides);
        assert_eq!(merged["X"], "custom");
        assert_eq!(merged["Y"], "default");
    }

    #[test]
    fn test_merge_is_one_level_deep() {
        let d = defaults_for(&ExtensionKind::Share, &ctx());
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "NSExtension".to_string(),
            json!({
                "NSExtensionPrincipalClass": "$(PRODUCT_MODULE_NAME).Custom",
                "NSExtensionAttributes": {"NSExtensionActivationRule": "TRUEPREDICATE"}
            }),
        );

        let merged = merge_overrides(&d.info, &overrides);
        let ext = &merged["NSExtension"];
        assert_eq!(ext["NSExtensionPointIdentifier"], "com.apple.share-services");
        assert_eq!(ext["NSExtensionPrincipalClass"], "$(PRODUCT_MODULE_NAME).Custom");
        assert_eq!(
            ext["NSExtensionAttributes"],
            json!({"NSExtensionActivationRule": "TRUEPREDICATE"})
        );
    }

    #[test]
    fn test_bundle_suffix_never_has_underscores() {
        for raw in ["live_activity", "notification_service", "my_custom_kind", "tv_top_shelf"] {
            let suffix = bundle_suffix(&ExtensionKind::parse(raw), "Ignored");
            assert!(!suffix.contains('_'), "{} -> {}", raw, suffix);
        }
        assert_eq!(bundle_suffix(&ExtensionKind::parse(""), "MealsExtra"), "mealsextra");
        assert_eq!(bundle_suffix(&ExtensionKind::parse(""), "__"), "extension");
    }

    #[test]
    fn test_kind_title() {
        assert_eq!(kind_title(&ExtensionKind::LiveActivity), "LiveActivity");
        assert_eq!(kind_title(&ExtensionKind::Widget), "Widget");
    }
}
