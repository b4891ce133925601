//! Platform-specific build settings for application targets

use crate::plan::{DeviceFamily, Design, Permission, Plan, Platform};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Parse `#RGB` / `#RRGGBB` (leading `#` optional) into 0..=255 channels
pub fn parse_hex_color(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        8 => hex[..6].to_string(),
        _ => return None,
    };
    let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
    let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
    let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
    Some((r, g, b))
}

/// WCAG relative luminance in 0.0..=1.0
pub fn relative_luminance((r, g, b): (u8, u8, u8)) -> f64 {
    fn channel(c: u8) -> f64 {
        let c = f64::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

/// Dark when white text would contrast better than black
pub fn is_dark_background(hex: &str) -> bool {
    parse_hex_color(hex)
        .map(|rgb| relative_luminance(rgb) < 0.179)
        .unwrap_or(false)
}

/// Pinned interface style, or `None` when the app supports light and dark
pub fn appearance(design: &Design) -> Option<&'static str> {
    if design.supports_dark_mode {
        return None;
    }
    let dark = design
        .palette
        .background
        .as_deref()
        .map(is_dark_background)
        .unwrap_or(false);
    Some(if dark { "Dark" } else { "Light" })
}

fn uses_interface_style(platform: Platform) -> bool {
    matches!(platform, Platform::Ios | Platform::Tvos | Platform::Visionos)
}

/// Base settings for an application target on `platform`
pub fn application_settings(
    plan: &Plan,
    platform: Platform,
    bundle_id: &str,
) -> BTreeMap<String, Value> {
    let mut settings = BTreeMap::new();
    settings.insert("PRODUCT_BUNDLE_IDENTIFIER".to_string(), json!(bundle_id));
    settings.insert("PRODUCT_NAME".to_string(), json!(plan.app_name));
    settings.insert("GENERATE_INFOPLIST_FILE".to_string(), json!("YES"));
    settings.insert(
        "INFOPLIST_KEY_CFBundleDisplayName".to_string(),
        json!(plan.display_name),
    );
    settings.insert(
        "ASSETCATALOG_COMPILER_APPICON_NAME".to_string(),
        json!("AppIcon"),
    );
    settings.insert(
        "ASSETCATALOG_COMPILER_GLOBAL_ACCENT_COLOR_NAME".to_string(),
        json!("AccentColor"),
    );

    if platform.has_device_family() {
        let family = plan.device_family.unwrap_or(DeviceFamily::Iphone);
        settings.insert(
            "TARGETED_DEVICE_FAMILY".to_string(),
            json!(family.targeted_family()),
        );
        let orientations = match family {
            DeviceFamily::Iphone => "UIInterfaceOrientationPortrait",
            DeviceFamily::Ipad | DeviceFamily::Universal => {
                "UIInterfaceOrientationPortrait UIInterfaceOrientationPortraitUpsideDown UIInterfaceOrientationLandscapeLeft UIInterfaceOrientationLandscapeRight"
            }
        };
        settings.insert(
            "INFOPLIST_KEY_UISupportedInterfaceOrientations".to_string(),
            json!(orientations),
        );
        settings.insert(
            "INFOPLIST_KEY_UILaunchScreen_Generation".to_string(),
            json!("YES"),
        );
        settings.insert(
            "INFOPLIST_KEY_UIApplicationSceneManifest_Generation".to_string(),
            json!("YES"),
        );
    }

    if uses_interface_style(platform) {
        if let Some(style) = appearance(&plan.design) {
            settings.insert(
                "INFOPLIST_KEY_UIUserInterfaceStyle".to_string(),
                json!(style),
            );
        }
    }

    if platform == Platform::Macos {
        settings.insert("ENABLE_HARDENED_RUNTIME".to_string(), json!("YES"));
    }

    settings
}

/// Info key build setting for a permission
pub fn permission_setting(permission: &Permission, display_name: &str) -> (String, Value) {
    let description = if permission.description.is_empty() {
        format!("{} needs this access to work.", display_name)
    } else {
        permission.description.clone()
    };
    (format!("INFOPLIST_KEY_{}", permission.key), json!(description))
}

/// Entitlements implied by requested permissions
pub fn permission_entitlements(permissions: &[Permission]) -> BTreeMap<String, Value> {
    let mut entitlements = BTreeMap::new();
    for permission in permissions {
        let key = match permission.key.as_str() {
            "NSHealthShareUsageDescription" | "NSHealthUpdateUsageDescription" => {
                "com.apple.developer.healthkit"
            }
            "NSHomeKitUsageDescription" => "com.apple.developer.homekit",
            "NSSiriUsageDescription" => "com.apple.developer.siri",
            _ => continue,
        };
        entitlements.insert(key.to_string(), json!(true));
    }
    entitlements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::Palette;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF"), Some((255, 255, 255)));
        assert_eq!(parse_hex_color("0a0"), Some((0, 170, 0)));
        assert_eq!(parse_hex_color("#12345678"), Some((0x12, 0x34, 0x56)));
        assert_eq!(parse_hex_color("blue"), None);
    }

    #[test]
    fn test_dark_background_detection() {
        assert!(is_dark_background("#101018"));
        assert!(!is_dark_background("#F5F5F7"));
        assert!(!is_dark_background("not-a-color"));
    }

    #[test]
    fn test_appearance_omitted_with_dark_mode_support() {
        let design = Design {
            supports_dark_mode: true,
            palette: Palette {
                background: Some("#000000".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(appearance(&design), None);
    }

    #[test]
    fn test_appearance_pinned_by_background() {
        let mut design = Design::default();
        assert_eq!(appearance(&design), Some("Light"));
        design.palette.background = Some("#0B0B0F".to_string());
        assert_eq!(appearance(&design), Some("Dark"));
    }

    #[test]
    fn test_device_family_only_on_ios() {
        let plan = Plan::new("Meals", Platform::Tvos);
        let settings = application_settings(&plan, Platform::Tvos, "com.example.meals");
        assert!(!settings.contains_key("TARGETED_DEVICE_FAMILY"));
        assert!(!settings.contains_key("INFOPLIST_KEY_UISupportedInterfaceOrientations"));

        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.device_family = Some(DeviceFamily::Universal);
        let settings = application_settings(&plan, Platform::Ios, "com.example.meals");
        assert_eq!(settings["TARGETED_DEVICE_FAMILY"], "1,2");
    }

    #[test]
    fn test_permission_entitlements() {
        let perms = vec![
            Permission {
                key: "NSHealthShareUsageDescription".to_string(),
                ..Default::default()
            },
            Permission {
                key: "NSCameraUsageDescription".to_string(),
                ..Default::default()
            },
        ];
        let ents = permission_entitlements(&perms);
        assert_eq!(ents.len(), 1);
        assert_eq!(ents["com.apple.developer.healthkit"], json!(true));
    }
}
