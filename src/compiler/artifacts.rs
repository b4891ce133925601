//! Derived files produced alongside the target graph

use super::graph::TargetGraph;
use super::plist::render_plist;
use super::settings::parse_hex_color;
use crate::plan::Plan;
use serde_json::{json, Value};

/// A file to be written relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub contents: String,
}

impl GeneratedFile {
    fn json(path: String, value: &Value) -> Self {
        let contents = serde_json::to_string_pretty(value).unwrap_or_default() + "\n";
        Self { path, contents }
    }
}

const CATALOG_INFO: &str = r#"{"author": "xcode", "version": 1}"#;

fn catalog_info() -> Value {
    serde_json::from_str(CATALOG_INFO).unwrap_or(Value::Null)
}

fn color_components(hex: &str) -> Option<Value> {
    let (r, g, b) = parse_hex_color(hex)?;
    Some(json!({
        "alpha": "1.000",
        "blue": format!("{:.3}", f64::from(b) / 255.0),
        "green": format!("{:.3}", f64::from(g) / 255.0),
        "red": format!("{:.3}", f64::from(r) / 255.0),
    }))
}

/// Asset catalog skeleton for one application source folder
pub fn asset_catalog(folder: &str, accent: Option<&str>) -> Vec<GeneratedFile> {
    let root = format!("{}/Assets.xcassets", folder);

    let icon = json!({
        "images": [{"idiom": "universal", "platform": "ios", "size": "1024x1024"}],
        "info": catalog_info(),
    });

    let mut color = json!({"idiom": "universal"});
    if let Some(components) = accent.and_then(color_components) {
        color["color"] = json!({"color-space": "srgb", "components": components});
    }
    let accent_color = json!({"colors": [color], "info": catalog_info()});

    vec![
        GeneratedFile::json(format!("{}/Contents.json", root), &json!({"info": catalog_info()})),
        GeneratedFile::json(format!("{}/AppIcon.appiconset/Contents.json", root), &icon),
        GeneratedFile::json(
            format!("{}/AccentColor.colorset/Contents.json", root),
            &accent_color,
        ),
    ]
}

fn escape_strings_value(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `Localizable.strings` for each locale under the primary source folder
pub fn localization_files(plan: &Plan) -> Vec<GeneratedFile> {
    let folder = plan.source_folder(None);
    plan.localizations
        .iter()
        .map(|locale| GeneratedFile {
            path: format!("{}/{}.lproj/Localizable.strings", folder, locale),
            contents: format!(
                "/* {} ({}) */\n\"app.name\" = \"{}\";\n",
                plan.display_name,
                locale,
                escape_strings_value(&plan.display_name)
            ),
        })
        .collect()
}

/// Every file derivable from a plan and its compiled graph
pub fn derive_artifacts(plan: &Plan, graph: &TargetGraph) -> Vec<GeneratedFile> {
    let mut files = Vec::new();
    let accent = plan.design.palette.accent.as_deref();

    let mut icon_folders: Vec<&str> = graph
        .targets
        .values()
        .filter(|t| t.target_type.owns_app_icon())
        .filter_map(|t| t.sources.first().map(|s| s.path.as_str()))
        .collect();
    icon_folders.sort_unstable();
    icon_folders.dedup();
    for folder in icon_folders {
        files.extend(asset_catalog(folder, accent));
    }

    for target in graph.targets.values() {
        if let Some(entitlements) = &target.entitlements {
            files.push(GeneratedFile {
                path: entitlements.path.clone(),
                contents: render_plist(&entitlements.properties),
            });
        }
    }

    files.extend(localization_files(plan));
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
