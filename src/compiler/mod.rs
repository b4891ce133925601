//! Project descriptor compiler
//!
//! [`compile`] is a pure function from a validated [`Plan`] to a
//! [`TargetGraph`]. It never fails: upstream normalization has already
//! rejected invalid plans, and unknown extension kinds degrade to a plain
//! app-extension target.

pub mod artifacts;
pub mod extensions;
pub mod graph;
pub mod plist;
pub mod settings;

pub use artifacts::derive_artifacts;
pub use graph::TargetGraph;
use graph::{Dependency, Scheme, Target, TargetType};

use crate::config::Config;
use crate::plan::{ExtensionKind, Plan, Platform, WatchMode, EXTENSION_FOLDER, SHARED_FOLDER};
use extensions::{DefaultsContext, APP_GROUPS_KEY};
use graph::{PackageSpec, PlistSpec, ProjectOptions, SourceFolder, TargetSettings};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const WATCH_RESOURCE_PATTERNS: [&str; 2] = ["**/*.xcassets", "**/*.storyboard"];
const APP_SANDBOX_KEY: &str = "com.apple.security.app-sandbox";

/// Inputs the compiler takes from configuration rather than the plan
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub bundle_id_prefix: String,
    /// Recorded main bundle id; derived from the prefix when unset
    pub main_bundle_id: Option<String>,
    /// Minimum OS per platform, keyed by lowercase platform id
    pub deployment_targets: BTreeMap<String, String>,
    pub app_clip_domain: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            bundle_id_prefix: "com.example".to_string(),
            main_bundle_id: None,
            deployment_targets: BTreeMap::new(),
            app_clip_domain: "example.com".to_string(),
        }
    }
}

impl From<&Config> for CompileOptions {
    fn from(config: &Config) -> Self {
        Self {
            bundle_id_prefix: config.bundle_id_prefix.clone(),
            main_bundle_id: None,
            deployment_targets: config.deployment_targets.clone(),
            app_clip_domain: config.app_clip_domain.clone(),
        }
    }
}

impl CompileOptions {
    /// Pin the main bundle id, taking the prefix from its leading segments
    pub fn with_main_bundle_id(mut self, bundle_id: &str) -> Self {
        let bundle_id = bundle_id.trim();
        if bundle_id.is_empty() {
            return self;
        }
        if let Some((prefix, _)) = bundle_id.rsplit_once('.') {
            self.bundle_id_prefix = prefix.to_string();
        }
        self.main_bundle_id = Some(bundle_id.to_string());
        self
    }

    pub fn main_bundle_id_for(&self, app_name: &str) -> String {
        match &self.main_bundle_id {
            Some(id) => id.clone(),
            None => main_bundle_id(&self.bundle_id_prefix, app_name),
        }
    }

    pub fn deployment_target(&self, platform: Platform) -> String {
        self.deployment_targets
            .get(&platform.to_string())
            .cloned()
            .unwrap_or_else(|| default_deployment_target(platform).to_string())
    }
}

pub fn default_deployment_target(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => "17.0",
        Platform::Watchos => "10.0",
        Platform::Tvos => "17.0",
        Platform::Visionos => "1.0",
        Platform::Macos => "14.0",
    }
}

/// `<prefix>.<lower-cased alphanumeric app name>`
pub fn main_bundle_id(prefix: &str, app_name: &str) -> String {
    let name: String = app_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let name = if name.is_empty() { "app".to_string() } else { name };
    format!("{}.{}", prefix.trim_end_matches('.'), name)
}

/// Where compiled targets landed, used to attach extensions and permissions
#[derive(Debug, Default)]
struct Layout {
    /// Application target per non-watch platform, primary first
    apps: Vec<(Platform, String)>,
    /// Targets that receive app-wide settings, packages and entitlements
    main: Vec<String>,
    watch_app: Option<String>,
    watch_ext: Option<String>,
    standalone: bool,
}

impl Layout {
    fn host(&self) -> Option<&str> {
        self.main.first().map(String::as_str)
    }

    fn app_for(&self, platform: Platform) -> Option<&str> {
        if platform == Platform::Watchos {
            return self.watch_app.as_deref();
        }
        self.apps
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, name)| name.as_str())
    }

    fn embedder_for(&self, platform: Platform) -> Option<&str> {
        if self.standalone || platform == Platform::Watchos {
            if let Some(ext) = self.watch_ext.as_deref() {
                return Some(ext);
            }
        }
        self.app_for(platform).or_else(|| self.host())
    }
}

fn base_target(
    name: &str,
    bundle_id: &str,
    target_type: TargetType,
    platform: Platform,
    opts: &CompileOptions,
) -> Target {
    Target {
        name: name.to_string(),
        bundle_id: bundle_id.to_string(),
        target_type,
        platform,
        deployment_target: opts.deployment_target(platform),
        sources: Vec::new(),
        settings: TargetSettings::default(),
        info: None,
        entitlements: None,
        dependencies: Vec::new(),
    }
}

fn embedded_settings(bundle_id: &str, display_name: &str) -> BTreeMap<String, Value> {
    let mut base = BTreeMap::new();
    base.insert("PRODUCT_BUNDLE_IDENTIFIER".to_string(), json!(bundle_id));
    base.insert("GENERATE_INFOPLIST_FILE".to_string(), json!("YES"));
    base.insert(
        "INFOPLIST_KEY_CFBundleDisplayName".to_string(),
        json!(display_name),
    );
    base.insert("SKIP_INSTALL".to_string(), json!("YES"));
    base
}

/// Watch application and its intrinsic runtime extension, rooted at `root`
fn watch_chain(plan: &Plan, opts: &CompileOptions, root: &str, paired: bool) -> (Target, Target) {
    let folder = plan.source_folder(Some(Platform::Watchos));
    let app_name = format!("{}WatchApp", plan.app_name);
    let ext_name = format!("{}WatchExtension", plan.app_name);
    let app_bundle = format!("{}.watchkitapp", root);
    let ext_bundle = format!("{}.watchkitextension", app_bundle);
    let patterns: Vec<String> = WATCH_RESOURCE_PATTERNS.iter().map(|p| p.to_string()).collect();

    let mut app = base_target(
        &app_name,
        &app_bundle,
        TargetType::WatchApplication,
        Platform::Watchos,
        opts,
    );
    app.sources.push(SourceFolder {
        path: folder.clone(),
        includes: patterns.clone(),
        excludes: Vec::new(),
    });
    app.settings.base = settings::application_settings(plan, Platform::Watchos, &app_bundle);
    if paired {
        app.settings.base.insert(
            "INFOPLIST_KEY_WKCompanionAppBundleIdentifier".to_string(),
            json!(root),
        );
    } else {
        app.settings.base.insert(
            "INFOPLIST_KEY_WKRunsIndependentlyOfCompanionApp".to_string(),
            json!("YES"),
        );
        app.settings
            .base
            .insert("INFOPLIST_KEY_WKWatchOnly".to_string(), json!("YES"));
    }

    let mut ext = base_target(
        &ext_name,
        &ext_bundle,
        TargetType::WatchExtension,
        Platform::Watchos,
        opts,
    );
    ext.sources.push(SourceFolder {
        path: folder.clone(),
        includes: Vec::new(),
        excludes: patterns,
    });
    ext.sources.push(SourceFolder::new(SHARED_FOLDER));
    ext.settings.base = embedded_settings(&ext_bundle, &plan.display_name);
    let mut info = BTreeMap::new();
    info.insert(
        "NSExtension".to_string(),
        json!({
            "NSExtensionAttributes": {"WKAppBundleIdentifier": app_bundle},
            "NSExtensionPointIdentifier": "com.apple.watchkit"
        }),
    );
    ext.info = Some(PlistSpec {
        path: format!("{}/WatchExtension-Info.plist", folder),
        properties: info,
    });

    app.embed(&ext_name);
    (app, ext)
}

fn application_target(plan: &Plan, opts: &CompileOptions, platform: Platform, bundle: &str) -> Target {
    let name = if plan.is_multi_platform() {
        format!("{}{}", plan.app_name, platform.sdk_name())
    } else {
        plan.app_name.clone()
    };
    let mut target = base_target(&name, bundle, TargetType::Application, platform, opts);
    target.sources = vec![
        SourceFolder::new(plan.source_folder(Some(platform))),
        SourceFolder::new(SHARED_FOLDER),
    ];
    target.settings.base = settings::application_settings(plan, platform, bundle);
    target
}

fn build_applications(
    plan: &Plan,
    opts: &CompileOptions,
    main_bundle: &str,
    graph: &mut TargetGraph,
) -> Layout {
    let mut layout = Layout::default();

    if plan.watch_mode == WatchMode::Standalone {
        let mut container = base_target(
            &plan.app_name,
            main_bundle,
            TargetType::WatchContainer,
            Platform::Ios,
            opts,
        );
        container.settings.base = embedded_settings(main_bundle, &plan.display_name);
        container.settings.base.remove("SKIP_INSTALL");

        let (app, ext) = watch_chain(plan, opts, main_bundle, false);
        container.embed(&app.name);
        layout.watch_app = Some(app.name.clone());
        layout.watch_ext = Some(ext.name.clone());
        layout.main.push(app.name.clone());
        layout.standalone = true;

        graph.schemes.insert(
            plan.app_name.clone(),
            Scheme::new(&[container.name.as_str()], &app.name),
        );
        graph.add_target(container);
        graph.add_target(app);
        graph.add_target(ext);
        return layout;
    }

    let mut platforms = vec![plan.platform];
    for p in &plan.platforms {
        if *p != Platform::Watchos && !platforms.contains(p) {
            platforms.push(*p);
        }
    }

    for platform in platforms {
        let target = application_target(plan, opts, platform, main_bundle);
        layout.apps.push((platform, target.name.clone()));
        layout.main.push(target.name.clone());
        graph
            .schemes
            .insert(target.name.clone(), Scheme::new(&[target.name.as_str()], &target.name));
        graph.add_target(target);
    }

    if plan.watch_mode == WatchMode::Paired {
        let host_name = layout
            .app_for(Platform::Ios)
            .or_else(|| layout.host())
            .map(str::to_string);
        if let Some(host_name) = host_name {
            let (app, ext) = watch_chain(plan, opts, main_bundle, true);
            if let Some(host) = graph.targets.get_mut(&host_name) {
                host.embed(&app.name);
            }
            graph
                .schemes
                .insert(app.name.clone(), Scheme::new(&[app.name.as_str()], &app.name));
            layout.watch_app = Some(app.name.clone());
            layout.watch_ext = Some(ext.name.clone());
            graph.add_target(app);
            graph.add_target(ext);
        }
    }

    layout
}

fn unique<F: Fn(&str) -> bool>(base: &str, taken: F, sep: &str) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}{}{}", base, sep, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Compiled extension, remembered for permission ownership
struct ExtensionRecord {
    name: String,
    kind: ExtensionKind,
}

fn build_extensions(
    plan: &Plan,
    opts: &CompileOptions,
    main_bundle: &str,
    layout: &Layout,
    graph: &mut TargetGraph,
) -> Vec<ExtensionRecord> {
    let app_group = format!("group.{}", main_bundle);
    let ctx = DefaultsContext {
        main_bundle_id: main_bundle,
        app_group: &app_group,
        clip_domain: &opts.app_clip_domain,
    };
    let mut bundles: BTreeSet<String> = graph.targets.values().map(|t| t.bundle_id.clone()).collect();
    let mut records = Vec::new();
    let mut needs_app_group = false;

    for (index, entry) in plan.extensions.iter().enumerate() {
        let platform = entry
            .platform
            .unwrap_or_else(|| plan.default_extension_platform());
        let Some(embedder) = layout.embedder_for(platform).map(str::to_string) else {
            continue;
        };
        let parent_bundle = graph
            .target(&embedder)
            .map(|t| t.bundle_id.clone())
            .unwrap_or_else(|| main_bundle.to_string());

        let base_name = if !entry.name.is_empty() {
            entry.name.clone()
        } else {
            let stem = if entry.kind.is_empty() {
                format!("{}Extension{}", plan.app_name, index + 1)
            } else {
                format!("{}{}", plan.app_name, extensions::kind_title(&entry.kind))
            };
            if plan.is_multi_platform() {
                format!("{}{}", stem, platform.sdk_name())
            } else {
                stem
            }
        };
        let name = unique(&base_name, |n| graph.targets.contains_key(n), "");

        let suffix = extensions::bundle_suffix(&entry.kind, &name);
        let bundle = unique(
            &format!("{}.{}", parent_bundle, suffix),
            |b| bundles.contains(b),
            "",
        );
        bundles.insert(bundle.clone());

        let target_type = if entry.kind == ExtensionKind::AppClip {
            TargetType::AppClip
        } else {
            TargetType::AppExtension
        };
        let mut target = base_target(&name, &bundle, target_type, platform, opts);
        let folder = format!("{}/{}", EXTENSION_FOLDER, name);
        target.sources.push(SourceFolder::new(folder.clone()));
        if extensions::uses_shared_sources(&entry.kind) {
            target.sources.push(SourceFolder::new(SHARED_FOLDER));
        }

        let display = if entry.name.is_empty() {
            extensions::kind_title(&entry.kind)
        } else {
            entry.name.clone()
        };
        let mut base = embedded_settings(&bundle, &display);
        if target_type == TargetType::AppClip {
            base.remove("SKIP_INSTALL");
        }
        target.settings.base = extensions::merge_overrides(&base, &entry.settings);

        let defaults = extensions::defaults_for(&entry.kind, &ctx);
        let info = extensions::merge_overrides(&defaults.info, &entry.info_properties);
        if !info.is_empty() {
            target.info = Some(PlistSpec {
                path: format!("{}/Info.plist", folder),
                properties: info,
            });
        }
        let entitlements = extensions::merge_overrides(&defaults.entitlements, &entry.entitlements);
        if entitlements.contains_key(APP_GROUPS_KEY) {
            needs_app_group = true;
        }
        if !entitlements.is_empty() {
            target.entitlements = Some(PlistSpec {
                path: format!("{}/{}.entitlements", folder, name),
                properties: entitlements,
            });
        }

        if let Some(host) = graph.targets.get_mut(&embedder) {
            host.embed(&name);
            if entry.kind == ExtensionKind::LiveActivity {
                host.settings
                    .base
                    .insert("INFOPLIST_KEY_NSSupportsLiveActivities".to_string(), json!("YES"));
            }
        }
        debug!("Extension {} ({}) embedded in {}", name, entry.kind, embedder);

        records.push(ExtensionRecord {
            name: name.clone(),
            kind: entry.kind.clone(),
        });
        graph.add_target(target);
    }

    if needs_app_group {
        for name in &layout.main {
            if let Some(target) = graph.targets.get_mut(name) {
                add_entitlement(target, APP_GROUPS_KEY, json!([app_group]));
            }
        }
    }

    records
}

fn add_entitlement(target: &mut Target, key: &str, value: Value) {
    let path = format!(
        "{}/{}.entitlements",
        target
            .sources
            .first()
            .map(|s| s.path.as_str())
            .unwrap_or(target.name.as_str()),
        target.name
    );
    let spec = target.entitlements.get_or_insert_with(|| PlistSpec {
        path,
        properties: BTreeMap::new(),
    });
    spec.properties.insert(key.to_string(), value);
}

/// Targets that own a permission whose subsystem is `subsystem`
fn permission_owners(subsystem: &str, layout: &Layout, records: &[ExtensionRecord]) -> Vec<String> {
    let wanted = subsystem.trim().to_lowercase();
    if wanted.is_empty() {
        return layout.main.clone();
    }

    let by_extension: Vec<String> = records
        .iter()
        .filter(|r| r.name.to_lowercase() == wanted || ExtensionKind::parse(&wanted) == r.kind)
        .map(|r| r.name.clone())
        .collect();
    if !by_extension.is_empty() {
        return by_extension;
    }

    if let Some(app) = Platform::parse(&wanted).and_then(|p| layout.app_for(p)) {
        return vec![app.to_string()];
    }
    layout.main.clone()
}

fn apply_permissions(plan: &Plan, layout: &Layout, records: &[ExtensionRecord], graph: &mut TargetGraph) {
    for permission in &plan.permissions {
        let (key, value) = settings::permission_setting(permission, &plan.display_name);
        for owner in permission_owners(&permission.subsystem, layout, records) {
            if let Some(target) = graph.targets.get_mut(&owner) {
                target.settings.base.insert(key.clone(), value.clone());
            }
        }
    }

    let implied = settings::permission_entitlements(&plan.permissions);
    for name in &layout.main {
        if let Some(target) = graph.targets.get_mut(name) {
            for (key, value) in &implied {
                add_entitlement(target, key, value.clone());
            }
            if target.platform == Platform::Macos {
                add_entitlement(target, APP_SANDBOX_KEY, json!(true));
            }
        }
    }
}

fn apply_packages(plan: &Plan, layout: &Layout, graph: &mut TargetGraph) {
    for package in plan.packages.iter().filter(|p| !p.url.is_empty()) {
        graph.packages.insert(
            package.name.clone(),
            PackageSpec {
                url: package.url.clone(),
                from: package
                    .min_version
                    .clone()
                    .unwrap_or_else(|| "1.0.0".to_string()),
            },
        );
        for name in &layout.main {
            if let Some(target) = graph.targets.get_mut(name) {
                target.dependencies.push(Dependency::Package {
                    package: package.name.clone(),
                });
            }
        }
    }
}

fn project_options(plan: &Plan, opts: &CompileOptions) -> ProjectOptions {
    let mut deployment_target = BTreeMap::new();
    let mut platforms = plan.all_platforms();
    if plan.watch_mode == WatchMode::Standalone {
        platforms.push(Platform::Ios);
    }
    for platform in platforms {
        deployment_target.insert(
            platform.sdk_name().to_string(),
            opts.deployment_target(platform),
        );
    }
    ProjectOptions {
        bundle_id_prefix: opts.bundle_id_prefix.clone(),
        deployment_target,
        development_language: "en".to_string(),
        create_intermediate_groups: true,
    }
}

fn project_settings() -> TargetSettings {
    let mut base = BTreeMap::new();
    base.insert("SWIFT_VERSION".to_string(), json!("5.0"));
    base.insert("MARKETING_VERSION".to_string(), json!("1.0"));
    base.insert("CURRENT_PROJECT_VERSION".to_string(), json!("1"));
    TargetSettings { base }
}

/// Compile a plan into its target graph
pub fn compile(plan: &Plan, opts: &CompileOptions) -> TargetGraph {
    let main_bundle = opts.main_bundle_id_for(&plan.app_name);
    let mut graph = TargetGraph {
        name: plan.app_name.clone(),
        options: project_options(plan, opts),
        settings: project_settings(),
        packages: BTreeMap::new(),
        targets: BTreeMap::new(),
        schemes: BTreeMap::new(),
    };

    let layout = build_applications(plan, opts, &main_bundle, &mut graph);
    let records = build_extensions(plan, opts, &main_bundle, &layout, &mut graph);
    apply_permissions(plan, &layout, &records, &mut graph);
    apply_packages(plan, &layout, &mut graph);

    debug!(
        "Compiled {} targets, {} schemes for {}",
        graph.targets.len(),
        graph.schemes.len(),
        plan.app_name
    );
    graph
}

/// Entitlement keys the compiler added to application targets
pub fn auto_entitlements(graph: &TargetGraph) -> Vec<String> {
    let keys: BTreeSet<String> = graph
        .targets
        .values()
        .filter(|t| {
            matches!(
                t.target_type,
                TargetType::Application | TargetType::WatchApplication
            )
        })
        .filter_map(|t| t.entitlements.as_ref())
        .flat_map(|e| e.properties.keys().cloned())
        .collect();
    keys.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{DeviceFamily, ExtensionEntry, Package, Permission};

    fn extension(kind: &str, platform: Option<Platform>) -> ExtensionEntry {
        ExtensionEntry {
            kind: ExtensionKind::parse(kind),
            name: String::new(),
            purpose: String::new(),
            platform,
            info_properties: BTreeMap::new(),
            entitlements: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }

    fn opts() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn test_main_bundle_id() {
        assert_eq!(main_bundle_id("com.example", "Meal Pal"), "com.example.mealpal");
        assert_eq!(main_bundle_id("com.example.", "Meals"), "com.example.meals");
    }

    #[test]
    fn test_recorded_bundle_id_wins_over_prefix() {
        let pinned = opts().with_main_bundle_id("com.acme.meals");
        assert_eq!(pinned.bundle_id_prefix, "com.acme");
        assert_eq!(pinned.main_bundle_id_for("Meals"), "com.acme.meals");
        let blank = opts().with_main_bundle_id("  ");
        assert_eq!(blank.main_bundle_id_for("Meals"), "com.example.meals");

        let graph = compile(&Plan::new("Meals", Platform::Ios), &pinned);
        let main = graph.target("Meals").unwrap();
        assert_eq!(main.bundle_id, "com.acme.meals");
    }

    #[test]
    fn test_single_platform_with_widget() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.device_family = Some(DeviceFamily::Universal);
        plan.extensions = vec![extension("widget", None)];

        let graph = compile(&plan, &opts());
        assert_eq!(graph.targets.len(), 2);
        assert_eq!(graph.schemes.len(), 1);

        let main = graph.target("Meals").unwrap();
        assert_eq!(main.target_type, TargetType::Application);
        assert_eq!(main.embedded_targets(), vec!["MealsWidget"]);
        assert_eq!(main.setting("TARGETED_DEVICE_FAMILY"), Some(&json!("1,2")));
        let ents = &main.entitlements.as_ref().unwrap().properties;
        assert_eq!(ents[APP_GROUPS_KEY], json!(["group.com.example.meals"]));

        let widget = graph.target("MealsWidget").unwrap();
        assert_eq!(widget.bundle_id, "com.example.meals.widget");
        assert_eq!(
            widget.sources.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(),
            vec!["Targets/MealsWidget", "Shared"]
        );
        assert_eq!(
            widget.info.as_ref().unwrap().properties["NSExtension"]["NSExtensionPointIdentifier"],
            "com.apple.widgetkit-extension"
        );
        assert!(graph.unresolved_dependencies().is_empty());
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.platforms = vec![Platform::Macos];
        plan.watch_mode = WatchMode::Paired;
        plan.extensions = vec![
            extension("share", None),
            extension("widget", Some(Platform::Macos)),
            extension("widget", Some(Platform::Watchos)),
        ];
        plan.permissions = vec![Permission {
            key: "NSCameraUsageDescription".to_string(),
            description: "Scan meals".to_string(),
            subsystem: String::new(),
        }];

        let first = compile(&plan, &opts());
        let second = compile(&plan, &opts());
        assert_eq!(first, second);
        assert_eq!(first.to_yaml().unwrap(), second.to_yaml().unwrap());
        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());

        let host = first.target("MealsiOS").unwrap();
        assert!(host.embedded_targets().contains(&"MealsWatchApp"));
        assert!(!first
            .target("MealsmacOS")
            .unwrap()
            .embedded_targets()
            .contains(&"MealsWatchApp"));
        assert_eq!(
            first.target("MealsWatchApp").unwrap().embedded_targets(),
            vec!["MealsWatchExtension"]
        );
        assert_eq!(
            first.target("MealsWatchApp").unwrap().bundle_id,
            "com.example.meals.watchkitapp"
        );

        assert_eq!(first.embedders_of("MealsShareiOS"), vec!["MealsiOS"]);
        assert_eq!(first.embedders_of("MealsWidgetmacOS"), vec!["MealsmacOS"]);
        assert_eq!(first.embedders_of("MealsWidgetwatchOS"), vec!["MealsWatchExtension"]);
        assert_eq!(first.target("MealsWidgetmacOS").unwrap().platform, Platform::Macos);
        assert_eq!(first.target("MealsWidgetwatchOS").unwrap().platform, Platform::Watchos);
        assert!(first.unresolved_dependencies().is_empty());
    }

    #[test]
    fn test_paired_companion_topology() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.watch_mode = WatchMode::Paired;
        plan.extensions = vec![
            extension("widget", None),
            ExtensionEntry {
                name: "MealsWatchWidget".to_string(),
                ..extension("widget", Some(Platform::Watchos))
            },
        ];

        let graph = compile(&plan, &opts());
        let host = graph.target("Meals").unwrap();
        let watch_apps: Vec<&str> = host
            .embedded_targets()
            .into_iter()
            .filter(|n| graph.target(n).map(|t| t.target_type) == Some(TargetType::WatchApplication))
            .collect();
        assert_eq!(watch_apps, vec!["MealsWatchApp"]);
        assert!(host.embedded_targets().contains(&"MealsWidget"));

        let watch_app = graph.target("MealsWatchApp").unwrap();
        assert_eq!(watch_app.bundle_id, "com.example.meals.watchkitapp");
        assert_eq!(watch_app.embedded_targets(), vec!["MealsWatchExtension"]);

        let watch_ext = graph.target("MealsWatchExtension").unwrap();
        assert_eq!(
            watch_ext.bundle_id,
            "com.example.meals.watchkitapp.watchkitextension"
        );
        assert_eq!(watch_ext.embedded_targets(), vec!["MealsWatchWidget"]);
        assert_eq!(graph.embedders_of("MealsWatchWidget"), vec!["MealsWatchExtension"]);
        assert_eq!(graph.embedders_of("MealsWidget"), vec!["Meals"]);
        assert_eq!(graph.schemes.len(), 2);
        assert!(graph.unresolved_dependencies().is_empty());
    }

    #[test]
    fn test_standalone_watch_chain() {
        let mut plan = Plan::new("Pulse", Platform::Watchos);
        plan.watch_mode = WatchMode::Standalone;
        plan.extensions = vec![extension("widget", None)];

        let graph = compile(&plan, &opts());
        let container = graph.target("Pulse").unwrap();
        assert_eq!(container.target_type, TargetType::WatchContainer);
        assert_eq!(container.embedded_targets(), vec!["PulseWatchApp"]);

        let ext = graph.target("PulseWatchExtension").unwrap();
        assert_eq!(ext.embedded_targets(), vec!["PulseWidget"]);
        assert_eq!(ext.sources[0].path, "Pulse");
        assert_eq!(ext.sources[0].excludes.len(), 2);

        let scheme = &graph.schemes["Pulse"];
        assert_eq!(scheme.run.executable, "PulseWatchApp");
        assert_eq!(graph.schemes.len(), 1);
        assert!(graph.unresolved_dependencies().is_empty());
    }

    #[test]
    fn test_multi_platform_targets_and_schemes() {
        let mut plan = Plan::new("Notes", Platform::Ios);
        plan.platforms = vec![Platform::Macos, Platform::Visionos];
        plan.extensions = vec![extension("widget", None), extension("widget", Some(Platform::Macos))];

        let graph = compile(&plan, &opts());
        for name in ["NotesiOS", "NotesmacOS", "NotesvisionOS"] {
            let target = graph.target(name).unwrap();
            assert_eq!(target.sources[1].path, "Shared");
            assert!(graph.schemes.contains_key(name));
        }
        assert_eq!(graph.schemes.len(), 3);
        assert_eq!(graph.target("NotesmacOS").unwrap().sources[0].path, "NotesmacOS");
        assert_eq!(graph.embedders_of("NotesWidgetiOS"), vec!["NotesiOS"]);
        assert_eq!(graph.embedders_of("NotesWidgetmacOS"), vec!["NotesmacOS"]);

        let mac = graph.target("NotesmacOS").unwrap();
        let ents = &mac.entitlements.as_ref().unwrap().properties;
        assert_eq!(ents[APP_SANDBOX_KEY], json!(true));
        assert!(!mac.settings.base.contains_key("TARGETED_DEVICE_FAMILY"));
    }

    #[test]
    fn test_extension_override_wins_and_defaults_preserved() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        let mut share = extension("share", None);
        share.info_properties.insert(
            "NSExtension".to_string(),
            json!({"NSExtensionPrincipalClass": "$(PRODUCT_MODULE_NAME).Custom"}),
        );
        share
            .settings
            .insert("SKIP_INSTALL".to_string(), json!("NO"));
        plan.extensions = vec![share];

        let graph = compile(&plan, &opts());
        let target = graph.target("MealsShare").unwrap();
        let ext = &target.info.as_ref().unwrap().properties["NSExtension"];
        assert_eq!(ext["NSExtensionPrincipalClass"], "$(PRODUCT_MODULE_NAME).Custom");
        assert_eq!(ext["NSExtensionPointIdentifier"], "com.apple.share-services");
        assert_eq!(target.setting("SKIP_INSTALL"), Some(&json!("NO")));
        assert_eq!(target.setting("GENERATE_INFOPLIST_FILE"), Some(&json!("YES")));
    }

    #[test]
    fn test_extension_bundle_ids_are_valid() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.extensions = vec![
            extension("notification_service", None),
            extension("my_custom_kind", None),
            extension("", None),
            extension("live_activity", None),
        ];

        let graph = compile(&plan, &opts());
        for target in graph.targets.values() {
            assert!(!target.bundle_id.contains('_'), "{}", target.bundle_id);
        }
        let generic = graph.target("MealsMyCustomKind").unwrap();
        assert_eq!(generic.target_type, TargetType::AppExtension);
        assert_eq!(generic.bundle_id, "com.example.meals.mycustomkind");
        assert!(generic.info.is_none());
        assert_eq!(
            graph.target("MealsExtension3").unwrap().bundle_id,
            "com.example.meals.mealsextension3"
        );
        assert_eq!(
            graph.target("Meals").unwrap().setting("INFOPLIST_KEY_NSSupportsLiveActivities"),
            Some(&json!("YES"))
        );
    }

    #[test]
    fn test_duplicate_extension_kinds_get_unique_names() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.extensions = vec![extension("widget", None), extension("widget", None)];

        let graph = compile(&plan, &opts());
        let a = graph.target("MealsWidget").unwrap();
        let b = graph.target("MealsWidget2").unwrap();
        assert_ne!(a.bundle_id, b.bundle_id);
    }

    #[test]
    fn test_permissions_routed_to_owner() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.extensions = vec![extension("notification_service", None)];
        plan.permissions = vec![
            Permission {
                key: "NSCameraUsageDescription".to_string(),
                description: "Scan meals".to_string(),
                subsystem: String::new(),
            },
            Permission {
                key: "NSLocationWhenInUseUsageDescription".to_string(),
                description: String::new(),
                subsystem: "notification_service".to_string(),
            },
            Permission {
                key: "NSHealthShareUsageDescription".to_string(),
                description: "Read steps".to_string(),
                subsystem: String::new(),
            },
        ];

        let graph = compile(&plan, &opts());
        let main = graph.target("Meals").unwrap();
        assert_eq!(
            main.setting("INFOPLIST_KEY_NSCameraUsageDescription"),
            Some(&json!("Scan meals"))
        );
        assert!(main
            .setting("INFOPLIST_KEY_NSLocationWhenInUseUsageDescription")
            .is_none());

        let service = graph.target("MealsNotificationService").unwrap();
        assert!(service
            .setting("INFOPLIST_KEY_NSLocationWhenInUseUsageDescription")
            .is_some());

        assert_eq!(auto_entitlements(&graph), vec!["com.apple.developer.healthkit"]);
    }

    #[test]
    fn test_packages_linked_from_app_targets() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.packages = vec![
            Package {
                name: "Charts".to_string(),
                url: "https://github.com/example/charts".to_string(),
                min_version: Some("2.1.0".to_string()),
            },
            Package {
                name: "NoUrl".to_string(),
                ..Default::default()
            },
        ];

        let graph = compile(&plan, &opts());
        assert_eq!(graph.packages.len(), 1);
        assert_eq!(graph.packages["Charts"].from, "2.1.0");
        assert!(graph.target("Meals").unwrap().dependencies.contains(&Dependency::Package {
            package: "Charts".to_string()
        }));
    }

    #[test]
    fn test_yaml_uses_descriptor_field_names() {
        let mut plan = Plan::new("Meals", Platform::Ios);
        plan.extensions = vec![extension("app_clip", None)];
        let yaml = compile(&plan, &opts()).to_yaml().unwrap();
        assert!(yaml.contains("type: application.on-demand-install-capable"));
        assert!(yaml.contains("platform: iOS"));
        assert!(yaml.contains("deploymentTarget: '17.0'"));
        assert!(yaml.contains("bundleIdPrefix: com.example"));
    }
}
