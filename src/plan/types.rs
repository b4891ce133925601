//! Canonical plan types produced by the planning phase

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Folder holding one sub-folder per extension target
pub const EXTENSION_FOLDER: &str = "Targets";

/// Folder compiled into every application target
pub const SHARED_FOLDER: &str = "Shared";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Watchos,
    Tvos,
    Visionos,
    Macos,
}

impl Platform {
    /// Canonicalize a free-form platform identifier
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "ios" | "iphoneos" | "iphone" | "ipados" => Some(Platform::Ios),
            "watchos" | "watch" | "applewatch" => Some(Platform::Watchos),
            "tvos" | "tv" | "appletv" => Some(Platform::Tvos),
            "visionos" | "vision" | "xros" | "visionpro" => Some(Platform::Visionos),
            "macos" | "mac" | "osx" | "macosx" => Some(Platform::Macos),
            _ => None,
        }
    }

    /// Name used by the native toolchain
    pub fn sdk_name(self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Watchos => "watchOS",
            Platform::Tvos => "tvOS",
            Platform::Visionos => "visionOS",
            Platform::Macos => "macOS",
        }
    }

    /// Only phone-class platforms know about device families and orientations
    pub fn has_device_family(self) -> bool {
        matches!(self, Platform::Ios)
    }

    pub fn is_companion(self) -> bool {
        matches!(self, Platform::Watchos)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Watchos => write!(f, "watchos"),
            Platform::Tvos => write!(f, "tvos"),
            Platform::Visionos => write!(f, "visionos"),
            Platform::Macos => write!(f, "macos"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Iphone,
    Ipad,
    Universal,
}

impl DeviceFamily {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "iphone" | "phone" => Some(DeviceFamily::Iphone),
            "ipad" | "tablet" => Some(DeviceFamily::Ipad),
            "universal" | "both" | "iphone,ipad" => Some(DeviceFamily::Universal),
            _ => None,
        }
    }

    /// Value of `TARGETED_DEVICE_FAMILY`
    pub fn targeted_family(self) -> &'static str {
        match self {
            DeviceFamily::Iphone => "1",
            DeviceFamily::Ipad => "2",
            DeviceFamily::Universal => "1,2",
        }
    }
}

/// How a watch app relates to the rest of the project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    #[default]
    #[serde(rename = "none")]
    Disabled,
    Standalone,
    Paired,
}

impl WatchMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "" | "none" | "no" | "disabled" => Some(WatchMode::Disabled),
            "standalone" | "watch_only" | "independent" => Some(WatchMode::Standalone),
            "paired" | "companion" | "paired_with_ios" | "dependent" => Some(WatchMode::Paired),
            _ => None,
        }
    }
}

/// Closed vocabulary of extension kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ExtensionKind {
    Widget,
    LiveActivity,
    Share,
    NotificationService,
    SafariExtension,
    AppClip,
    TvTopShelf,
    /// Unrecognized kind, normalized to a bundle-id-safe string (may be empty)
    Other(String),
}

impl ExtensionKind {
    pub fn parse(raw: &str) -> Self {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "widget" | "widgets" | "widget_extension" | "home_screen_widget" => {
                ExtensionKind::Widget
            }
            "live_activity" | "liveactivity" | "live_activities" => ExtensionKind::LiveActivity,
            "share" | "share_extension" => ExtensionKind::Share,
            "notification_service" | "notification_service_extension" => {
                ExtensionKind::NotificationService
            }
            "safari_extension" | "safari" | "safari_web_extension" | "browser_extension" => {
                ExtensionKind::SafariExtension
            }
            "app_clip" | "appclip" | "clip" => ExtensionKind::AppClip,
            "tv_top_shelf" | "top_shelf" | "topshelf" => ExtensionKind::TvTopShelf,
            _ => ExtensionKind::Other(
                key.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect(),
            ),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExtensionKind::Widget => "widget",
            ExtensionKind::LiveActivity => "live_activity",
            ExtensionKind::Share => "share",
            ExtensionKind::NotificationService => "notification_service",
            ExtensionKind::SafariExtension => "safari_extension",
            ExtensionKind::AppClip => "app_clip",
            ExtensionKind::TvTopShelf => "tv_top_shelf",
            ExtensionKind::Other(s) => s,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ExtensionKind::Other(s) if s.is_empty())
    }

    /// Platforms this kind may target; `None` means unrestricted
    pub fn allowed_platforms(&self) -> Option<&'static [Platform]> {
        use Platform::*;
        match self {
            ExtensionKind::Widget => Some(&[Ios, Watchos, Macos, Visionos]),
            ExtensionKind::LiveActivity => Some(&[Ios]),
            ExtensionKind::Share => Some(&[Ios, Macos, Visionos]),
            ExtensionKind::NotificationService => Some(&[Ios, Macos, Watchos]),
            ExtensionKind::SafariExtension => Some(&[Ios, Macos, Visionos]),
            ExtensionKind::AppClip => Some(&[Ios]),
            ExtensionKind::TvTopShelf => Some(&[Tvos]),
            ExtensionKind::Other(_) => None,
        }
    }

    pub fn allowed_on(&self, platform: Platform) -> bool {
        self.allowed_platforms()
            .map(|p| p.contains(&platform))
            .unwrap_or(true)
    }
}

impl From<String> for ExtensionKind {
    fn from(s: String) -> Self {
        ExtensionKind::parse(&s)
    }
}

impl From<ExtensionKind> for String {
    fn from(kind: ExtensionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileEntry {
    pub path: String,

    /// Symbol the file must declare
    #[serde(default)]
    pub type_name: String,

    #[serde(default)]
    pub purpose: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    #[serde(default)]
    pub components: String,

    #[serde(default)]
    pub data_access: String,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DataModel {
    pub name: String,

    #[serde(default)]
    pub storage: String,

    #[serde(default)]
    pub properties: Vec<ModelProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ModelProperty {
    pub name: String,

    #[serde(rename = "type")]
    pub property_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Permission {
    /// Info key, e.g. `NSCameraUsageDescription`
    pub key: String,

    #[serde(default)]
    pub description: String,

    /// Owning target name or extension kind; empty means the main app
    #[serde(default)]
    pub subsystem: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtensionEntry {
    pub kind: ExtensionKind,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub purpose: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub info_properties: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entitlements: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Palette {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Design {
    /// Full light + dark support; no appearance is pinned
    #[serde(default)]
    pub supports_dark_mode: bool,

    #[serde(default)]
    pub palette: Palette,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BackendNeeds {
    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// The validated, normalized app plan. Read-only after parsing except for
/// rule keys appended by the orchestrator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Plan {
    /// Identifier-safe app name (also the primary source folder)
    pub app_name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub features: Vec<String>,

    pub platform: Platform,

    /// Additional non-companion platforms for multi-platform builds
    #[serde(default)]
    pub platforms: Vec<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_family: Option<DeviceFamily>,

    #[serde(default)]
    pub watch_mode: WatchMode,

    #[serde(default)]
    pub files: Vec<FileEntry>,

    #[serde(default)]
    pub models: Vec<DataModel>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub extensions: Vec<ExtensionEntry>,

    #[serde(default)]
    pub localizations: Vec<String>,

    #[serde(default)]
    pub rule_keys: Vec<String>,

    #[serde(default)]
    pub build_order: Vec<String>,

    #[serde(default)]
    pub packages: Vec<Package>,

    #[serde(default)]
    pub design: Design,

    #[serde(default)]
    pub backend: BackendNeeds,
}

impl Plan {
    /// An empty plan for a single platform, used as a starting point
    pub fn new(app_name: &str, platform: Platform) -> Self {
        Self {
            app_name: app_name.to_string(),
            display_name: app_name.to_string(),
            description: String::new(),
            features: Vec::new(),
            platform,
            platforms: Vec::new(),
            device_family: None,
            watch_mode: WatchMode::Disabled,
            files: Vec::new(),
            models: Vec::new(),
            permissions: Vec::new(),
            extensions: Vec::new(),
            localizations: Vec::new(),
            rule_keys: Vec::new(),
            build_order: Vec::new(),
            packages: Vec::new(),
            design: Design::default(),
            backend: BackendNeeds::default(),
        }
    }

    pub fn is_multi_platform(&self) -> bool {
        !self.platforms.is_empty()
    }

    pub fn has_watch(&self) -> bool {
        self.watch_mode != WatchMode::Disabled
    }

    /// Every platform the build targets, primary first
    pub fn all_platforms(&self) -> Vec<Platform> {
        let mut all = vec![self.platform];
        for p in &self.platforms {
            if !all.contains(p) {
                all.push(*p);
            }
        }
        if self.has_watch() && !all.contains(&Platform::Watchos) {
            all.push(Platform::Watchos);
        }
        all
    }

    /// Platform an extension attaches to when it names none
    pub fn default_extension_platform(&self) -> Platform {
        self.platform
    }

    /// Source folder holding app code for a platform
    pub fn source_folder(&self, platform: Option<Platform>) -> String {
        let platform = platform.unwrap_or(self.platform);
        if platform == Platform::Watchos && self.platform != Platform::Watchos {
            return format!("{}Watch", self.app_name);
        }
        if self.is_multi_platform() {
            return format!("{}{}", self.app_name, platform.sdk_name());
        }
        self.app_name.clone()
    }

    /// Files in build order: explicit order first, the rest in plan order
    pub fn ordered_files(&self) -> Vec<&FileEntry> {
        let mut ordered: Vec<&FileEntry> = Vec::with_capacity(self.files.len());
        for path in &self.build_order {
            if let Some(entry) = self.files.iter().find(|f| &f.path == path) {
                if !ordered.iter().any(|e| e.path == entry.path) {
                    ordered.push(entry);
                }
            }
        }
        for entry in &self.files {
            if !ordered.iter().any(|e| e.path == entry.path) {
                ordered.push(entry);
            }
        }
        ordered
    }

    /// Append a rule key if it isn't already present
    pub fn append_rule_key(&mut self, key: &str) -> bool {
        if self.rule_keys.iter().any(|k| k == key) {
            return false;
        }
        self.rule_keys.push(key.to_string());
        true
    }
}
