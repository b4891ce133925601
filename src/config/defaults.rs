use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("apps")
}

pub fn default_bundle_id_prefix() -> String {
    "com.example".to_string()
}

pub fn default_app_clip_domain() -> String {
    "example.com".to_string()
}

pub fn default_oracle_binary() -> PathBuf {
    // Check common install location first
    if let Some(home) = dirs::home_dir() {
        let local_path = home.join(".claude/local/claude");
        if local_path.exists() {
            return local_path;
        }
    }
    // Fall back to PATH lookup
    PathBuf::from("claude")
}

pub fn default_model() -> String {
    "sonnet".to_string()
}

pub fn default_build_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "MultiEdit", "Glob", "Grep", "Bash"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

pub fn default_permission_mode() -> String {
    "acceptEdits".to_string()
}

pub fn default_analysis_turns() -> u32 {
    1
}

pub fn default_plan_turns() -> u32 {
    3
}

pub fn default_build_turns() -> u32 {
    60
}

pub fn default_recovery_turns() -> u32 {
    30
}

pub fn default_timeout_sec() -> u64 {
    1800
}

pub fn default_intent_timeout_sec() -> u64 {
    60
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    1000
}

pub fn default_max_passes() -> u32 {
    6
}

pub fn default_destinations() -> BTreeMap<String, String> {
    [
        ("ios", "generic/platform=iOS Simulator"),
        ("watchos", "generic/platform=watchOS Simulator"),
        ("tvos", "generic/platform=tvOS Simulator"),
        ("visionos", "generic/platform=visionOS Simulator"),
        ("macos", "platform=macOS"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn default_xcodegen() -> PathBuf {
    PathBuf::from("xcodegen")
}

pub fn default_xcodebuild() -> PathBuf {
    PathBuf::from("xcodebuild")
}

pub fn default_build_timeout_secs() -> u64 {
    900
}

pub fn default_token_env() -> String {
    "SUPABASE_ACCESS_TOKEN".to_string()
}

pub fn default_api_base() -> String {
    "https://api.supabase.com".to_string()
}

pub fn default_commit_message() -> String {
    "Initial build by appforge".to_string()
}

pub fn default_ledger_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("appforge")
        .join("usage.json")
}

pub fn default_true() -> bool {
    true
}
