//! Plan model: the validated description of the app to build
//!
//! Oracle output is untrusted text. It is located ([`extract`]), decoded into
//! tolerant raw shapes ([`parser`]), then normalized and validated into an
//! immutable [`Plan`] ([`normalize`]).

pub mod analysis;
pub mod extract;
pub mod normalize;
pub mod parser;
pub mod rules;
pub mod types;

pub use analysis::{parse_analysis, parse_intent, AnalysisResult, IntentHint};
pub use normalize::validate_targets;
pub use parser::parse_plan;
pub use types::{
    BackendNeeds, DataModel, Design, DeviceFamily, ExtensionEntry, ExtensionKind, FileEntry,
    ModelProperty, Package, Permission, Plan, Platform, WatchMode, EXTENSION_FOLDER,
    SHARED_FOLDER,
};
