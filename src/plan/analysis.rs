//! Results of the lightweight intent and analysis phases

use crate::error::PlanError;
use serde::{Deserialize, Serialize};

use super::extract::extract_json;
use super::parser::{OneOrMany, RawFeature};
use super::types::Platform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Build,
    Edit,
    Fix,
    Question,
}

/// Advisory classification of the user's request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IntentHint {
    #[serde(default)]
    pub operation: Operation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_hint: Option<Platform>,

    #[serde(default)]
    pub confidence: f32,
}

impl IntentHint {
    /// Used whenever the intent call fails or returns garbage
    pub fn fallback() -> Self {
        Self {
            operation: Operation::Build,
            platform_hint: None,
            confidence: 0.0,
        }
    }
}

/// Parse the intent response, falling back to the default hint
pub fn parse_intent(raw: &str) -> IntentHint {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct RawIntent {
        #[serde(alias = "intent")]
        operation: String,
        #[serde(alias = "platformHint", alias = "platform")]
        platform_hint: Option<String>,
        confidence: f32,
    }

    let Some(json) = extract_json(raw) else {
        return IntentHint::fallback();
    };
    let Ok(intent) = serde_json::from_str::<RawIntent>(&json) else {
        return IntentHint::fallback();
    };

    let operation = match intent.operation.trim().to_lowercase().as_str() {
        "edit" | "modify" => Operation::Edit,
        "fix" | "repair" => Operation::Fix,
        "question" | "ask" => Operation::Question,
        _ => Operation::Build,
    };

    IntentHint {
        operation,
        platform_hint: intent.platform_hint.as_deref().and_then(Platform::parse),
        confidence: intent.confidence.clamp(0.0, 1.0),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Feature {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// What the analysis phase learned about the requested app
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AnalysisResult {
    pub app_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub features: Vec<Feature>,

    #[serde(default)]
    pub core_flow: String,

    #[serde(default)]
    pub deferred: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_hint: Option<Platform>,

    #[serde(default)]
    pub needs_backend: bool,
}

/// Parse the analysis response into a typed result
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, PlanError> {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct RawAnalysis {
        #[serde(alias = "appName", alias = "name")]
        app_name: String,
        description: String,
        features: Vec<RawFeature>,
        #[serde(alias = "coreFlow", alias = "core_user_flow")]
        core_flow: OneOrMany<String>,
        #[serde(alias = "deferredFeatures", alias = "out_of_scope")]
        deferred: OneOrMany<String>,
        #[serde(alias = "platformHint", alias = "platform")]
        platform_hint: Option<String>,
        #[serde(alias = "needsBackend", alias = "requires_backend")]
        needs_backend: bool,
    }

    let json = extract_json(raw).ok_or(PlanError::NoStructuredData)?;
    let analysis: RawAnalysis = serde_json::from_str(&json)?;

    Ok(AnalysisResult {
        app_name: analysis.app_name.trim().to_string(),
        description: analysis.description,
        features: analysis
            .features
            .into_iter()
            .map(|f| match f {
                RawFeature::Name(name) => Feature {
                    name,
                    description: String::new(),
                },
                RawFeature::Detailed { name, description } => Feature { name, description },
            })
            .collect(),
        core_flow: analysis.core_flow.into_vec().join(" -> "),
        deferred: analysis.deferred.into_vec(),
        platform_hint: analysis.platform_hint.as_deref().and_then(Platform::parse),
        needs_backend: analysis.needs_backend,
    })
}
