//! Backend provisioning: schema statements and the remote SQL endpoint

pub mod schema;

pub use schema::schema_statements;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::plan::DataModel;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub applied: usize,
    /// Statement and error text
    pub failed: Vec<(String, String)>,
}

/// Apply every schema statement; failures are collected, never raised
pub async fn provision(provisioner: &dyn Provisioner, models: &[DataModel]) -> ProvisionReport {
    let mut report = ProvisionReport::default();
    for statement in schema_statements(models) {
        match provisioner.execute(&statement).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                warn!("Backend statement failed: {}", e);
                report.failed.push((statement, e.to_string()));
            }
        }
    }
    info!(
        "Backend provisioning: {} applied, {} failed",
        report.applied,
        report.failed.len()
    );
    report
}

pub struct HttpProvisioner {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpProvisioner {
    pub fn new(api_base: &str, project_ref: &str, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/v1/projects/{}/database/query",
                api_base.trim_end_matches('/'),
                project_ref
            ),
            token: token.into(),
        }
    }

    /// `None` when provisioning is disabled or no project is configured
    pub fn from_config(config: &BackendConfig) -> Result<Option<Self>, BackendError> {
        let Some(project_ref) = config.project_ref.as_deref().filter(|_| config.enabled) else {
            return Ok(None);
        };
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BackendError::MissingToken(config.token_env.clone()))?;
        Ok(Some(Self::new(&config.api_base, project_ref, token)))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn execute(&self, statement: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": statement }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
