use crate::backend::{provision, schema_statements, Provisioner};
use crate::compiler::{compile, CompileOptions, TargetGraph};
use crate::config::Config;
use crate::error::{OracleError, PipelineError, WorkspaceError};
use crate::guidance::GuidanceLoader;
use crate::oracle::{EventKind, GenerateOptions, Oracle, OracleResponse, StreamEvent, Usage};
use crate::output::{build_summary_markdown, RunSummary};
use crate::plan::{
    parse_analysis, parse_intent, parse_plan, AnalysisResult, ExtensionKind, IntentHint, Plan,
};
use crate::toolchain::Toolchain;
use crate::usage::UsageStore;
use crate::verify::{verify_plan, CompletionReport};
use crate::workspace::{materialize, strip_superseded_placeholders, ProjectConfig, Workspace};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::finalize::finalize;
use super::passes::{PassDecision, PassOutcome, PassTracker};
use super::phase::{Phase, PhaseTracker};
use super::prompts;
use super::retry::retry_with_backoff;

#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub prompt: String,
    pub images: Vec<PathBuf>,
}

/// Outcome record of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub app_name: String,
    pub project_dir: PathBuf,
    pub bundle_id: String,
    pub platforms: Vec<String>,
    pub features: Vec<String>,
    pub planned_files: usize,
    pub completed_files: usize,
    pub completion_passes: u32,
    pub session_id: Option<String>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_succeeded: Option<bool>,
}

/// Result of the planning phases alone
#[derive(Debug, Clone)]
pub struct PlannedApp {
    pub intent: IntentHint,
    pub analysis: AnalysisResult,
    pub plan: Plan,
    pub usage: Usage,
}

/// Mutable state threaded through one run
struct RunState {
    phases: PhaseTracker,
    usage: Usage,
    session_id: Option<String>,
}

impl RunState {
    fn new() -> Self {
        Self {
            phases: PhaseTracker::default(),
            usage: Usage::default(),
            session_id: None,
        }
    }
}

fn oracle_error(phase: &'static str, e: OracleError) -> PipelineError {
    match e {
        OracleError::Cancelled => PipelineError::Cancelled,
        source => PipelineError::Oracle { phase, source },
    }
}

fn log_event(event: &StreamEvent) {
    match event.kind {
        EventKind::ToolUse => debug!("tool: {}", event.payload),
        EventKind::Result => debug!("result received"),
        _ => {}
    }
}

/// Rule keys implied by the plan itself
pub fn append_auto_rule_keys(plan: &mut Plan) {
    let has_widgets = plan
        .extensions
        .iter()
        .any(|e| matches!(e.kind, ExtensionKind::Widget | ExtensionKind::LiveActivity));
    if has_widgets {
        plan.append_rule_key("widgets");
    }
    if plan.backend.required {
        plan.append_rule_key("backend");
    }
    if plan.localizations.len() > 1 {
        plan.append_rule_key("localization");
    }
}

pub struct Pipeline {
    config: Config,
    oracle: Arc<dyn Oracle>,
    toolchain: Arc<dyn Toolchain>,
    provisioner: Option<Arc<dyn Provisioner>>,
    usage: Arc<UsageStore>,
    guidance: GuidanceLoader,
}

impl Pipeline {
    pub fn new(
        config: Config,
        oracle: Arc<dyn Oracle>,
        toolchain: Arc<dyn Toolchain>,
        usage: Arc<UsageStore>,
    ) -> Self {
        let guidance = GuidanceLoader::new(config.rules_dir.clone());
        Self {
            config,
            oracle,
            toolchain,
            provisioner: None,
            usage,
            guidance,
        }
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    fn options(&self, max_turns: u32, timeout_sec: u64) -> GenerateOptions {
        let mut options = GenerateOptions::new(&self.config.oracle.model, &self.config.output_dir);
        options.max_turns = max_turns;
        options.timeout = Duration::from_secs(timeout_sec);
        options
    }

    fn record(&self, state: &mut RunState, response: &OracleResponse) {
        state.usage.add(&response.usage);
        self.usage.record(&response.usage);
        if response.session_id.is_some() {
            state.session_id = response.session_id.clone();
        }
    }

    /// Advisory only: any failure but cancellation yields the fallback hint
    async fn intent(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
        state: &mut RunState,
    ) -> Result<IntentHint, PipelineError> {
        let options = self.options(1, self.config.oracle.intent_timeout_sec);
        let message = prompts::intent_prompt(&request.prompt);
        match self.oracle.generate(cancel, &message, &options).await {
            Ok(response) => {
                self.record(state, &response);
                Ok(parse_intent(&response.text))
            }
            Err(OracleError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                warn!("Intent hint failed, using default: {}", e);
                Ok(IntentHint::fallback())
            }
        }
    }

    async fn ask_with_retry(
        &self,
        cancel: &CancellationToken,
        phase: &'static str,
        message: &str,
        options: &GenerateOptions,
        state: &mut RunState,
    ) -> Result<OracleResponse, PipelineError> {
        debug!("Asking {} for {}", self.oracle.name(), phase);
        let response = retry_with_backoff(&self.config.retry, cancel, || {
            self.oracle.generate(cancel, message, options)
        })
        .await
        .map_err(|e| oracle_error(phase, e))?;
        self.record(state, &response);
        Ok(response)
    }

    async fn plan_phases(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
        state: &mut RunState,
    ) -> Result<(IntentHint, AnalysisResult, Plan), PipelineError> {
        // The oracle runs in output_dir from the first call on
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|source| WorkspaceError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;

        let intent = self.intent(cancel, request, state).await?;
        info!("Intent: {:?} (confidence {:.2})", intent.operation, intent.confidence);

        state.phases.advance(Phase::Analyzing)?;
        let mut options = self.options(
            self.config.oracle.analysis_turns,
            self.config.oracle.timeout_sec,
        );
        options.images = request.images.clone();
        let message = prompts::analysis_prompt(&request.prompt, &intent);
        let response = self
            .ask_with_retry(cancel, "analysis", &message, &options, state)
            .await?;
        let analysis = parse_analysis(&response.text)?;
        info!(
            "Analysis: {} with {} features",
            analysis.app_name,
            analysis.features.len()
        );

        state.phases.advance(Phase::Planning)?;
        let options = self.options(self.config.oracle.plan_turns, self.config.oracle.timeout_sec);
        let message = prompts::plan_prompt(&request.prompt, &analysis);
        let response = self
            .ask_with_retry(cancel, "planning", &message, &options, state)
            .await?;
        let mut plan = parse_plan(&response.text)?;
        append_auto_rule_keys(&mut plan);
        info!(
            "Plan: {} files, {} extensions, platforms {:?}",
            plan.files.len(),
            plan.extensions.len(),
            plan.all_platforms()
        );

        Ok((intent, analysis, plan))
    }

    /// Intent, analysis and planning only
    pub async fn plan_only(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
    ) -> Result<PlannedApp, PipelineError> {
        let mut state = RunState::new();
        let (intent, analysis, plan) = self.plan_phases(cancel, request, &mut state).await?;
        Ok(PlannedApp {
            intent,
            analysis,
            plan,
            usage: state.usage,
        })
    }

    /// Full pipeline from request to finalized project
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
    ) -> Result<RunResult, PipelineError> {
        let mut state = RunState::new();
        let (_, _, plan) = match self.plan_phases(cancel, request, &mut state).await {
            Ok(planned) => planned,
            Err(e) => {
                warn!("Run failed during {}", state.phases.current());
                state.phases.fail();
                return Err(e);
            }
        };

        state.phases.advance(Phase::Scaffolding)?;
        let ws = match Workspace::create(&self.config.output_dir, &plan.app_name) {
            Ok(ws) => ws,
            Err(e) => {
                state.phases.fail();
                return Err(e.into());
            }
        };
        self.build_in(cancel, &ws, &plan, &mut state).await
    }

    /// Scaffold, generate and finalize a planned app in `ws`
    async fn build_in(
        &self,
        cancel: &CancellationToken,
        ws: &Workspace,
        plan: &Plan,
        state: &mut RunState,
    ) -> Result<RunResult, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let opts = CompileOptions::from(&self.config);
        let bundle_id = opts.main_bundle_id_for(&plan.app_name);
        let mut summary = RunSummary::new(&run_id, &plan.app_name, ws.root().to_path_buf());
        summary.bundle_id = bundle_id.clone();
        summary.platforms = plan.all_platforms().iter().map(|p| p.to_string()).collect();
        summary.planned_files = plan.files.len();

        let result = self
            .scaffold_and_generate(cancel, ws, plan, &opts, &bundle_id, state, &mut summary)
            .await;

        summary.usage = state.usage;
        match &result {
            Ok(_) => summary.outcome = "success".to_string(),
            Err(e) => {
                warn!("Run failed during {}", state.phases.current());
                state.phases.fail();
                if summary.outcome.is_empty() {
                    summary.outcome = "failed".to_string();
                }
                summary.error = Some(e.to_string());
            }
        }
        if let Err(e) = ws.save_summary(&build_summary_markdown(&summary)) {
            warn!("Failed to write run summary: {}", e);
        }

        let report = result?;

        Ok(RunResult {
            run_id,
            app_name: plan.app_name.clone(),
            project_dir: ws.root().to_path_buf(),
            bundle_id,
            platforms: summary.platforms,
            features: plan.features.clone(),
            planned_files: report.total_planned,
            completed_files: report.valid_count,
            completion_passes: summary.passes,
            session_id: state.session_id.clone(),
            usage: state.usage,
            build_succeeded: summary.build_succeeded,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn scaffold_and_generate(
        &self,
        cancel: &CancellationToken,
        ws: &Workspace,
        plan: &Plan,
        opts: &CompileOptions,
        bundle_id: &str,
        state: &mut RunState,
        summary: &mut RunSummary,
    ) -> Result<CompletionReport, PipelineError> {
        ws.save_plan(plan)?;
        let graph = compile(plan, opts);
        let scaffold = materialize(ws, plan, &graph)?;
        info!(
            "Scaffolded {} files into {}",
            scaffold.files_written,
            ws.root().display()
        );
        ws.save_project_config(&ProjectConfig::from_plan(plan, &graph, bundle_id))?;
        if let Err(e) = self.toolchain.generate_project(ws.root()).await {
            warn!("Project generation failed, continuing: {}", e);
        }

        let backend_sql = self.prepare_backend(plan).await;
        let report = self
            .generate_loop(cancel, ws, plan, &backend_sql, state, summary)
            .await?;

        state.phases.advance(Phase::Finalizing)?;
        if self.config.pipeline.build_check {
            summary.build_succeeded = Some(self.build_check(ws, &graph).await);
        }
        let finalized = finalize(ws, &graph.name, self.toolchain.as_ref(), &self.config.finalize).await;
        debug!("Finalize: {:?}", finalized);
        state.phases.advance(Phase::Done)?;
        debug!("Phases: {:?}", state.phases.history());

        Ok(report)
    }

    async fn prepare_backend(&self, plan: &Plan) -> Vec<String> {
        if !plan.backend.required || plan.models.is_empty() {
            return Vec::new();
        }
        if let Some(provisioner) = &self.provisioner {
            let report = provision(provisioner.as_ref(), &plan.models).await;
            if !report.failed.is_empty() {
                warn!("{} backend statements failed", report.failed.len());
            }
        }
        schema_statements(&plan.models)
    }

    async fn generate_loop(
        &self,
        cancel: &CancellationToken,
        ws: &Workspace,
        plan: &Plan,
        backend_sql: &[String],
        state: &mut RunState,
        summary: &mut RunSummary,
    ) -> Result<CompletionReport, PipelineError> {
        let mut passes = PassTracker::new(self.config.pipeline.max_passes);
        let guidance = self.guidance.render(&plan.rule_keys);
        let mut report: Option<CompletionReport> = None;

        let outcome = loop {
            let pass = passes.next_pass();
            state.phases.advance(Phase::Generating)?;
            if cancel.is_cancelled() {
                break PassOutcome::Cancelled;
            }

            let (message, options) = match &report {
                None => {
                    let mut options = self.options(
                        self.config.oracle.build_turns,
                        self.config.oracle.timeout_sec,
                    );
                    options.working_dir = ws.root().to_path_buf();
                    options.allowed_tools = self.config.oracle.tools.clone();
                    options.append_system_prompt = Some(prompts::BUILD_SYSTEM_PROMPT.to_string());
                    let message = prompts::build_prompt(plan, ws.root(), &guidance, backend_sql);
                    (message, options)
                }
                Some(previous) => {
                    let mut options = self.options(
                        self.config.oracle.recovery_turns,
                        self.config.oracle.timeout_sec,
                    );
                    options.working_dir = ws.root().to_path_buf();
                    options.allowed_tools = self.config.oracle.tools.clone();
                    options.session_id = state.session_id.clone();
                    (prompts::recovery_prompt(plan, previous), options)
                }
            };

            info!("Pass {}/{}", pass, passes.max_passes());
            let mut on_event = |event: &StreamEvent| log_event(event);
            match self
                .oracle
                .generate_streaming(cancel, &message, &options, &mut on_event)
                .await
            {
                Ok(response) => self.record(state, &response),
                Err(OracleError::Cancelled) => break PassOutcome::Cancelled,
                Err(e) => warn!("Pass {} oracle call failed: {}", pass, e),
            }

            state.phases.advance(Phase::Verifying)?;
            strip_superseded_placeholders(ws.root())?;
            let current = verify_plan(plan, ws.root());
            ws.save_report(&current)?;
            info!(
                "Pass {}: {}/{} files valid",
                pass, current.valid_count, current.total_planned
            );

            let decision = passes.observe_report(&current);
            report = Some(current);
            if let PassDecision::Stop(outcome) = decision {
                break outcome;
            }
        };

        summary.passes = passes.passes();
        summary.valid_counts = passes.valid_counts().to_vec();
        summary.outcome = match outcome {
            PassOutcome::Success => "success",
            PassOutcome::ExhaustedRetries => "exhausted_retries",
            PassOutcome::Stalled => "stalled",
            PassOutcome::Cancelled => "cancelled",
        }
        .to_string();
        if let Some(report) = &report {
            summary.completed_files = report.valid_count;
        }

        match (outcome, report) {
            (PassOutcome::Success, Some(report)) => Ok(report),
            (PassOutcome::Stalled, Some(report)) => Err(PipelineError::Stalled {
                pass: passes.passes(),
                valid: report.valid_count,
                previous: passes.previous_valid().unwrap_or_default(),
                unresolved: report.unresolved(),
            }),
            (PassOutcome::ExhaustedRetries, Some(report)) => Err(PipelineError::Incomplete {
                passes: passes.passes(),
                unresolved: report.unresolved(),
            }),
            _ => Err(PipelineError::Cancelled),
        }
    }

    /// Build every scheme; true only if all builds pass
    async fn build_check(&self, ws: &Workspace, graph: &TargetGraph) -> bool {
        let mut all_ok = true;
        for (name, scheme) in &graph.schemes {
            let Some(target) = graph
                .target(&scheme.run.executable)
                .filter(|t| t.target_type.is_runnable())
            else {
                continue;
            };
            let destination = self.config.destination_for(&target.platform.to_string());
            match self
                .toolchain
                .build(ws.root(), &graph.name, name, &destination)
                .await
            {
                Ok(outcome) if outcome.success => info!("Build check passed: {}", name),
                Ok(outcome) => {
                    warn!("Build check failed for {} (exit {})", name, outcome.exit_code);
                    all_ok = false;
                }
                Err(e) => {
                    warn!("Build check could not run for {}: {}", name, e);
                    all_ok = false;
                }
            }
        }
        all_ok
    }
}
