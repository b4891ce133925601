use crate::backend::HttpProvisioner;
use crate::cli::BuildArgs;
use crate::compiler::{compile, CompileOptions};
use crate::config::Config;
use crate::oracle::ClaudeOracle;
use crate::pipeline::{BuildRequest, Pipeline, RunResult};
use crate::toolchain::XcodeToolchain;
use crate::usage::UsageStore;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn print_result(result: &RunResult) {
    println!("Built {} in {}", result.app_name, result.project_dir.display());
    println!("  Bundle id:  {}", result.bundle_id);
    println!("  Platforms:  {}", result.platforms.join(", "));
    if !result.features.is_empty() {
        println!("  Features:   {}", result.features.join(", "));
    }
    println!(
        "  Files:      {}/{} in {} pass(es)",
        result.completed_files, result.planned_files, result.completion_passes
    );
    if let Some(ok) = result.build_succeeded {
        println!("  Build:      {}", if ok { "passed" } else { "failed" });
    }
    println!(
        "  Usage:      ${:.4}, {} tokens",
        result.usage.cost_usd,
        result.usage.total_tokens()
    );
}

fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            token.cancel();
        }
    });
    cancel
}

pub async fn execute(args: BuildArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path)?;

    // Apply CLI overrides
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(max_passes) = args.max_passes {
        config.pipeline.max_passes = max_passes;
    }
    if let Some(model) = args.model {
        config.oracle.model = model;
    }
    config.validate()?;

    let oracle = Arc::new(ClaudeOracle::from_config(&config.oracle));
    let toolchain = Arc::new(XcodeToolchain::from_config(&config.toolchain));
    let usage = Arc::new(UsageStore::open(&config.ledger_path()));

    let mut pipeline = Pipeline::new(config.clone(), oracle, toolchain, usage.clone());
    match HttpProvisioner::from_config(&config.backend) {
        Ok(Some(provisioner)) => {
            info!("Backend provisioning through {}", provisioner.endpoint());
            pipeline = pipeline.with_provisioner(Arc::new(provisioner));
        }
        Ok(None) => {}
        Err(e) => warn!("Backend provisioning disabled: {}", e),
    }

    let request = BuildRequest {
        prompt: args.prompt.join(" "),
        images: args.images,
    };
    let cancel = cancel_on_interrupt();

    if args.dry_run {
        info!("DRY RUN - planning only");
        let planned = pipeline.plan_only(&cancel, &request).await?;
        info!(
            "Intent {:?}; analysis scoped {} with {} features",
            planned.intent.operation,
            planned.analysis.app_name,
            planned.analysis.features.len()
        );
        let graph = compile(&planned.plan, &CompileOptions::from(&config));
        print!("{}", graph.to_yaml()?);
        eprintln!(
            "Planning used ${:.4}, {} tokens",
            planned.usage.cost_usd,
            planned.usage.total_tokens()
        );
        return Ok(());
    }

    match pipeline.run(&cancel, &request).await {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
        Err(e) => {
            let spent = usage.snapshot().session.totals;
            eprintln!(
                "Run failed after {} oracle call(s), ${:.4} spent",
                spent.calls, spent.usage.cost_usd
            );
            Err(e.into())
        }
    }
}
