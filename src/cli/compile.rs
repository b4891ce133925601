use crate::cli::CompileArgs;
use crate::compiler::{compile, CompileOptions};
use crate::config::Config;
use crate::toolchain::{Toolchain, XcodeToolchain};
use crate::workspace::{materialize, ProjectConfig, Workspace};
use std::path::Path;
use tracing::info;

pub async fn execute(args: CompileArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)?;
    config.validate()?;

    let ws = Workspace::open(&args.project.project);
    let project = ws.load_project_config()?;
    let plan = project.to_plan()?;
    let opts = CompileOptions::from(&config).with_main_bundle_id(&project.bundle_id);
    let graph = compile(&plan, &opts);

    let scaffold = materialize(&ws, &plan, &graph)?;
    info!("Wrote {} files", scaffold.files_written);

    let updated = ProjectConfig::from_plan(&plan, &graph, &project.bundle_id);
    let changed = updated.graph_fingerprint != project.graph_fingerprint;
    if changed {
        ws.save_project_config(&updated)?;
    }

    if args.generate {
        XcodeToolchain::from_config(&config.toolchain)
            .generate_project(ws.root())
            .await?;
    }

    println!(
        "{}: {} targets, {} schemes ({})",
        graph.name,
        graph.targets.len(),
        graph.schemes.len(),
        if changed { "updated" } else { "unchanged" }
    );
    Ok(())
}
