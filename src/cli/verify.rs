use crate::cli::ProjectArgs;
use crate::output::render_report;
use crate::verify::verify_plan;
use crate::workspace::Workspace;

pub fn execute(args: ProjectArgs) -> anyhow::Result<()> {
    let ws = Workspace::open(&args.project);
    let plan = ws.load_plan()?;
    let report = verify_plan(&plan, ws.root());
    ws.save_report(&report)?;

    print!("{}", render_report(&report));

    if !report.complete {
        anyhow::bail!(
            "{} of {} planned files unresolved",
            report.total_planned - report.valid_count,
            report.total_planned
        );
    }
    Ok(())
}
