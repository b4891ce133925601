use crate::cli::UsageArgs;
use crate::config::Config;
use crate::usage::read_ledger;
use std::path::Path;

pub fn execute(args: UsageArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match args.ledger {
        Some(path) => path,
        None => Config::load_or_default(config_path)?.ledger_path(),
    };
    let ledger = read_ledger(&path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
        return Ok(());
    }

    if ledger.days.is_empty() {
        println!("No usage recorded in {}", path.display());
        return Ok(());
    }

    println!("{:<12} {:>6} {:>10} {:>12}", "Day", "Calls", "Cost", "Tokens");
    for (day, rollup) in &ledger.days {
        println!(
            "{:<12} {:>6} {:>10} {:>12}",
            day,
            rollup.calls,
            format!("${:.4}", rollup.usage.cost_usd),
            rollup.usage.total_tokens()
        );
    }
    Ok(())
}
