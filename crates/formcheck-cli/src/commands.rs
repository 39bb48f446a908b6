use std::path::Path;

use anyhow::{Context, Result};
use formcheck_cli::report::{print_report, rules_table};
use formcheck_cli::scenario::{ReplayReport, Scenario, replay};
use formcheck_validate::{EngineConfig, parse_rules};
use tracing::{info, info_span};

use crate::cli::{ReplayArgs, RulesArgs};

pub fn run_rules(args: &RulesArgs) -> Result<()> {
    let label = args
        .file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("read rules {}", args.file.display()))?;
    let rules = parse_rules(&label, &text)?;
    info!(rules = rules.len(), "normalized rule declaration");
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
    } else {
        println!("{}", rules_table(&rules));
    }
    Ok(())
}

pub fn run_replay(args: &ReplayArgs) -> Result<ReplayReport> {
    let span = info_span!("scenario", path = %args.scenario.display());
    let _guard = span.enter();
    let scenario = Scenario::load(&args.scenario)?;
    let config = resolve_config(args.config.as_deref(), &scenario)?;
    let report = replay(&scenario, config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report)
}

/// Command line configuration wins over the scenario's own.
fn resolve_config(path: Option<&Path>, scenario: &Scenario) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => scenario.config.clone().unwrap_or_default(),
    };
    config.validate().context("engine configuration")?;
    Ok(config)
}
