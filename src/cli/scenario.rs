use anyhow::{bail, Context, Result};
use clap::Args;
use runebattle_core_types::RunId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;
use crate::config::{HarnessConfig, RunPolicy};
use crate::report::render::render;
use crate::report::{HarnessReport, EXIT_SETUP};
use crate::scenario::ScenarioPlan;
use crate::session::{run_parallel, ChromiumLauncher, SessionLauncher};

/// Flags shared by every scenario command. They override the configuration.
#[derive(Args, Clone, Debug, Default)]
pub struct RunOptions {
    /// Game URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,

    /// Override Chrome/Chromium executable path
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Isolated browser sessions to run in parallel
    #[arg(long)]
    pub sessions: Option<usize>,

    /// Spell casts per battle
    #[arg(long)]
    pub cast_budget: Option<u32>,
}

impl RunOptions {
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(path) = &self.chrome_path {
            config.browser.executable = path.clone();
        }
        if let Some(sessions) = self.sessions {
            config.policy.sessions = sessions;
        }
        if let Some(budget) = self.cast_budget {
            config.policy.cast_budget = budget;
        }
    }
}

pub async fn cmd_scenario<F>(ctx: &CliContext, options: RunOptions, build: F) -> Result<i32>
where
    F: FnOnce(&RunPolicy) -> ScenarioPlan,
{
    let mut config = ctx.config().clone();
    options.apply(&mut config);
    config.validate()?;

    let plan = build(&config.policy);
    let launcher: Arc<dyn SessionLauncher> =
        Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let (_, code) = execute_plan(launcher, config, plan, ctx.output(), ctx.report_path()).await?;
    Ok(code)
}

/// Run `plan` in `config.policy.sessions` sessions, print the report and
/// optionally save it as JSON. Returns the report and the exit code.
pub async fn execute_plan(
    launcher: Arc<dyn SessionLauncher>,
    config: HarnessConfig,
    plan: ScenarioPlan,
    output: &OutputFormat,
    report_path: Option<&Path>,
) -> Result<(HarnessReport, i32)> {
    let run_id = RunId::new();
    let sessions = config.policy.sessions;
    info!(%run_id, scenario = plan.name(), sessions, base_url = %config.base_url, "running scenario");

    let outcomes = run_parallel(launcher, config, plan, sessions, run_id.clone()).await;
    let mut runs = Vec::with_capacity(outcomes.len());
    let mut failures = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(run) => runs.push(run),
            Err(err) => {
                failures += 1;
                error!("session failed: {:#}", err);
            }
        }
    }
    if runs.is_empty() {
        bail!("every session failed to run");
    }

    let mut report = HarnessReport::build(run_id, runs)?;
    if failures > 0 {
        report.exit_code = report.exit_code.max(EXIT_SETUP);
    }

    println!("{}", render(&report, output)?);

    if let Some(path) = report_path {
        write_report(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    let code = report.exit_code;
    Ok((report, code))
}

fn write_report(path: &Path, report: &HarnessReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
