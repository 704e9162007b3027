//! Browser sessions. Each scenario run owns one private page; parallel runs
//! share nothing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cdp_adapter::{AdapterMode, BrowserDriver, CdpConfig, TeardownReport};
use runebattle_core_types::RunId;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::HarnessConfig;
use crate::scenario::{ScenarioPlan, ScenarioRun, ScenarioRunner};

/// Opens an isolated browser session.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, session: usize) -> Result<Arc<dyn BrowserDriver>>;
}

/// Launches a fresh Chromium per session.
pub struct ChromiumLauncher {
    browser: CdpConfig,
}

impl ChromiumLauncher {
    pub fn new(browser: CdpConfig) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self, session: usize) -> Result<Arc<dyn BrowserDriver>> {
        let driver = cdp_adapter::connect(AdapterMode::Real, &self.browser)
            .await
            .with_context(|| format!("failed to launch browser for session {session}"))?;
        info!(session, headless = self.browser.headless, "browser session launched");
        Ok(driver)
    }
}

/// Launch, run `plan`, tear down. Teardown happens even when the run fails.
pub async fn run_session(
    launcher: &dyn SessionLauncher,
    config: HarnessConfig,
    plan: &ScenarioPlan,
    session: usize,
    run_id: RunId,
) -> Result<ScenarioRun> {
    let driver = launcher.launch(session).await?;
    let outcome = match ScenarioRunner::new(driver.clone(), config) {
        Ok(runner) => {
            runner
                .with_session(session)
                .with_run_id(run_id)
                .run(plan)
                .await
        }
        Err(err) => Err(err),
    };

    let teardown = driver.close().await;
    match teardown {
        TeardownReport::Graceful => info!(session, "browser session closed"),
        TeardownReport::Forced => warn!(session, "browser did not close cleanly; killed"),
        TeardownReport::Abandoned => error!(session, "browser could not be stopped; abandoned"),
    }

    let mut run = outcome?;
    run.teardown = Some(teardown);
    Ok(run)
}

/// Run `plan` in `sessions` isolated sessions at once. Results come back in
/// session order.
pub async fn run_parallel(
    launcher: Arc<dyn SessionLauncher>,
    config: HarnessConfig,
    plan: ScenarioPlan,
    sessions: usize,
    run_id: RunId,
) -> Vec<Result<ScenarioRun>> {
    let mut set = JoinSet::new();
    for session in 0..sessions {
        let launcher = launcher.clone();
        let config = config.clone();
        let plan = plan.clone();
        let run_id = run_id.clone();
        set.spawn(async move {
            let outcome = run_session(launcher.as_ref(), config, &plan, session, run_id).await;
            (session, outcome)
        });
    }

    let mut finished: Vec<(usize, Result<ScenarioRun>)> = Vec::with_capacity(sessions);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(entry) => finished.push(entry),
            Err(err) => {
                error!(%err, "session task aborted");
                finished.push((usize::MAX, Err(anyhow!("session task aborted: {err}"))));
            }
        }
    }
    finished.sort_by_key(|(session, _)| *session);
    finished.into_iter().map(|(_, outcome)| outcome).collect()
}
