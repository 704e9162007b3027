mod common;

use anyhow::{bail, Result};
use async_trait::async_trait;
use cdp_adapter::{BrowserDriver, TeardownReport};
use common::{test_config, Encounter, FakeGame};
use parking_lot::Mutex;
use runebattle_core_types::{EnemyKind, RunId};
use runebattle_e2e::cli::{execute_plan, OutputFormat};
use runebattle_e2e::{run_parallel, RunPolicy, ScenarioPlan, SessionLauncher};
use std::sync::Arc;

/// Hands every session its own scripted game.
struct FakeLauncher {
    script: Vec<EnemyKind>,
    teardown: TeardownReport,
    games: Mutex<Vec<(usize, Arc<FakeGame>)>>,
}

impl FakeLauncher {
    fn new(script: Vec<EnemyKind>) -> Self {
        Self {
            script,
            teardown: TeardownReport::Graceful,
            games: Mutex::new(Vec::new()),
        }
    }

    fn started(&self, session: usize) -> u32 {
        self.games
            .lock()
            .iter()
            .find(|(index, _)| *index == session)
            .map(|(_, game)| game.battles_started())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, session: usize) -> Result<Arc<dyn BrowserDriver>> {
        let game = Arc::new(FakeGame::new(
            self.script.iter().map(|kind| Encounter::quick(*kind)).collect(),
        ));
        game.driver.set_teardown(self.teardown);
        let driver = game.driver();
        self.games.lock().push((session, game));
        Ok(driver)
    }
}

struct BrokenLauncher;

#[async_trait]
impl SessionLauncher for BrokenLauncher {
    async fn launch(&self, session: usize) -> Result<Arc<dyn BrowserDriver>> {
        bail!("no browser for session {session}")
    }
}

#[tokio::test(start_paused = true)]
async fn parallel_sessions_stay_isolated() {
    use EnemyKind::{Goblin, Ogre, Wolf};
    let launcher = Arc::new(FakeLauncher::new(vec![Wolf, Goblin, Ogre]));
    let plan = ScenarioPlan::repeated_battles(3, &RunPolicy::default());

    let outcomes = run_parallel(launcher.clone(), test_config(), plan, 2, RunId::new()).await;

    assert_eq!(outcomes.len(), 2);
    for (session, outcome) in outcomes.iter().enumerate() {
        let run = outcome.as_ref().unwrap();
        assert_eq!(run.session, session);
        assert_eq!(run.results.len(), 3);
        assert_eq!(run.teardown, Some(TeardownReport::Graceful));
        assert_eq!(launcher.started(session), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn forced_teardown_is_reported() {
    let mut launcher = FakeLauncher::new(vec![EnemyKind::Ogre]);
    launcher.teardown = TeardownReport::Forced;
    let plan = ScenarioPlan::repeated_battles(1, &RunPolicy::default());

    let outcomes = run_parallel(Arc::new(launcher), test_config(), plan, 1, RunId::new()).await;

    let run = outcomes[0].as_ref().unwrap();
    assert_eq!(run.teardown, Some(TeardownReport::Forced));
}

#[tokio::test(start_paused = true)]
async fn execute_plan_writes_the_json_report() {
    use EnemyKind::{Goblin, Ogre, Wolf};
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("reports").join("run.json");
    let launcher = Arc::new(FakeLauncher::new(vec![Wolf, Goblin, Ogre]));
    let plan = ScenarioPlan::repeated_battles(3, &RunPolicy::default());

    let (report, code) = execute_plan(
        launcher,
        test_config(),
        plan,
        &OutputFormat::Json,
        Some(&report_path),
    )
    .await
    .unwrap();

    assert_eq!(code, 0);
    assert!(report.combined.all_enemies_observed);
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved["exit_code"].as_i64(), Some(0));
    assert_eq!(saved["vocabulary_version"].as_str(), Some("zh-CN/1"));
    assert_eq!(saved["combined"]["total"].as_u64(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn every_session_failing_is_an_error() {
    let plan = ScenarioPlan::single_battle(&RunPolicy::default());

    let outcome = execute_plan(
        Arc::new(BrokenLauncher),
        test_config(),
        plan,
        &OutputFormat::Human,
        None,
    )
    .await;

    assert!(outcome.is_err());
}
