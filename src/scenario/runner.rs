//! The battle loop.
//!
//! One runner drives every scenario plan. Each battle walks the same phases:
//!
//! ```text
//! Idle -> AwaitingBattle -> InBattle -> AwaitingCamp -> Done
//!              |                              |
//!              +---------> Recovering <-------+
//! ```
//!
//! A scene timeout reloads the page and records what was gathered so far. A
//! second consecutive timeout stops the scenario.

use action_primitives::{
    poll_until, ActionDispatcher, ActionError, Control, Panel, PollPolicy, SceneWaiter,
};
use anyhow::{Context, Result};
use cdp_adapter::BrowserDriver;
use chrono::Utc;
use parking_lot::Mutex;
use perceiver_events::EventClassifier;
use runebattle_core_types::{
    BattleOutcome, EnemyKind, GameEvent, LogEntry, RunId, ScenarioResult, SceneState,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::scenario::camp::CampReport;
use crate::scenario::log::{Checkpoint, PanelCursor};
use crate::scenario::plan::{CampWait, CastMode, ScenarioPlan};
use crate::scenario::{ScenarioRun, SpellAttempt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BattlePhase {
    Idle,
    AwaitingBattle,
    InBattle,
    AwaitingCamp,
    Recovering,
    Done,
}

/// Mutable state of the battle in flight. Frozen into a [`ScenarioResult`].
struct BattleState {
    attempt: u32,
    requested: Option<EnemyKind>,
    enemy: EnemyKind,
    events: Vec<GameEvent>,
    log_lines: Vec<String>,
    /// `log_lines` with their author, for enemy identification.
    entries: Vec<LogEntry>,
    casts: u32,
    outcome: BattleOutcome,
}

impl BattleState {
    fn new(attempt: u32, requested: Option<EnemyKind>) -> Self {
        Self {
            attempt,
            requested,
            enemy: EnemyKind::Unknown,
            events: Vec::new(),
            log_lines: Vec::new(),
            entries: Vec::new(),
            casts: 0,
            outcome: BattleOutcome::Completed,
        }
    }

    /// Append newly classified events, keeping first-seen order.
    fn record(&mut self, found: BTreeSet<GameEvent>) {
        for event in found {
            if !self.events.contains(&event) {
                self.events.push(event);
            }
        }
    }

    fn keep(&mut self, checkpoint: Checkpoint) {
        self.record(checkpoint.events);
        self.log_lines.extend(checkpoint.lines);
        self.entries.extend(checkpoint.entries);
    }

    fn finish(self) -> ScenarioResult {
        ScenarioResult {
            attempt: self.attempt,
            enemy: self.enemy,
            requested_enemy: self.requested,
            events: self.events,
            log_lines: self.log_lines,
            casts: self.casts,
            outcome: self.outcome,
        }
    }
}

pub struct ScenarioRunner {
    pub(crate) driver: Arc<dyn BrowserDriver>,
    pub(crate) waiter: SceneWaiter,
    pub(crate) dispatcher: ActionDispatcher,
    pub(crate) classifier: EventClassifier,
    pub(crate) config: HarnessConfig,
    panel: Mutex<PanelCursor>,
    run_id: RunId,
    session: usize,
}

impl ScenarioRunner {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: HarnessConfig) -> Result<Self> {
        let classifier = EventClassifier::new().context("failed to build event classifier")?;
        Ok(Self {
            waiter: SceneWaiter::new(driver.clone()),
            dispatcher: ActionDispatcher::new(driver.clone()),
            driver,
            classifier,
            config,
            panel: Mutex::new(PanelCursor::default()),
            run_id: RunId::new(),
            session: 0,
        })
    }

    pub fn with_session(mut self, session: usize) -> Self {
        self.session = session;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Load the game and wait for it to settle.
    pub async fn open(&self) -> Result<()> {
        let url = &self.config.base_url;
        self.driver
            .navigate(url)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        if let Err(err) = self
            .driver
            .wait_for_network_idle(self.config.timings.network_idle_timeout)
            .await
        {
            warn!(%err, "network did not go idle after load; continuing");
        }
        let dropped = self.discard_pending().await?;
        info!(%url, session = self.session, dropped, "game loaded");
        Ok(())
    }

    /// Run `plan` to completion. Errors mean the session itself failed; a
    /// scenario that merely misbehaved comes back as a [`ScenarioRun`].
    pub async fn run(&self, plan: &ScenarioPlan) -> Result<ScenarioRun> {
        let started_at = Utc::now();
        info!(scenario = plan.name(), session = self.session, run_id = %self.run_id, "scenario started");
        self.open().await?;

        let mut camp_report = CampReport::default();
        if plan.camp_checks {
            self.camp_checks_before(&mut camp_report).await?;
        }

        let mut results = Vec::new();
        let mut tried = Vec::new();
        let mut seen: BTreeSet<EnemyKind> = BTreeSet::new();
        let mut consecutive_timeouts = 0u32;
        let mut escalated = false;

        for attempt in 1..=plan.attempt_limit() {
            if plan.stop_when_all_seen && EnemyKind::KNOWN.iter().all(|kind| seen.contains(kind)) {
                break;
            }

            let requested = plan.enemy_selection.pick(attempt);
            let (result, timeouts) = self
                .run_battle(plan, attempt, requested, &seen, &mut tried)
                .await?;

            info!(
                attempt,
                enemy = %result.enemy,
                outcome = ?result.outcome,
                casts = result.casts,
                events = result.events.len(),
                "battle finished"
            );

            if result.enemy.is_known() {
                seen.insert(result.enemy);
            }
            results.push(result);

            consecutive_timeouts = if timeouts == 0 {
                0
            } else {
                consecutive_timeouts + timeouts
            };
            if consecutive_timeouts >= 2 {
                warn!(attempt, scenario = plan.name(), "second consecutive scene timeout; escalating");
                escalated = true;
                self.capture_failure(attempt).await;
                break;
            }
        }

        if plan.camp_checks && !escalated {
            self.camp_checks_after(&mut camp_report).await?;
        }

        let attempts_exhausted = plan.stop_when_all_seen
            && !escalated
            && !EnemyKind::KNOWN.iter().all(|kind| seen.contains(kind));
        if attempts_exhausted {
            warn!(
                max_attempts = plan.max_attempts,
                seen = seen.len(),
                "attempt budget exhausted before every enemy kind was seen"
            );
        }

        Ok(ScenarioRun {
            plan: plan.clone(),
            session: self.session,
            results,
            spell_attempts: tried,
            camp_report: plan.camp_checks.then_some(camp_report),
            escalated,
            attempts_exhausted,
            started_at,
            finished_at: Utc::now(),
            teardown: None,
        })
    }

    /// Returns the frozen result and how many scene timeouts it hit.
    async fn run_battle(
        &self,
        plan: &ScenarioPlan,
        attempt: u32,
        requested: Option<EnemyKind>,
        seen: &BTreeSet<EnemyKind>,
        tried: &mut Vec<SpellAttempt>,
    ) -> Result<(ScenarioResult, u32)> {
        let timings = &self.config.timings;
        let mut state = BattleState::new(attempt, requested);
        let mut timeouts = 0u32;
        let mut phase = BattlePhase::Idle;

        loop {
            debug!(attempt, ?phase, "battle phase");
            phase = match phase {
                BattlePhase::Idle => {
                    if let Some(kind) = requested {
                        self.dispatcher.select_dev_enemy(kind).await?;
                    }
                    let dropped = self.discard_pending().await?;
                    debug!(attempt, dropped, "cleared pending output before battle");

                    if self.await_control(Control::StartBattle).await?
                        && self.dispatcher.click_if_present(Control::StartBattle).await?
                    {
                        BattlePhase::AwaitingBattle
                    } else {
                        warn!(attempt, "start battle control unavailable; skipping");
                        state.outcome = BattleOutcome::Skipped;
                        BattlePhase::Done
                    }
                }
                BattlePhase::AwaitingBattle => {
                    match self
                        .waiter
                        .await_scene(SceneState::Battle, timings.battle_scene_timeout)
                        .await
                    {
                        Ok(()) => BattlePhase::InBattle,
                        Err(ActionError::SceneTimeout { .. }) => {
                            timeouts += 1;
                            state.outcome = BattleOutcome::EntryTimedOut;
                            BattlePhase::Recovering
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                BattlePhase::InBattle => {
                    state.enemy = self.identify_enemy(&mut state).await?;
                    info!(attempt, enemy = %state.enemy, "enemy classified");

                    let cast_here = plan.casts_enabled()
                        && !(plan.cast_unseen_only
                            && (state.enemy == EnemyKind::Unknown || seen.contains(&state.enemy)));
                    if cast_here {
                        self.cast(plan, &mut state, tried).await?;
                    }

                    if plan.camp_wait == CampWait::Skip {
                        BattlePhase::Done
                    } else {
                        BattlePhase::AwaitingCamp
                    }
                }
                BattlePhase::AwaitingCamp => {
                    let limit = match plan.camp_wait {
                        CampWait::Quick => timings.quick_camp_timeout,
                        _ => timings.camp_timeout,
                    };
                    match self.waiter.await_scene(SceneState::Camp, limit).await {
                        Ok(()) => BattlePhase::Done,
                        Err(ActionError::SceneTimeout { .. }) => {
                            timeouts += 1;
                            state.outcome = BattleOutcome::ForceEnded;
                            self.absorb(&mut state).await?;
                            BattlePhase::Recovering
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                BattlePhase::Recovering => {
                    self.resync().await?;
                    BattlePhase::Done
                }
                BattlePhase::Done => break,
            };
        }

        if state.outcome == BattleOutcome::Completed {
            self.absorb(&mut state).await?;
        }
        // a forced reload lands back at camp, so those battles rest too
        if plan.rest_after_battle && state.outcome != BattleOutcome::Skipped {
            if let Some(rested) = self.rest().await? {
                debug!(attempt, events = rested.events.len(), "rest recorded");
                if state.outcome == BattleOutcome::EntryTimedOut {
                    state.log_lines.extend(rested.lines);
                } else {
                    state.keep(rested);
                }
            }
        }

        Ok((state.finish(), timeouts))
    }

    /// Dispatch casts per the plan's mode.
    async fn cast(
        &self,
        plan: &ScenarioPlan,
        state: &mut BattleState,
        tried: &mut Vec<SpellAttempt>,
    ) -> Result<()> {
        let timings = &self.config.timings;
        match plan.cast_mode {
            CastMode::FirstVisible => {
                while state.casts < plan.cast_budget {
                    let charge = if state.casts == 0 {
                        timings.atb_charge
                    } else {
                        timings.recharge
                    };
                    if !self.await_spell_ready(charge).await? {
                        debug!(attempt = state.attempt, "no spell became actionable");
                        break;
                    }
                    match self.dispatcher.cast_first_visible().await? {
                        Some(index) => {
                            state.casts += 1;
                            let started = self.settle(state).await?;
                            debug!(attempt = state.attempt, index, started, "cast settled");
                        }
                        None => break,
                    }
                    if !self.waiter.is_active(SceneState::Battle).await? {
                        debug!(attempt = state.attempt, "battle ended while casting");
                        break;
                    }
                }
            }
            CastMode::EachIndex(count) => {
                for index in 0..count {
                    let charge = if index == 0 {
                        timings.atb_charge
                    } else {
                        timings.recharge
                    };
                    self.await_spell_ready(charge).await?;
                    let dispatched = self.dispatcher.cast_at(index).await?;
                    let cast_started = if dispatched {
                        state.casts += 1;
                        self.settle(state).await?
                    } else {
                        false
                    };
                    info!(attempt = state.attempt, index, dispatched, cast_started, "spell button tried");
                    tried.push(SpellAttempt {
                        attempt: state.attempt,
                        index,
                        dispatched,
                        cast_started,
                    });
                }
            }
        }
        Ok(())
    }

    /// Absorb entry output until an enemy is named or the settle bound passes.
    async fn identify_enemy(&self, state: &mut BattleState) -> Result<EnemyKind> {
        let mut backoff = PollPolicy::bounded(self.config.timings.settle).start();
        loop {
            self.absorb(state).await?;
            let enemy = self.classifier.classify_enemy_in(&state.entries);
            if enemy.is_known() || !backoff.wait().await {
                return Ok(enemy);
            }
        }
    }

    /// Wait (bounded) for a visible spell button.
    async fn await_spell_ready(&self, bound: Duration) -> Result<bool> {
        let dispatcher = &self.dispatcher;
        let ready = poll_until(PollPolicy::bounded(bound), || dispatcher.any_spell_visible()).await?;
        Ok(ready)
    }

    /// Absorb output until the player's cast-started line shows up or the
    /// settle bound passes. Returns whether one did.
    async fn settle(&self, state: &mut BattleState) -> Result<bool> {
        let mut backoff = PollPolicy::bounded(self.config.timings.settle).start();
        loop {
            let found = self.absorb(state).await?;
            if found.iter().any(GameEvent::is_cast_started) {
                return Ok(true);
            }
            if !backoff.wait().await {
                return Ok(false);
            }
        }
    }

    /// Checkpoint into the battle in flight. Returns the newly classified
    /// events.
    async fn absorb(&self, state: &mut BattleState) -> Result<BTreeSet<GameEvent>> {
        let checkpoint = self.checkpoint().await?;
        let found = checkpoint.events.clone();
        if !checkpoint.is_empty() {
            state.keep(checkpoint);
        }
        Ok(found)
    }

    /// Drain the console and read the battle-log entries added since the
    /// last checkpoint. Console lines go through their channel rules, panel
    /// entries through their author's.
    pub(crate) async fn checkpoint(&self) -> Result<Checkpoint> {
        let console = self.driver.drain_console();
        let panel = self.read_panel().await?;
        let fresh = self.panel.lock().advance(panel);

        let mut events = self.classifier.classify_lines(console.as_slice());
        events.extend(self.classifier.classify_entries(&fresh));

        let mut entries: Vec<LogEntry> = console
            .into_iter()
            .map(|line| LogEntry::new(None, line))
            .collect();
        entries.extend(fresh);
        let lines = entries.iter().map(|entry| entry.text.clone()).collect();
        Ok(Checkpoint {
            lines,
            entries,
            events,
        })
    }

    /// Drop console output and mark the current panel as read. Returns how
    /// many lines were dropped.
    pub(crate) async fn discard_pending(&self) -> Result<usize> {
        let console = self.driver.drain_console().len();
        let panel = self.read_panel().await?;
        let stale = self.panel.lock().advance(panel).len();
        Ok(console + stale)
    }

    /// Battle-log entries, or attributed prose when the panel renders no
    /// entry elements.
    async fn read_panel(&self) -> Result<Vec<LogEntry>> {
        if let Some(entries) = self.dispatcher.read_log_entries().await? {
            return Ok(entries);
        }
        let text = self.dispatcher.read_text(Panel::BattleLog).await?;
        Ok(text
            .iter()
            .flat_map(|text| text.lines())
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.classifier.entry_from_prose(line))
            .collect())
    }

    /// Reload, re-navigate and wait for the page to settle.
    async fn resync(&self) -> Result<()> {
        warn!(session = self.session, "reloading game to recover from scene timeout");
        self.driver.reload().await.context("reload failed")?;
        self.open().await
    }

    /// Rest at camp and wait (bounded) for the game to report it. Returns
    /// everything read meanwhile, `None` when the rest control is unavailable.
    pub(crate) async fn rest(&self) -> Result<Option<Checkpoint>> {
        if !self.dispatcher.click_if_present(Control::Rest).await? {
            debug!("rest control unavailable");
            return Ok(None);
        }
        let mut read = Checkpoint::default();
        let mut backoff = PollPolicy::bounded(self.config.timings.rest_settle).start();
        loop {
            read.merge(self.checkpoint().await?);
            if read.events.contains(&GameEvent::Rested) || read.events.contains(&GameEvent::Healed) {
                break;
            }
            if !backoff.wait().await {
                debug!("no rest confirmation before the settle bound");
                break;
            }
        }
        Ok(Some(read))
    }

    /// Wait (bounded) for a fixed control to be rendered.
    async fn await_control(&self, control: Control) -> Result<bool> {
        match self
            .driver
            .wait_for_selector(control.selector(), self.config.timings.control_timeout)
            .await
        {
            Ok(()) => Ok(true),
            Err(err) if err.is_timeout() => Ok(false),
            Err(err) => Err(ActionError::from(err).into()),
        }
    }

    async fn capture_failure(&self, attempt: u32) {
        if !self.config.screenshot_on_failure {
            return;
        }
        let path: PathBuf = self.config.artifacts_dir.join(self.run_id.to_string()).join(format!(
            "session{}-attempt{}-escalated.png",
            self.session, attempt
        ));
        match self.driver.screenshot(&path).await {
            Ok(()) => info!(path = %path.display(), "saved failure screenshot"),
            Err(err) => warn!(%err, "failed to capture failure screenshot"),
        }
    }
}
