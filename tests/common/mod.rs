//! Scripted stand-in for the battle game, driven through the stub driver.
#![allow(dead_code)]

use action_primitives::LOG_ENTRY;
use cdp_adapter::{BrowserDriver, StubDriver, StubElement, StubPage};
use parking_lot::Mutex;
use runebattle_core_types::EnemyKind;
use runebattle_e2e::HarnessConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const MARKERS: [&str; 3] = ["camp-scene", "battle-scene", "shop-interface"];
pub const SPELLS: [&str; 3] = ["火球术", "冰锥", "治疗术"];
/// The game keeps this many battle-log entries.
pub const LOG_LIMIT: usize = 50;

/// How the battle-log panel renders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanelStyle {
    /// One `.log-entry` element per line, classed by author.
    #[default]
    Entries,
    /// Plain text lines inside `#battle-log`.
    Prose,
}

/// Append a battle-log line written by `author` (`player`, `enemy`, `system`).
pub fn write_log(page: &mut StubPage, style: PanelStyle, author: &str, text: &str) {
    match style {
        PanelStyle::Entries => page.push_bounded(
            LOG_ENTRY,
            StubElement::visible(text).with_attribute("class", format!("log-entry {author}")),
            LOG_LIMIT,
        ),
        PanelStyle::Prose => page.append_text("#battle-log", text),
    }
}

fn clear_log(page: &mut StubPage) {
    page.remove(LOG_ENTRY);
    page.set_text("#battle-log", "");
}

/// How one battle plays out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    /// Battle starts and returns to camp after `duration`.
    Normal,
    /// The battle scene never activates.
    NeverEnter,
    /// The battle starts and never ends.
    NeverEnd,
    /// Spell clicks fail for lack of MP and the enemy acts instead.
    Starved,
}

#[derive(Clone, Debug)]
pub struct Encounter {
    pub enemy: EnemyKind,
    pub behavior: Behavior,
    pub duration: Duration,
    /// Extra battle-log lines written mid-battle, with their author.
    pub chatter: Vec<(&'static str, String)>,
}

impl Encounter {
    pub fn normal(enemy: EnemyKind) -> Self {
        Self {
            enemy,
            behavior: Behavior::Normal,
            duration: Duration::from_secs(8),
            chatter: Vec::new(),
        }
    }

    pub fn quick(enemy: EnemyKind) -> Self {
        Self {
            duration: Duration::from_secs(3),
            ..Self::normal(enemy)
        }
    }

    pub fn never_enter() -> Self {
        Self {
            behavior: Behavior::NeverEnter,
            ..Self::normal(EnemyKind::Wolf)
        }
    }

    pub fn never_end(enemy: EnemyKind) -> Self {
        Self {
            behavior: Behavior::NeverEnd,
            ..Self::normal(enemy)
        }
    }

    /// The spells never go off; each click gives the enemy a turn.
    pub fn starved(enemy: EnemyKind) -> Self {
        Self {
            behavior: Behavior::Starved,
            duration: Duration::from_secs(20),
            ..Self::normal(enemy)
        }
    }

    pub fn with_enemy_line(mut self, line: &str) -> Self {
        self.chatter.push(("enemy", line.to_string()));
        self
    }

    pub fn with_system_line(mut self, line: &str) -> Self {
        self.chatter.push(("system", line.to_string()));
        self
    }
}

#[derive(Default)]
struct GameState {
    queue: VecDeque<Encounter>,
    /// Enemy picked through the developer select.
    forced: Option<EnemyKind>,
    battles_started: u32,
    /// Encounter in progress.
    current: Option<Encounter>,
    style: PanelStyle,
}

pub struct FakeGame {
    pub driver: Arc<StubDriver>,
    state: Arc<Mutex<GameState>>,
}

impl FakeGame {
    pub fn new(encounters: Vec<Encounter>) -> Self {
        let driver = Arc::new(StubDriver::new());
        let state = Arc::new(Mutex::new(GameState {
            queue: encounters.into(),
            ..GameState::default()
        }));
        let game = Self { driver, state };
        game.wire();
        game
    }

    /// Adds the developer-mode enemy select.
    pub fn with_dev_mode(self) -> Self {
        let state = self.state.clone();
        self.driver.on_select("#dev-enemy-select", move |page, value| {
            state.lock().forced = value.parse().ok();
            page.log(format!("[DEV] 选择敌人: {value}"));
        });
        self.driver.edit(|page| {
            page.set(
                "#dev-enemy-select",
                StubElement::select(&["random", "wolf", "goblin", "ogre"]),
            )
        });
        self
    }

    /// Render the battle log as plain text instead of entry elements.
    pub fn with_prose_panel(self) -> Self {
        self.state.lock().style = PanelStyle::Prose;
        self
    }

    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        self.driver.clone()
    }

    pub fn battles_started(&self) -> u32 {
        self.state.lock().battles_started
    }

    fn wire(&self) {
        self.driver.on_navigate(reset_camp);
        self.driver.on_reload(reset_camp);

        let state = self.state.clone();
        self.driver.on_click("#start-battle-btn", move |page| {
            let mut state = state.lock();
            state.battles_started += 1;
            let mut encounter = state
                .queue
                .pop_front()
                .unwrap_or_else(|| Encounter::normal(EnemyKind::Wolf));
            if let Some(forced) = state.forced {
                encounter.enemy = forced;
            }
            state.current = Some(encounter.clone());
            start_battle(page, state.style, encounter);
        });

        let state = self.state.clone();
        self.driver.on_click(".spell-button", move |page| {
            let state = state.lock();
            let style = state.style;
            match state.current.as_ref() {
                Some(encounter) if encounter.behavior == Behavior::Starved => {
                    enemy_turn(page, style, encounter.enemy)
                }
                _ => player_cast(page, style),
            }
        });

        let state = self.state.clone();
        self.driver.on_click("#rest-btn", move |page| {
            let style = state.lock().style;
            write_log(page, style, "system", "休息了一下，恢复了全部HP和MP！");
        });

        self.driver.on_click("#open-shop-btn", |page| {
            page.set_active("shop-interface", true);
            page.log("[SCENE] 打开商店");
        });

        self.driver.on_click("#close-shop-btn", |page| {
            page.set_active("shop-interface", false);
        });

        let state = self.state.clone();
        self.driver.on_click(".buy-btn", move |page| {
            let style = state.lock().style;
            page.log("[SHOP] 购买成功！剩余金币: 70");
            write_log(page, style, "system", "花费 50 金币购买了 1 个 火焰符文！");
        });
    }
}

fn player_cast(page: &mut StubPage, style: PanelStyle) {
    write_log(page, style, "player", "开始吟唱 火球术...");
    hide_spells(page);
    page.schedule(
        Duration::from_secs(1),
        Arc::new(move |page: &mut StubPage| {
            if page.contains("#battle-scene.active") {
                write_log(page, style, "player", "使用 火球术 造成 12 点伤害！");
            }
        }),
    );
    page.schedule(
        Duration::from_secs(2),
        Arc::new(|page: &mut StubPage| {
            if page.contains("#battle-scene.active") {
                show_spells(page);
            }
        }),
    );
}

/// The click fizzles and the enemy casts and hits in the player's words.
fn enemy_turn(page: &mut StubPage, style: PanelStyle, enemy: EnemyKind) {
    write_log(page, style, "system", "MP不足！");
    let name = enemy.display_name().to_string();
    page.schedule(
        Duration::from_millis(200),
        Arc::new(move |page: &mut StubPage| {
            page.log(format!("[ENEMY] {name} 开始吟唱 撕咬"));
            write_log(page, style, "enemy", &format!("{name} 开始吟唱 撕咬..."));
        }),
    );
    let name = enemy.display_name().to_string();
    page.schedule(
        Duration::from_millis(400),
        Arc::new(move |page: &mut StubPage| {
            write_log(page, style, "enemy", &format!("{name} 使用 撕咬 造成 6 点伤害！"));
        }),
    );
}

fn reset_camp(page: &mut StubPage) {
    page.activate_exclusive(&MARKERS, "camp-scene");
    page.set("#start-battle-btn", StubElement::visible("开始战斗"));
    page.set("#rest-btn", StubElement::visible("休息"));
    page.set("#open-shop-btn", StubElement::visible("商店"));
    page.set("#close-shop-btn", StubElement::visible("关闭"));
    page.set("#resource-info", StubElement::visible("金币: 120\n经验: 30"));
    page.set_all(
        ".shop-item",
        vec![
            StubElement::visible("火焰符文 50").with_child(".buy-btn", StubElement::visible("购买")),
            StubElement::visible("冰霜符文 60").with_child(".buy-btn", StubElement::visible("购买")),
        ],
    );
    page.set_all(
        ".spell-slot",
        SPELLS.iter().map(|name| StubElement::visible(*name)).collect(),
    );
    page.remove(".spell-button");
    clear_log(page);
}

fn start_battle(page: &mut StubPage, style: PanelStyle, encounter: Encounter) {
    if encounter.behavior == Behavior::NeverEnter {
        return;
    }
    let name = encounter.enemy.display_name().to_string();
    let chatter = encounter.chatter.clone();
    page.schedule(
        Duration::from_millis(500),
        Arc::new(move |page: &mut StubPage| {
            page.activate_exclusive(&MARKERS, "battle-scene");
            clear_log(page);
            write_log(page, style, "system", &format!("战斗开始！遇到了 {name}"));
            page.log(format!("[BATTLE] 遇到了 {name} (HP: 30)"));
            page.set_all(
                ".spell-button",
                SPELLS.iter().map(|spell| StubElement::hidden(*spell)).collect(),
            );
        }),
    );
    page.schedule(
        Duration::from_millis(2_500),
        Arc::new(move |page: &mut StubPage| {
            show_spells(page);
            for (author, line) in &chatter {
                write_log(page, style, author, line);
            }
        }),
    );
    if encounter.behavior == Behavior::NeverEnd {
        return;
    }
    let name = encounter.enemy.display_name().to_string();
    page.schedule(
        Duration::from_millis(500) + encounter.duration,
        Arc::new(move |page: &mut StubPage| {
            page.activate_exclusive(&MARKERS, "camp-scene");
            page.remove(".spell-button");
            write_log(page, style, "system", "获得 15 金币！");
            write_log(page, style, "system", "获得 10 经验值！");
            write_log(page, style, "system", &format!("战斗胜利！击败了 {name}"));
            page.log(format!("[BATTLE] 战斗胜利！击败了 {name}"));
        }),
    );
}

fn show_spells(page: &mut StubPage) {
    page.set_all(
        ".spell-button",
        SPELLS.iter().map(|spell| StubElement::visible(*spell)).collect(),
    );
}

fn hide_spells(page: &mut StubPage) {
    page.set_all(
        ".spell-button",
        SPELLS.iter().map(|spell| StubElement::hidden(*spell)).collect(),
    );
}

pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.base_url = "http://localhost:3001/test/".to_string();
    config
}
