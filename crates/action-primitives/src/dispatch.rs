//! UI action dispatch.
//!
//! The game rebuilds its spell buttons and shop list between ticks, so every
//! action resolves its targets fresh and consumes them. An
//! [`InteractiveElementSet`] is not `Clone`: once a handle is taken out and
//! used the rest of the set is dropped with it.

use cdp_adapter::{BrowserDriver, ElementHandle};
use runebattle_core_types::{EnemyKind, LogAuthor, LogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::ActionError;

pub const DEV_ENEMY_SELECT: &str = "#dev-enemy-select";
pub const BUY_BUTTON: &str = ".buy-btn";
/// One rendered battle-log line; its class list names the author.
pub const LOG_ENTRY: &str = "#battle-log .log-entry";
/// Dev selector value that leaves the choice to the game.
pub const RANDOM_ENEMY: &str = "random";

/// Families of dynamically regenerated elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRole {
    SpellButton,
    ShopItem,
    /// Equipped rune slots on the camp screen.
    SpellSlot,
}

impl ElementRole {
    pub fn selector(&self) -> &'static str {
        match self {
            ElementRole::SpellButton => ".spell-button",
            ElementRole::ShopItem => ".shop-item",
            ElementRole::SpellSlot => ".spell-slot",
        }
    }
}

/// Fixed single controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    StartBattle,
    Rest,
    OpenShop,
    CloseShop,
}

impl Control {
    pub fn selector(&self) -> &'static str {
        match self {
            Control::StartBattle => "#start-battle-btn",
            Control::Rest => "#rest-btn",
            Control::OpenShop => "#open-shop-btn",
            Control::CloseShop => "#close-shop-btn",
        }
    }
}

/// Read-only text panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Panel {
    BattleLog,
    ResourceInfo,
}

impl Panel {
    pub fn selector(&self) -> &'static str {
        match self {
            Panel::BattleLog => "#battle-log",
            Panel::ResourceInfo => "#resource-info",
        }
    }
}

/// Handles for one role, valid until the next dispatched action.
#[derive(Debug)]
pub struct InteractiveElementSet {
    role: ElementRole,
    handles: Vec<ElementHandle>,
}

impl InteractiveElementSet {
    pub fn role(&self) -> ElementRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Consume the set, keeping only the element at `index`.
    pub fn take(mut self, index: usize) -> Option<ElementHandle> {
        if index < self.handles.len() {
            Some(self.handles.swap_remove(index))
        } else {
            None
        }
    }

    pub fn into_handles(self) -> Vec<ElementHandle> {
        self.handles
    }
}

/// Dispatches clicks and selections against the live page.
///
/// Never waits for the game to react; pair with [`crate::poll_until`] for that.
#[derive(Clone)]
pub struct ActionDispatcher {
    driver: Arc<dyn BrowserDriver>,
}

impl ActionDispatcher {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Fresh query for every element of `role`.
    pub async fn resolve(&self, role: ElementRole) -> Result<InteractiveElementSet, ActionError> {
        let handles = self.driver.query_selector_all(role.selector()).await?;
        debug!(?role, count = handles.len(), "resolved element set");
        Ok(InteractiveElementSet { role, handles })
    }

    /// Click the spell button at `index`. `false` when it is out of range or
    /// hidden.
    pub async fn cast_at(&self, index: usize) -> Result<bool, ActionError> {
        let Some(button) = self.resolve(ElementRole::SpellButton).await?.take(index) else {
            debug!(index, "no spell button at index");
            return Ok(false);
        };
        match self.click_visible(&button).await {
            Ok(()) => {
                info!(index, "cast dispatched");
                Ok(true)
            }
            Err(ActionError::ElementNotVisible(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Click the first visible spell button. `None` means nothing was
    /// actionable, which is not an error.
    pub async fn cast_first_visible(&self) -> Result<Option<usize>, ActionError> {
        let buttons = self.resolve(ElementRole::SpellButton).await?;
        for (index, button) in buttons.into_handles().into_iter().enumerate() {
            match self.click_visible(&button).await {
                Ok(()) => {
                    info!(index, "cast dispatched");
                    return Ok(Some(index));
                }
                Err(ActionError::ElementNotVisible(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        debug!("no actionable spell button");
        Ok(None)
    }

    /// Whether any spell button is visible right now.
    pub async fn any_spell_visible(&self) -> Result<bool, ActionError> {
        for button in self.resolve(ElementRole::SpellButton).await?.into_handles() {
            if self.driver.is_visible(&button).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn click(&self, control: Control) -> Result<(), ActionError> {
        let selector = control.selector();
        let handle = self
            .driver
            .query_selector(selector)
            .await?
            .ok_or_else(|| ActionError::ElementNotFound(selector.to_string()))?;
        self.click_visible(&handle).await?;
        debug!(?control, "control clicked");
        Ok(())
    }

    /// Click `control` if it is present and visible.
    pub async fn click_if_present(&self, control: Control) -> Result<bool, ActionError> {
        match self.click(control).await {
            Ok(()) => Ok(true),
            Err(ActionError::ElementNotFound(_)) | Err(ActionError::ElementNotVisible(_)) => {
                debug!(?control, "control unavailable");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn shop_item_count(&self) -> Result<usize, ActionError> {
        Ok(self.resolve(ElementRole::ShopItem).await?.len())
    }

    pub async fn spell_slot_count(&self) -> Result<usize, ActionError> {
        Ok(self.resolve(ElementRole::SpellSlot).await?.len())
    }

    /// Press the buy button of the first shop item.
    pub async fn buy_first_item(&self) -> Result<bool, ActionError> {
        let Some(item) = self.resolve(ElementRole::ShopItem).await?.take(0) else {
            return Ok(false);
        };
        let Some(buy) = self.driver.query_within(&item, BUY_BUTTON).await? else {
            debug!("first shop item has no buy button");
            return Ok(false);
        };
        match self.click_visible(&buy).await {
            Ok(()) => {
                info!("bought first shop item");
                Ok(true)
            }
            Err(ActionError::ElementNotVisible(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Pick the next opponent through developer mode. `Unknown` asks for a
    /// random one. `false` when developer mode is not available.
    pub async fn select_dev_enemy(&self, kind: EnemyKind) -> Result<bool, ActionError> {
        let Some(select) = self.driver.query_selector(DEV_ENEMY_SELECT).await? else {
            info!(enemy = %kind, "developer enemy select absent; game picks at random");
            return Ok(false);
        };
        let value = kind.dev_id().unwrap_or(RANDOM_ENEMY);
        self.driver.select_option(&select, value).await?;
        info!(enemy = %kind, "developer enemy selected");
        Ok(true)
    }

    /// Inner text of `panel`, `None` when the panel is not rendered.
    pub async fn read_text(&self, panel: Panel) -> Result<Option<String>, ActionError> {
        let Some(handle) = self.driver.query_selector(panel.selector()).await? else {
            return Ok(None);
        };
        Ok(Some(self.driver.inner_text(&handle).await?))
    }

    /// Battle-log entries in panel order, each attributed by its class list.
    /// `None` when the panel renders no entry elements.
    pub async fn read_log_entries(&self) -> Result<Option<Vec<LogEntry>>, ActionError> {
        let handles = self.driver.query_selector_all(LOG_ENTRY).await?;
        if handles.is_empty() {
            return Ok(None);
        }
        let mut entries = Vec::with_capacity(handles.len());
        for handle in &handles {
            let text = self.driver.inner_text(handle).await?;
            let author = self
                .driver
                .attribute(handle, "class")
                .await?
                .as_deref()
                .and_then(LogAuthor::from_class_list);
            entries.push(LogEntry::new(author, text));
        }
        debug!(count = entries.len(), "read battle-log entries");
        Ok(Some(entries))
    }

    async fn click_visible(&self, handle: &ElementHandle) -> Result<(), ActionError> {
        if !self.driver.is_visible(handle).await? {
            return Err(ActionError::ElementNotVisible(handle.to_string()));
        }
        self.driver.click(handle).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::{StubDriver, StubElement};

    fn dispatcher_with(stub: &Arc<StubDriver>) -> ActionDispatcher {
        ActionDispatcher::new(stub.clone())
    }

    #[tokio::test]
    async fn cast_with_no_visible_buttons_is_no_action() {
        let stub = Arc::new(StubDriver::new());
        stub.edit(|page| {
            page.set_all(
                ".spell-button",
                vec![StubElement::hidden("火球术"), StubElement::hidden("冰锥")],
            )
        });
        let dispatcher = dispatcher_with(&stub);

        assert_eq!(dispatcher.cast_first_visible().await.unwrap(), None);
        assert!(!dispatcher.cast_at(0).await.unwrap());
        assert!(!dispatcher.cast_at(7).await.unwrap());
        assert!(stub.clicks().is_empty());

        stub.edit(|page| page.remove(".spell-button"));
        assert_eq!(dispatcher.cast_first_visible().await.unwrap(), None);
    }

    #[tokio::test]
    async fn cast_skips_hidden_buttons() {
        let stub = Arc::new(StubDriver::new());
        stub.edit(|page| {
            page.set_all(
                ".spell-button",
                vec![StubElement::hidden("火球术"), StubElement::visible("冰锥")],
            )
        });
        stub.on_click(".spell-button", |page| page.log("玩家 开始吟唱 冰锥"));
        let dispatcher = dispatcher_with(&stub);

        assert!(dispatcher.any_spell_visible().await.unwrap());
        assert_eq!(dispatcher.cast_first_visible().await.unwrap(), Some(1));
        assert_eq!(stub.drain_console(), vec!["玩家 开始吟唱 冰锥"]);
        // second resolve happens after the click bumped the epoch
        assert!(dispatcher.cast_at(1).await.unwrap());
    }

    #[tokio::test]
    async fn missing_control_is_element_not_found() {
        let stub = Arc::new(StubDriver::new());
        stub.edit(|page| page.set("#rest-btn", StubElement::hidden("休息")));
        let dispatcher = dispatcher_with(&stub);

        let err = dispatcher.click(Control::OpenShop).await.unwrap_err();
        assert!(matches!(err, ActionError::ElementNotFound(ref sel) if sel == "#open-shop-btn"));
        let err = dispatcher.click(Control::Rest).await.unwrap_err();
        assert!(matches!(err, ActionError::ElementNotVisible(_)));

        assert!(!dispatcher.click_if_present(Control::OpenShop).await.unwrap());
        assert!(!dispatcher.click_if_present(Control::Rest).await.unwrap());
    }

    #[tokio::test]
    async fn buys_first_shop_item() {
        let stub = Arc::new(StubDriver::new());
        stub.edit(|page| {
            page.set_all(
                ".shop-item",
                vec![
                    StubElement::visible("火焰素材 50").with_child(".buy-btn", StubElement::visible("购买")),
                    StubElement::visible("冰霜素材 60").with_child(".buy-btn", StubElement::visible("购买")),
                ],
            )
        });
        stub.on_click(".buy-btn", |page| page.log("[SHOP] 购买成功！剩余金币: 10"));
        let dispatcher = dispatcher_with(&stub);

        assert_eq!(dispatcher.shop_item_count().await.unwrap(), 2);
        assert!(dispatcher.buy_first_item().await.unwrap());
        assert_eq!(stub.clicks(), vec![".buy-btn"]);
    }

    #[tokio::test]
    async fn empty_shop_buys_nothing() {
        let stub = Arc::new(StubDriver::new());
        let dispatcher = dispatcher_with(&stub);
        assert_eq!(dispatcher.shop_item_count().await.unwrap(), 0);
        assert!(!dispatcher.buy_first_item().await.unwrap());
        assert_eq!(dispatcher.spell_slot_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dev_enemy_selection() {
        let stub = Arc::new(StubDriver::new());
        let dispatcher = dispatcher_with(&stub);
        assert!(!dispatcher.select_dev_enemy(EnemyKind::Ogre).await.unwrap());

        stub.edit(|page| {
            page.set(
                DEV_ENEMY_SELECT,
                StubElement::select(&["random", "wolf", "goblin", "ogre"]),
            )
        });
        assert!(dispatcher.select_dev_enemy(EnemyKind::Ogre).await.unwrap());
        assert!(dispatcher.select_dev_enemy(EnemyKind::Unknown).await.unwrap());
        assert_eq!(
            stub.selections(),
            vec![
                (DEV_ENEMY_SELECT.to_string(), "ogre".to_string()),
                (DEV_ENEMY_SELECT.to_string(), "random".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn reads_panels() {
        let stub = Arc::new(StubDriver::new());
        stub.edit(|page| page.set("#resource-info", StubElement::visible("金币: 120")));
        let dispatcher = dispatcher_with(&stub);
        assert_eq!(
            dispatcher.read_text(Panel::ResourceInfo).await.unwrap().as_deref(),
            Some("金币: 120")
        );
        assert_eq!(dispatcher.read_text(Panel::BattleLog).await.unwrap(), None);
    }

    #[tokio::test]
    async fn log_entries_carry_their_author() {
        let stub = Arc::new(StubDriver::new());
        let dispatcher = dispatcher_with(&stub);
        assert_eq!(dispatcher.read_log_entries().await.unwrap(), None);

        stub.edit(|page| {
            page.set_all(
                LOG_ENTRY,
                vec![
                    StubElement::visible("战斗开始！遇到了 恶狼").with_attribute("class", "log-entry system"),
                    StubElement::visible("恶狼 开始吟唱 撕咬...").with_attribute("class", "log-entry enemy"),
                    StubElement::visible("开始吟唱 火球术...").with_attribute("class", "log-entry player"),
                    StubElement::visible("无名日志"),
                ],
            )
        });
        let entries = dispatcher.read_log_entries().await.unwrap().unwrap();
        assert_eq!(
            entries,
            vec![
                LogEntry::new(Some(LogAuthor::System), "战斗开始！遇到了 恶狼"),
                LogEntry::new(Some(LogAuthor::Enemy), "恶狼 开始吟唱 撕咬..."),
                LogEntry::new(Some(LogAuthor::Player), "开始吟唱 火球术..."),
                LogEntry::new(None, "无名日志"),
            ]
        );
    }

    #[test]
    fn element_set_take_consumes() {
        let set = InteractiveElementSet {
            role: ElementRole::SpellButton,
            handles: vec![
                ElementHandle::root(".spell-button", 0, 3),
                ElementHandle::root(".spell-button", 1, 3),
            ],
        };
        assert_eq!(set.len(), 2);
        let second = set.take(1).unwrap();
        assert_eq!(second.index(), 1);
    }
}
