//! Camp checks run around the battles of the full flow: rest, browse the
//! shop, buy, then inspect the equipped slots and resources.

use action_primitives::{ActionError, Control, Panel, PollPolicy};
use anyhow::Result;
use runebattle_core_types::{GameEvent, SceneState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scenario::runner::ScenarioRunner;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampReport {
    /// The rest control was clicked.
    pub rested: bool,
    pub rest_events: Vec<GameEvent>,
    /// The shop scene became active after opening it.
    pub shop_opened: bool,
    pub shop_items: usize,
    /// A buy button was clicked.
    pub purchased: bool,
    /// The game logged the purchase.
    pub purchase_logged: bool,
    pub spell_slots: usize,
    pub resources: Option<String>,
}

impl ScenarioRunner {
    /// Rest, then open and close the shop.
    pub(crate) async fn camp_checks_before(&self, report: &mut CampReport) -> Result<()> {
        if let Some(rested) = self.rest().await? {
            report.rested = true;
            report.rest_events = rested.events.into_iter().collect();
        }
        info!(events = report.rest_events.len(), "camp rest checked");

        report.shop_opened = self.open_shop().await?;
        if report.shop_opened {
            self.close_shop().await?;
        }
        Ok(())
    }

    /// Buy from the shop, then read slots and resources.
    pub(crate) async fn camp_checks_after(&self, report: &mut CampReport) -> Result<()> {
        if self.open_shop().await? {
            report.shop_opened = true;
            report.shop_items = self.dispatcher.shop_item_count().await?;
            info!(items = report.shop_items, "shop inventory counted");

            if report.shop_items > 0 {
                self.discard_pending().await?;
                report.purchased = self.dispatcher.buy_first_item().await?;
                if report.purchased {
                    report.purchase_logged = self.await_event(GameEvent::Purchase).await?;
                }
            }
            self.close_shop().await?;
        }

        report.spell_slots = self.dispatcher.spell_slot_count().await?;
        report.resources = self.dispatcher.read_text(Panel::ResourceInfo).await?;
        info!(
            slots = report.spell_slots,
            purchased = report.purchased,
            purchase_logged = report.purchase_logged,
            "camp inspected"
        );
        Ok(())
    }

    async fn open_shop(&self) -> Result<bool> {
        if !self.dispatcher.click_if_present(Control::OpenShop).await? {
            warn!("shop control unavailable");
            return Ok(false);
        }
        match self
            .waiter
            .await_scene(SceneState::ShopOpen, self.config.timings.shop_timeout)
            .await
        {
            Ok(()) => Ok(true),
            Err(ActionError::SceneTimeout { .. }) => {
                warn!("shop did not open");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn close_shop(&self) -> Result<()> {
        if !self.dispatcher.click_if_present(Control::CloseShop).await? {
            debug!("close shop control unavailable");
        }
        Ok(())
    }

    /// Read checkpoints until `wanted` is classified or `rest_settle` passes.
    async fn await_event(&self, wanted: GameEvent) -> Result<bool> {
        let mut backoff = PollPolicy::bounded(self.config.timings.rest_settle).start();
        loop {
            if self.checkpoint().await?.events.contains(&wanted) {
                return Ok(true);
            }
            if !backoff.wait().await {
                return Ok(false);
            }
        }
    }
}
