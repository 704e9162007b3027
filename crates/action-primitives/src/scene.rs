//! Scene synchronisation.

use cdp_adapter::BrowserDriver;
use runebattle_core_types::SceneState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::ActionError;

/// Blocks until the game reaches a scene. Never caches what it saw.
#[derive(Clone)]
pub struct SceneWaiter {
    driver: Arc<dyn BrowserDriver>,
}

impl SceneWaiter {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Wait for `scene`'s marker to carry the `active` class.
    ///
    /// A single bounded wait on the driver; retrying is the caller's call.
    pub async fn await_scene(&self, scene: SceneState, timeout: Duration) -> Result<(), ActionError> {
        let selector = scene
            .active_selector()
            .ok_or_else(|| ActionError::Internal("cannot wait for the unknown scene".into()))?;
        let timeout_ms = timeout.as_millis() as u64;

        match self.driver.wait_for_selector(&selector, timeout).await {
            Ok(()) => {
                debug!(%scene, timeout_ms, "scene active");
                Ok(())
            }
            Err(err) if err.is_timeout() => {
                warn!(%scene, timeout_ms, "scene wait timed out");
                Err(ActionError::SceneTimeout { scene, timeout_ms })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Query every marker now. `Unknown` when none is active.
    pub async fn current_scene(&self) -> Result<SceneState, ActionError> {
        for scene in SceneState::MARKED {
            if self.is_active(scene).await? {
                return Ok(scene);
            }
        }
        Ok(SceneState::Unknown)
    }

    pub async fn is_active(&self, scene: SceneState) -> Result<bool, ActionError> {
        let Some(selector) = scene.active_selector() else {
            return Ok(false);
        };
        Ok(self.driver.query_selector(&selector).await?.is_some())
    }
}
