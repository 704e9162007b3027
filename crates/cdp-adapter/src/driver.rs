use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AdapterError;
use crate::handle::ElementHandle;

/// How a session was torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeardownReport {
    /// The browser acknowledged close and exited.
    Graceful,
    /// Close failed; the process was killed.
    Forced,
    /// Neither close nor kill worked. Logged and left behind.
    Abandoned,
}

/// Browser capability surface consumed by the harness.
///
/// Queries that find nothing return `None` or an empty vector rather than an
/// error; only transport faults, timeouts and stale handles are errors.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;

    async fn reload(&self) -> Result<(), AdapterError>;

    /// Wait until the document finished loading and the network went quiet.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), AdapterError>;

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError>;

    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, AdapterError>;

    /// Wait until `selector` matches at least one element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), AdapterError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError>;

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, AdapterError>;

    /// Value of attribute `name`, `None` when the element does not carry it.
    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError>;

    async fn select_option(&self, element: &ElementHandle, value: &str)
        -> Result<(), AdapterError>;

    async fn screenshot(&self, path: &Path) -> Result<(), AdapterError>;

    /// Take and clear every console line captured since the last drain.
    fn drain_console(&self) -> Vec<String>;

    async fn close(&self) -> TeardownReport;
}
