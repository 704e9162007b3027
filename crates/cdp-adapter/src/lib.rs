//! Browser driver layer for the runebattle harness.
//!
//! Everything above this crate talks to a [`BrowserDriver`]. Two implementations
//! ship here: [`ChromiumDriver`] speaks the DevTools protocol to a real Chromium,
//! [`StubDriver`] is an in-memory scripted page for deterministic tests.

pub mod chromium;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod handle;
pub mod stub;

use std::sync::Arc;

pub use chromium::ChromiumDriver;
pub use config::{detect_chrome_executable, CdpConfig};
pub use console::ConsoleBuffer;
pub use driver::{BrowserDriver, TeardownReport};
pub use error::{AdapterError, AdapterErrorKind};
pub use handle::{ElementHandle, PathStep};
pub use stub::{StubDriver, StubElement, StubPage};

/// Which driver backs a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AdapterMode {
    #[default]
    Real,
    Stub,
}

/// Launch a driver for `mode`.
pub async fn connect(
    mode: AdapterMode,
    cfg: &CdpConfig,
) -> Result<Arc<dyn BrowserDriver>, AdapterError> {
    match mode {
        AdapterMode::Real => {
            let driver = ChromiumDriver::launch(cfg).await?;
            Ok(Arc::new(driver))
        }
        AdapterMode::Stub => Ok(Arc::new(StubDriver::new())),
    }
}
