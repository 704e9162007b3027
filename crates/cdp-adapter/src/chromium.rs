//! chromiumoxide-backed driver.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::console::ConsoleBuffer;
use crate::driver::{BrowserDriver, TeardownReport};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::handle::ElementHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);
/// Bound on each of `Browser.close` and the process exit that follows.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Live Chromium session owning one page.
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    console: ConsoleBuffer,
    epoch: AtomicU64,
    handler_task: JoinHandle<()>,
    console_task: JoinHandle<()>,
    _profile: Option<TempDir>,
}

impl ChromiumDriver {
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let profile = match &cfg.user_data_dir {
            Some(_) => None,
            None => Some(tempfile::tempdir().map_err(|err| {
                AdapterError::new(AdapterErrorKind::LaunchFailed)
                    .with_hint(format!("failed to create temp profile dir: {err}"))
            })?),
        };

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(cfg.window_width, cfg.window_height)
            .arg("--disable-dev-shm-usage");

        builder = match (&cfg.user_data_dir, &profile) {
            (Some(dir), _) => builder.user_data_dir(dir),
            (None, Some(tmp)) => builder.user_data_dir(tmp.path()),
            (None, None) => builder,
        };

        // with_head() stops chromiumoxide from adding the legacy --headless flag
        builder = if cfg.headless {
            builder.with_head().arg("--headless=new")
        } else {
            builder.with_head()
        };

        if let Some(path) = cfg.resolve_executable() {
            builder = builder.chrome_executable(path);
        }
        for arg in &cfg.args {
            builder = builder.arg(arg.clone());
        }

        let browser_config = builder
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err))?;

        let launch = timeout(
            Duration::from_millis(cfg.launch_timeout_ms),
            Browser::launch(browser_config),
        )
        .await
        .map_err(|_| {
            AdapterError::new(AdapterErrorKind::LaunchFailed)
                .with_hint(format!("launch exceeded {}ms", cfg.launch_timeout_ms))
        })?;
        let (browser, mut handler) = launch.map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err.to_string())
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(?err, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(AdapterError::cdp)?;

        let console = ConsoleBuffer::new();
        let mut events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(AdapterError::cdp)?;
        let producer = console.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                producer.push(render_console_args(&event));
            }
        });

        info!(headless = cfg.headless, "browser session launched");

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            console,
            epoch: AtomicU64::new(0),
            handler_task,
            console_task,
            _profile: profile,
        })
    }

    async fn eval(&self, expression: String) -> Result<Value, AdapterError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(AdapterError::cdp)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn count(&self, selector: &str) -> Result<usize, AdapterError> {
        let literal = js_literal(selector)?;
        let value = self
            .eval(format!(
                "(() => {{ try {{ return document.querySelectorAll({literal}).length; }} catch (err) {{ return 0; }} }})()"
            ))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn ensure_fresh(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        let current = self.current_epoch();
        if element.epoch() != current {
            return Err(AdapterError::new(AdapterErrorKind::StaleHandle).with_hint(format!(
                "{} resolved in epoch {}, page is at {}",
                element,
                element.epoch(),
                current
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        url::Url::parse(url).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation).with_hint(format!("{url}: {err}"))
        })?;
        debug!(%url, "navigating");
        self.page.goto(url).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation).with_hint(err.to_string())
        })?;
        self.advance_epoch();
        Ok(())
    }

    async fn reload(&self) -> Result<(), AdapterError> {
        self.page.reload().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation).with_hint(err.to_string())
        })?;
        self.advance_epoch();
        Ok(())
    }

    async fn wait_for_network_idle(&self, limit: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + limit;
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let state = self
                .eval(
                    "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })"
                        .to_string(),
                )
                .await?;
            let ready = state.get("ready").and_then(Value::as_str) == Some("complete");
            let resources = state.get("resources").and_then(Value::as_u64).unwrap_or(0);

            if last_count != Some(resources) {
                last_count = Some(resources);
                quiet_since = Instant::now();
            }
            if ready && quiet_since.elapsed() >= NETWORK_QUIET_WINDOW {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::WaitTimeout)
                    .with_hint(format!("network not idle after {}ms", limit.as_millis())));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        let epoch = self.current_epoch();
        Ok((self.count(selector).await? > 0).then(|| ElementHandle::root(selector, 0, epoch)))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        let epoch = self.current_epoch();
        let total = self.count(selector).await?;
        Ok((0..total)
            .map(|index| ElementHandle::root(selector, index, epoch))
            .collect())
    }

    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, AdapterError> {
        self.ensure_fresh(parent)?;
        let literal = js_literal(selector)?;
        let value = self
            .eval(format!(
                "(() => {{ const el = {parent}; return el ? el.querySelectorAll({literal}).length : 0; }})()",
                parent = parent.to_js(),
            ))
            .await?;
        Ok((value.as_u64().unwrap_or(0) > 0).then(|| parent.child(selector, 0)))
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + limit;
        loop {
            if self.count(selector).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::WaitTimeout)
                    .with_hint(format!("'{selector}' not present after {}ms", limit.as_millis())));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        self.ensure_fresh(element)?;
        let value = self
            .eval(format!(
                "(() => {{\n    const el = {el};\n    if (!el) {{ return {{ status: 'missing' }}; }}\n    el.scrollIntoView({{ block: 'center', inline: 'center' }});\n    const rect = el.getBoundingClientRect();\n    return {{ status: 'ok', x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};\n}})()",
                el = element.to_js(),
            ))
            .await?;

        if value.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(
                AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(element.to_string())
            );
        }
        let x = value.get("x").and_then(Value::as_f64).unwrap_or(0.0);
        let y = value.get("y").and_then(Value::as_f64).unwrap_or(0.0);

        self.page
            .click(Point { x, y })
            .await
            .map_err(AdapterError::cdp)?;
        self.advance_epoch();
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError> {
        self.ensure_fresh(element)?;
        let value = self
            .eval(format!(
                "(() => {{\n    const el = {el};\n    if (!el) {{ return false; }}\n    const style = window.getComputedStyle(el);\n    const rect = el.getBoundingClientRect();\n    return style.visibility !== 'hidden' && style.display !== 'none' && (rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0);\n}})()",
                el = element.to_js(),
            ))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        self.ensure_fresh(element)?;
        let value = self
            .eval(format!(
                "(() => {{ const el = {el}; return el ? (el.innerText || el.textContent || '') : null; }})()",
                el = element.to_js(),
            ))
            .await?;
        match value {
            Value::String(text) => Ok(text),
            _ => Err(
                AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(element.to_string())
            ),
        }
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        self.ensure_fresh(element)?;
        let literal = js_literal(name)?;
        let value = self
            .eval(format!(
                "(() => {{ const el = {el}; if (!el) {{ return {{ status: 'missing' }}; }} return {{ status: 'ok', value: el.getAttribute({literal}) }}; }})()",
                el = element.to_js(),
            ))
            .await?;
        match value.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(value
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_string)),
            _ => Err(
                AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(element.to_string())
            ),
        }
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), AdapterError> {
        self.ensure_fresh(element)?;
        let literal = js_literal(value)?;
        let result = self
            .eval(format!(
                "(() => {{\n    const el = {el};\n    if (!el) {{ return 'missing'; }}\n    if (el.tagName !== 'SELECT') {{ return 'not-select'; }}\n    const option = Array.from(el.options).find((opt) => opt.value === {literal});\n    if (!option) {{ return 'no-option'; }}\n    el.value = option.value;\n    el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n    el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n    return 'ok';\n}})()",
                el = element.to_js(),
            ))
            .await?;

        match result.as_str() {
            Some("ok") => {
                self.advance_epoch();
                Ok(())
            }
            Some("no-option") => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                .with_hint(format!("{value} in {element}"))),
            Some("not-select") => Err(AdapterError::internal(format!(
                "{element} is not a <select>"
            ))),
            _ => Err(
                AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(element.to_string())
            ),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), AdapterError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AdapterError::internal(err.to_string()))?;
        }
        self.page
            .save_screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
                path,
            )
            .await
            .map_err(AdapterError::cdp)?;
        info!(path = %path.display(), "saved screenshot");
        Ok(())
    }

    fn drain_console(&self) -> Vec<String> {
        self.console.drain()
    }

    async fn close(&self) -> TeardownReport {
        self.console_task.abort();
        let mut guard = self.browser.lock().await;
        let Some(mut browser) = guard.take() else {
            return TeardownReport::Graceful;
        };

        let report = shut_down(&mut browser, CLOSE_GRACE).await;
        self.handler_task.abort();
        report
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.console_task.abort();
        self.handler_task.abort();
    }
}

/// Process-level controls used during teardown.
#[async_trait]
trait BrowserProcess: Send {
    async fn request_close(&mut self) -> Result<(), String>;

    async fn wait_exit(&mut self) -> Result<(), String>;

    /// `None` when there is no child process to kill.
    async fn kill(&mut self) -> Option<Result<(), String>>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<(), String> {
        self.close().await.map(|_| ()).map_err(|err| err.to_string())
    }

    async fn wait_exit(&mut self) -> Result<(), String> {
        self.wait().await.map(|_| ()).map_err(|err| err.to_string())
    }

    async fn kill(&mut self) -> Option<Result<(), String>> {
        Browser::kill(self)
            .await
            .map(|outcome| outcome.map_err(|err| err.to_string()))
    }
}

/// Close, wait for exit, kill. Close and exit are each bounded by `grace`.
async fn shut_down(process: &mut dyn BrowserProcess, grace: Duration) -> TeardownReport {
    let closed = timeout(grace, process.request_close()).await;
    match closed {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(%err, "graceful close failed; killing browser process");
            return kill(process).await;
        }
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "browser ignored close; killing");
            return kill(process).await;
        }
    }

    let exited = timeout(grace, process.wait_exit()).await;
    match exited {
        Ok(Ok(())) => TeardownReport::Graceful,
        Ok(Err(err)) => {
            warn!(%err, "browser did not exit after close; killing");
            kill(process).await
        }
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "browser still running after close; killing");
            kill(process).await
        }
    }
}

async fn kill(process: &mut dyn BrowserProcess) -> TeardownReport {
    match process.kill().await {
        Some(Ok(())) => TeardownReport::Forced,
        Some(Err(err)) => {
            warn!(%err, "failed to kill browser process; giving up");
            TeardownReport::Abandoned
        }
        None => {
            warn!("no browser child process to kill; giving up");
            TeardownReport::Abandoned
        }
    }
}

fn js_literal(raw: &str) -> Result<String, AdapterError> {
    serde_json::to_string(raw)
        .map_err(|err| AdapterError::internal(format!("invalid literal encoding: {err}")))
}

/// Join console call arguments the way devtools renders them.
fn render_console_args(event: &EventConsoleApiCalled) -> String {
    event
        .args
        .iter()
        .map(|arg| match &arg.value {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hung {
        close_answers: bool,
        killed: bool,
    }

    #[async_trait]
    impl BrowserProcess for Hung {
        async fn request_close(&mut self) -> Result<(), String> {
            if self.close_answers {
                Ok(())
            } else {
                std::future::pending().await
            }
        }

        async fn wait_exit(&mut self) -> Result<(), String> {
            std::future::pending().await
        }

        async fn kill(&mut self) -> Option<Result<(), String>> {
            self.killed = true;
            Some(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_close_falls_back_to_kill() {
        let mut process = Hung {
            close_answers: false,
            killed: false,
        };
        let report = shut_down(&mut process, CLOSE_GRACE).await;
        assert_eq!(report, TeardownReport::Forced);
        assert!(process.killed);
    }

    #[tokio::test(start_paused = true)]
    async fn process_that_never_exits_is_killed() {
        let mut process = Hung {
            close_answers: true,
            killed: false,
        };
        let started = Instant::now();
        let report = shut_down(&mut process, CLOSE_GRACE).await;
        assert_eq!(report, TeardownReport::Forced);
        assert!(process.killed);
        assert!(started.elapsed() >= CLOSE_GRACE);
    }
}
