//! In-memory scripted page used when no real browser is wanted.
//!
//! Selectors are matched literally: `#battle-scene.active` is just a key. Tests
//! build a page, register hooks that mutate it when a control is clicked, and
//! schedule delayed transitions that fire as the (usually paused) tokio clock
//! advances.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::console::ConsoleBuffer;
use crate::driver::{BrowserDriver, TeardownReport};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::handle::ElementHandle;

const STUB_POLL: Duration = Duration::from_millis(25);

pub type PageHook = Arc<dyn Fn(&mut StubPage) + Send + Sync>;
pub type SelectHook = Arc<dyn Fn(&mut StubPage, &str) + Send + Sync>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StubElement {
    pub text: String,
    pub visible: bool,
    /// Option values when the element is a `<select>`.
    pub options: Vec<String>,
    pub value: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub children: BTreeMap<String, Vec<StubElement>>,
}

impl StubElement {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn hidden(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: false,
            ..Self::default()
        }
    }

    pub fn select(options: &[&str]) -> Self {
        Self {
            visible: true,
            options: options.iter().map(|value| value.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, selector: impl Into<String>, child: StubElement) -> Self {
        self.children.entry(selector.into()).or_default().push(child);
        self
    }
}

/// Mutable page model.
pub struct StubPage {
    elements: HashMap<String, Vec<StubElement>>,
    console: ConsoleBuffer,
    pending: Vec<(Instant, PageHook)>,
    invalidated: bool,
}

impl StubPage {
    fn new(console: ConsoleBuffer) -> Self {
        Self {
            elements: HashMap::new(),
            console,
            pending: Vec::new(),
            invalidated: false,
        }
    }

    pub fn set(&mut self, selector: impl Into<String>, element: StubElement) {
        self.elements.insert(selector.into(), vec![element]);
    }

    pub fn set_all(&mut self, selector: impl Into<String>, elements: Vec<StubElement>) {
        self.elements.insert(selector.into(), elements);
    }

    /// Append to the list under `selector`, dropping the oldest entries once
    /// it holds more than `limit`.
    pub fn push_bounded(&mut self, selector: impl Into<String>, element: StubElement, limit: usize) {
        let items = self.elements.entry(selector.into()).or_default();
        items.push(element);
        if items.len() > limit {
            let excess = items.len() - limit;
            items.drain(..excess);
        }
    }

    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.elements
            .get(selector)
            .is_some_and(|items| !items.is_empty())
    }

    pub fn get(&self, selector: &str) -> Option<&StubElement> {
        self.elements.get(selector).and_then(|items| items.first())
    }

    /// Toggle the `active` marker for the element with id `marker_id`.
    pub fn set_active(&mut self, marker_id: &str, active: bool) {
        let key = format!("#{marker_id}.active");
        if active {
            self.set(key, StubElement::visible(""));
        } else {
            self.remove(&key);
        }
    }

    /// Deactivate every listed marker and activate `marker_id`.
    pub fn activate_exclusive(&mut self, markers: &[&str], marker_id: &str) {
        for marker in markers {
            self.set_active(marker, false);
        }
        self.set_active(marker_id, true);
    }

    /// Append a line to the text of the first element matching `selector`,
    /// creating it when missing.
    pub fn append_text(&mut self, selector: &str, line: &str) {
        let items = self.elements.entry(selector.to_string()).or_default();
        if items.is_empty() {
            items.push(StubElement::visible(""));
        }
        let target = &mut items[0];
        if !target.text.is_empty() {
            target.text.push('\n');
        }
        target.text.push_str(line);
    }

    pub fn set_text(&mut self, selector: &str, text: &str) {
        let items = self.elements.entry(selector.to_string()).or_default();
        if items.is_empty() {
            items.push(StubElement::visible(text));
        } else {
            items[0].text = text.to_string();
        }
    }

    /// Emit a console line as the page would.
    pub fn log(&self, line: impl Into<String>) {
        self.console.push(line);
    }

    /// Run `hook` once the clock passes `after` from now.
    pub fn schedule(&mut self, after: Duration, hook: PageHook) {
        self.pending.push((Instant::now() + after, hook));
    }

    /// Mark the UI as regenerated; every outstanding handle becomes stale.
    pub fn regenerate(&mut self) {
        self.invalidated = true;
    }

    fn resolve(&self, handle: &ElementHandle) -> Option<&StubElement> {
        let mut steps = handle.path().iter();
        let first = steps.next()?;
        let mut current = self.elements.get(&first.selector)?.get(first.index)?;
        for step in steps {
            current = current.children.get(&step.selector)?.get(step.index)?;
        }
        Some(current)
    }

    fn resolve_mut(&mut self, handle: &ElementHandle) -> Option<&mut StubElement> {
        let mut steps = handle.path().iter();
        let first = steps.next()?;
        let mut current = self.elements.get_mut(&first.selector)?.get_mut(first.index)?;
        for step in steps {
            current = current.children.get_mut(&step.selector)?.get_mut(step.index)?;
        }
        Some(current)
    }
}

#[derive(Default)]
struct Hooks {
    click: HashMap<String, PageHook>,
    select: HashMap<String, SelectHook>,
    reload: Option<PageHook>,
    navigate: Option<PageHook>,
}

#[derive(Default)]
struct Journal {
    clicks: Vec<String>,
    selections: Vec<(String, String)>,
    navigations: Vec<String>,
    reloads: u32,
    screenshots: Vec<PathBuf>,
}

/// Scripted [`BrowserDriver`].
pub struct StubDriver {
    page: Mutex<StubPage>,
    console: ConsoleBuffer,
    epoch: AtomicU64,
    hooks: Mutex<Hooks>,
    journal: Mutex<Journal>,
    teardown: Mutex<TeardownReport>,
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StubDriver {
    pub fn new() -> Self {
        let console = ConsoleBuffer::new();
        Self {
            page: Mutex::new(StubPage::new(console.clone())),
            console,
            epoch: AtomicU64::new(0),
            hooks: Mutex::new(Hooks::default()),
            journal: Mutex::new(Journal::default()),
            teardown: Mutex::new(TeardownReport::Graceful),
        }
    }

    /// Mutate the page model directly.
    pub fn edit<R>(&self, f: impl FnOnce(&mut StubPage) -> R) -> R {
        let mut page = self.page.lock();
        let result = f(&mut page);
        if std::mem::take(&mut page.invalidated) {
            self.advance_epoch();
        }
        result
    }

    pub fn on_click(
        &self,
        selector: impl Into<String>,
        hook: impl Fn(&mut StubPage) + Send + Sync + 'static,
    ) {
        self.hooks.lock().click.insert(selector.into(), Arc::new(hook));
    }

    pub fn on_select(
        &self,
        selector: impl Into<String>,
        hook: impl Fn(&mut StubPage, &str) + Send + Sync + 'static,
    ) {
        self.hooks
            .lock()
            .select
            .insert(selector.into(), Arc::new(hook));
    }

    pub fn on_reload(&self, hook: impl Fn(&mut StubPage) + Send + Sync + 'static) {
        self.hooks.lock().reload = Some(Arc::new(hook));
    }

    pub fn on_navigate(&self, hook: impl Fn(&mut StubPage) + Send + Sync + 'static) {
        self.hooks.lock().navigate = Some(Arc::new(hook));
    }

    pub fn set_teardown(&self, report: TeardownReport) {
        *self.teardown.lock() = report;
    }

    pub fn console(&self) -> ConsoleBuffer {
        self.console.clone()
    }

    /// Rendered handle of every dispatched click, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.journal.lock().clicks.clone()
    }

    pub fn clicks_on(&self, selector: &str) -> usize {
        self.journal
            .lock()
            .clicks
            .iter()
            .filter(|click| click.as_str() == selector)
            .count()
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.journal.lock().selections.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.journal.lock().navigations.clone()
    }

    pub fn reloads(&self) -> u32 {
        self.journal.lock().reloads
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.journal.lock().screenshots.clone()
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Fire scheduled transitions whose time has come.
    fn settle(&self) {
        let now = Instant::now();
        let mut page = self.page.lock();
        loop {
            let due = page.pending.iter().position(|(at, _)| *at <= now);
            let Some(position) = due else { break };
            let (_, hook) = page.pending.remove(position);
            hook(&mut page);
        }
        if std::mem::take(&mut page.invalidated) {
            self.advance_epoch();
        }
    }

    fn ensure_fresh(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        if element.epoch() != self.current_epoch() {
            return Err(AdapterError::new(AdapterErrorKind::StaleHandle).with_hint(element.to_string()));
        }
        Ok(())
    }

    fn run_page_hook(&self, hook: Option<PageHook>) {
        if let Some(hook) = hook {
            let mut page = self.page.lock();
            hook(&mut page);
            page.invalidated = false;
        }
    }
}

fn not_found(element: &ElementHandle) -> AdapterError {
    AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(element.to_string())
}

#[async_trait]
impl BrowserDriver for StubDriver {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.journal.lock().navigations.push(url.to_string());
        let hook = self.hooks.lock().navigate.clone();
        self.run_page_hook(hook);
        self.advance_epoch();
        Ok(())
    }

    async fn reload(&self) -> Result<(), AdapterError> {
        self.journal.lock().reloads += 1;
        self.page.lock().pending.clear();
        let hook = self.hooks.lock().reload.clone();
        self.run_page_hook(hook);
        self.advance_epoch();
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), AdapterError> {
        self.settle();
        Ok(())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, AdapterError> {
        self.settle();
        let epoch = self.current_epoch();
        let present = self.page.lock().contains(selector);
        Ok(present.then(|| ElementHandle::root(selector, 0, epoch)))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        self.settle();
        let epoch = self.current_epoch();
        let total = self
            .page
            .lock()
            .elements
            .get(selector)
            .map(Vec::len)
            .unwrap_or(0);
        Ok((0..total)
            .map(|index| ElementHandle::root(selector, index, epoch))
            .collect())
    }

    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, AdapterError> {
        self.settle();
        self.ensure_fresh(parent)?;
        let page = self.page.lock();
        let element = page.resolve(parent).ok_or_else(|| not_found(parent))?;
        let present = element
            .children
            .get(selector)
            .is_some_and(|items| !items.is_empty());
        Ok(present.then(|| parent.child(selector, 0)))
    }

    async fn wait_for_selector(&self, selector: &str, limit: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + limit;
        loop {
            self.settle();
            if self.page.lock().contains(selector) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::WaitTimeout)
                    .with_hint(format!("'{selector}' not present after {}ms", limit.as_millis())));
            }
            sleep(STUB_POLL).await;
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AdapterError> {
        self.settle();
        self.ensure_fresh(element)?;
        {
            let page = self.page.lock();
            let target = page.resolve(element).ok_or_else(|| not_found(element))?;
            if !target.visible {
                return Err(not_found(element).with_hint(format!("{element} is not visible")));
            }
        }
        self.journal.lock().clicks.push(element.selector().to_string());
        let hook = self.hooks.lock().click.get(element.selector()).cloned();
        self.run_page_hook(hook);
        self.advance_epoch();
        Ok(())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, AdapterError> {
        self.settle();
        self.ensure_fresh(element)?;
        Ok(self
            .page
            .lock()
            .resolve(element)
            .map(|target| target.visible)
            .unwrap_or(false))
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        self.settle();
        self.ensure_fresh(element)?;
        self.page
            .lock()
            .resolve(element)
            .map(|target| target.text.clone())
            .ok_or_else(|| not_found(element))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        self.settle();
        self.ensure_fresh(element)?;
        self.page
            .lock()
            .resolve(element)
            .map(|target| target.attributes.get(name).cloned())
            .ok_or_else(|| not_found(element))
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), AdapterError> {
        self.settle();
        self.ensure_fresh(element)?;
        {
            let mut page = self.page.lock();
            let target = page.resolve_mut(element).ok_or_else(|| not_found(element))?;
            if !target.options.iter().any(|option| option == value) {
                return Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                    .with_hint(format!("{value} in {element}")));
            }
            target.value = Some(value.to_string());
        }
        self.journal
            .lock()
            .selections
            .push((element.selector().to_string(), value.to_string()));
        let hook = self.hooks.lock().select.get(element.selector()).cloned();
        if let Some(hook) = hook {
            let mut page = self.page.lock();
            hook(&mut page, value);
            page.invalidated = false;
        }
        self.advance_epoch();
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), AdapterError> {
        self.journal.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn drain_console(&self) -> Vec<String> {
        self.settle();
        self.console.drain()
    }

    async fn close(&self) -> TeardownReport {
        *self.teardown.lock()
    }
}
