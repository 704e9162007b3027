use parking_lot::Mutex;
use std::sync::Arc;

/// Buffer for console lines arriving asynchronously from the page.
///
/// Single producer (the listener task), single consumer (the harness, which
/// drains it at checkpoints). Draining clears the buffer.
#[derive(Clone, Debug, Default)]
pub struct ConsoleBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    /// Take every buffered line, leaving the buffer empty.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Copy of the buffered lines without clearing them.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
