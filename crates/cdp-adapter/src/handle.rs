//! Element handles.
//!
//! A handle is a selector path plus the action epoch it was resolved in. The
//! driver bumps its epoch after every dispatched interaction, so a handle
//! obtained before a click is rejected afterwards instead of silently pointing
//! at whatever element now sits at the same index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a selector path: `scope.querySelectorAll(selector)[index]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub selector: String,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    path: Vec<PathStep>,
    epoch: u64,
}

impl ElementHandle {
    pub fn root(selector: impl Into<String>, index: usize, epoch: u64) -> Self {
        Self {
            path: vec![PathStep {
                selector: selector.into(),
                index,
            }],
            epoch,
        }
    }

    /// Handle for the `index`-th match of `selector` inside this element.
    pub fn child(&self, selector: impl Into<String>, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(PathStep {
            selector: selector.into(),
            index,
        });
        Self {
            path,
            epoch: self.epoch,
        }
    }

    pub fn path(&self) -> &[PathStep] {
        &self.path
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Position of the element within its own selector match list.
    pub fn index(&self) -> usize {
        self.path.last().map(|step| step.index).unwrap_or(0)
    }

    /// Selector of the last path step.
    pub fn selector(&self) -> &str {
        self.path
            .last()
            .map(|step| step.selector.as_str())
            .unwrap_or("")
    }

    /// JavaScript expression evaluating to the element, or `null`.
    pub fn to_js(&self) -> String {
        let steps: Vec<(&str, usize)> = self
            .path
            .iter()
            .map(|step| (step.selector.as_str(), step.index))
            .collect();
        let steps = serde_json::to_string(&steps).unwrap_or_else(|_| "[]".into());
        format!(
            "(() => {{ let scope = document; for (const [sel, idx] of {steps}) {{ if (!scope) {{ return null; }} scope = scope.querySelectorAll(sel)[idx] || null; }} return scope; }})()"
        )
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .path
            .iter()
            .map(|step| format!("{}[{}]", step.selector, step.index))
            .collect();
        write!(f, "{}@{}", rendered.join(" > "), self.epoch)
    }
}
