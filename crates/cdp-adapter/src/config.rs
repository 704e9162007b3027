use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration for launching the browser session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CdpConfig {
    /// Chrome/Chromium binary. Empty means "detect".
    pub executable: PathBuf,
    /// Profile directory. `None` gives every session a fresh temporary profile.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Extra command-line switches passed to the browser.
    pub args: Vec<String>,
    /// How long a launch may take before it counts as a driver failure.
    pub launch_timeout_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: default_chrome_path(),
            user_data_dir: None,
            headless: resolve_headless_default(),
            window_width: 1280,
            window_height: 800,
            args: Vec::new(),
            launch_timeout_ms: 30_000,
        }
    }
}

impl CdpConfig {
    /// Resolve the executable, falling back to detection when the configured
    /// path does not exist.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        if !self.executable.as_os_str().is_empty() && self.executable.exists() {
            return Some(self.executable.clone());
        }
        detect_chrome_executable()
    }
}

fn resolve_headless_default() -> bool {
    // "0", "false", "no", "off" means headful
    match env::var("RUNEBATTLE_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_chrome_path() -> PathBuf {
    detect_chrome_executable().unwrap_or_default()
}

pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("RUNEBATTLE_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| Path::new(candidate).exists())
}

pub(crate) fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn headless_env_switch() {
        env::set_var("RUNEBATTLE_HEADLESS", "off");
        assert!(!resolve_headless_default());
        env::set_var("RUNEBATTLE_HEADLESS", "1");
        assert!(resolve_headless_default());
        env::remove_var("RUNEBATTLE_HEADLESS");
        assert!(resolve_headless_default());
    }

    #[test]
    fn executable_names_cover_chromium() {
        let names = chrome_executable_names();
        assert!(names.iter().any(|name| name.contains("chrom")));
    }

    #[test]
    fn missing_configured_path_falls_back_to_detection() {
        let cfg = CdpConfig {
            executable: PathBuf::from("/definitely/not/here/chrome"),
            ..CdpConfig::default()
        };
        assert_eq!(cfg.resolve_executable(), detect_chrome_executable());
    }
}
