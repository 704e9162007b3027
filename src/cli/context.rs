use std::path::{Path, PathBuf};

use crate::cli::output::OutputFormat;
use crate::config::HarnessConfig;

pub struct CliContext {
    config: HarnessConfig,
    config_path: PathBuf,
    from_file: bool,
    output: OutputFormat,
    report_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(
        config: HarnessConfig,
        config_path: PathBuf,
        from_file: bool,
        output: OutputFormat,
        report_path: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            config_path,
            from_file,
            output,
            report_path,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Whether the configuration came from a file rather than defaults.
    pub fn from_file(&self) -> bool {
        self.from_file
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }
}
