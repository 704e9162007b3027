pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod runtime;
pub mod scenario;

pub use app::run;
pub use output::OutputFormat;
pub use scenario::{execute_plan, RunOptions};
