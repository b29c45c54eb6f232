//! CLI command handlers, one per file.

mod check;
pub(crate) mod fetch;
mod show_config;

pub use check::run_check;
pub use fetch::run_fetch;
pub use show_config::run_show_config;
