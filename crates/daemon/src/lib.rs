// dirqueue daemon: configuration, logging and process wiring

pub mod config;
pub mod daemon;
pub mod exit;
pub mod logging;

pub use config::Settings;
pub use daemon::{Daemon, WatcherFactory};
pub use exit::{remediation_hint, ExitStatus};
pub use logging::LogFormat;
