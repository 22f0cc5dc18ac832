//! Daemon configuration.
//!
//! Settings come from an optional `dirqueue.toml` (or the file named by
//! `DIRQUEUE_CONFIG`), overridden by `DIRQUEUE_*` environment variables. There
//! are no command-line flags.
//!
//! ```text
//! DIRQUEUE_ROOT=~/dirqueue \
//! DIRQUEUE_LOG_FORMAT=json \
//!     dirqueue
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use dirqueue_core::domain::{CollisionPolicy, QueueLayout};

use crate::logging::LogFormat;

/// Prefix of environment variables that override the config file
pub const ENV_PREFIX: &str = "DIRQUEUE";
/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "DIRQUEUE_CONFIG";
/// Config file looked up in the working directory when `DIRQUEUE_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "dirqueue.toml";
/// Processor location, relative to the queue root
pub const DEFAULT_PROCESSOR: &str = "bin/job_processor";

/// Settings as written by the user, before path resolution
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub root: PathBuf,
    pub processor: Option<PathBuf>,
    pub processor_workdir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub on_collision: CollisionPolicy,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            processor: None,
            processor_workdir: None,
            log_format: LogFormat::default(),
            on_collision: CollisionPolicy::default(),
        }
    }
}

impl RawSettings {
    /// Resolve every path to an absolute one.
    ///
    /// `~` is expanded; a relative root is taken against `cwd`; relative
    /// processor paths are taken against the root.
    pub fn resolve(self, cwd: &Path) -> Settings {
        let root = absolutize(&expand_tilde(&self.root), cwd);

        let processor = self
            .processor
            .map(|p| absolutize(&expand_tilde(&p), &root))
            .unwrap_or_else(|| root.join(DEFAULT_PROCESSOR));

        let processor_workdir = self
            .processor_workdir
            .map(|p| absolutize(&expand_tilde(&p), &root))
            .or_else(|| processor.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| root.clone());

        Settings {
            root,
            processor,
            processor_workdir,
            log_format: self.log_format,
            on_collision: self.on_collision,
        }
    }
}

/// Fully resolved daemon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Absolute queue root; state directories live under `<root>/queue/`
    pub root: PathBuf,
    /// Absolute path of the job processor executable
    pub processor: PathBuf,
    /// Working directory for processor invocations
    pub processor_workdir: PathBuf,
    pub log_format: LogFormat,
    pub on_collision: CollisionPolicy,
}

impl Settings {
    /// Load from the default config file location and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&file)
    }

    /// Load from `file` (optional, format inferred from extension) and the
    /// environment
    pub fn load_from(file: &Path) -> Result<Self> {
        let raw: RawSettings = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read configuration from {}", file.display()))?
            .try_deserialize()
            .context("invalid configuration")?;

        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        Ok(raw.resolve(&cwd))
    }

    /// Defaults for a queue rooted at `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        RawSettings {
            root: root.clone(),
            ..RawSettings::default()
        }
        .resolve(&root)
    }

    pub fn layout(&self) -> QueueLayout {
        QueueLayout::new(&self.root)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    // Drop `.` segments so `root = "."` resolves to the base itself
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
