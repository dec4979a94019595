//! Logging configuration.
//!
//! Precedence, highest first:
//! 1. CLI flags (`-v`, `-q`, `--log-format`)
//! 2. `TSDB_LOG` (level) and `TSDB_LOG_FORMAT`
//! 3. `RUST_LOG` directives, used only when no level was chosen above
//! 4. `info`, human-readable

use clap::ValueEnum;
use tracing_subscriber::filter::LevelFilter;

/// Level override for every workspace crate.
pub const ENV_LOG_LEVEL: &str = "TSDB_LOG";

/// `human` or `jsonl`.
pub const ENV_LOG_FORMAT: &str = "TSDB_LOG_FORMAT";

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event, for log shippers.
    #[value(alias = "json")]
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Explicit level; `None` defers to `RUST_LOG`.
    pub level: Option<LevelFilter>,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: None,
            timestamps: true,
        }
    }
}

impl LogConfig {
    pub fn from_env(cli_level: Option<LevelFilter>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|k| std::env::var(k).ok(), cli_level, cli_format)
    }

    /// [`from_env`](Self::from_env) reading variables through `lookup`.
    ///
    /// Unparseable values are ignored.
    pub fn from_lookup<F>(
        lookup: F,
        cli_level: Option<LevelFilter>,
        cli_format: Option<LogFormat>,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = lookup(ENV_LOG_LEVEL).and_then(|v| v.trim().parse::<LevelFilter>().ok());
        let env_format = lookup(ENV_LOG_FORMAT)
            .and_then(|v| <LogFormat as ValueEnum>::from_str(v.trim(), true).ok());

        LogConfig {
            format: cli_format.or(env_format).unwrap_or_default(),
            level: cli_level.or(env_level),
            timestamps: true,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}
