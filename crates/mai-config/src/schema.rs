use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `mai.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaiConfig {
    pub thinking: ThinkingConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

// ── Thinking ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkingConfig {
    /// How many recent conversation items each flow keeps in its observation window.
    pub observation_window_size: usize,
    /// Seconds between observation ticks while a flow is engaged.
    pub engaged_interval_secs: u64,
    /// Seconds between observation ticks while a flow is focused.
    pub focused_interval_secs: u64,
    /// Seconds shutdown waits for observer loops to stop before aborting them.
    pub shutdown_grace_secs: u64,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            observation_window_size: 100,
            engaged_interval_secs: 20,
            focused_interval_secs: 5,
            shutdown_grace_secs: 10,
        }
    }
}

// ── Database ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database.
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/mai.db"),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "[{}] {}: {}", tag, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl MaiConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Observation window ───
        let window = self.thinking.observation_window_size;
        if window == 0 {
            warnings.push(ConfigWarning {
                field: "thinking.observation_window_size".into(),
                message: "window size is 0, flows would observe nothing".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 100".into()),
            });
        } else if window > 10_000 {
            warnings.push(ConfigWarning {
                field: "thinking.observation_window_size".into(),
                message: format!("window size {window} is very large"),
                severity: WarningSeverity::Warning,
                hint: Some("Every flow keeps this many items in memory".into()),
            });
        }

        // ── Tick intervals ───
        if self.thinking.engaged_interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "thinking.engaged_interval_secs".into(),
                message: "interval is 0, engaged flows would tick continuously".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }
        if self.thinking.focused_interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "thinking.focused_interval_secs".into(),
                message: "interval is 0, focused flows would tick continuously".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        }
        if self.thinking.focused_interval_secs > self.thinking.engaged_interval_secs {
            warnings.push(ConfigWarning {
                field: "thinking.focused_interval_secs".into(),
                message: format!(
                    "focused interval ({}s) is longer than engaged interval ({}s)",
                    self.thinking.focused_interval_secs, self.thinking.engaged_interval_secs
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Focused flows are expected to be observed more often".into()),
            });
        }

        // ── Database path ───
        if self.database.sqlite_path.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                field: "database.sqlite_path".into(),
                message: "database path is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'data/mai.db'".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
