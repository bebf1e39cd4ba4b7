//! File configuration for the `harvester` binary.
//!
//! The file is a flat list of `key = value` lines (a strict subset of TOML):
//! strings are double-quoted, integers are bare, `#` starts a comment.
//! Unknown keys and out-of-range values are rejected with the line number.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use harvester_core::{AcquisitionConfig, DownloadConfig, RetryPolicy};

/// Environment variable naming an explicit config file.
pub(crate) const CONFIG_PATH_ENV: &str = "HARVESTER_CONFIG";

/// Report path used when the config does not name one.
pub(crate) const DEFAULT_REPORT_PATH: &str = "report.json";

/// Settings read from the config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    /// Directory downloads are written to.
    pub output_dir: Option<PathBuf>,
    /// Where the JSON run report is written.
    pub report_path: Option<PathBuf>,
    /// Directory of captured item-list responses played back as the browser.
    pub capture_dir: Option<PathBuf>,
    /// Netscape cookie export of the browser session.
    pub cookies_file: Option<PathBuf>,
    /// JSON object of intercepted request headers.
    pub headers_file: Option<PathBuf>,
    /// Default verbosity when no flag or `RUST_LOG` is given.
    pub verbosity: Option<VerbositySetting>,
    /// Per-attempt download timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Wait after every scroll in milliseconds.
    pub settle_delay_ms: Option<u64>,
    /// Wait after the last scroll in milliseconds.
    pub grace_delay_ms: Option<u64>,
    /// Hard cap on scroll rounds.
    pub max_scroll_rounds: Option<u32>,
    /// Fixed wait between download retries in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Recovery sweep rounds after the primary pass.
    pub sweep_rounds: Option<u32>,
    /// Pause between sweep rounds in milliseconds.
    pub sweep_pause_ms: Option<u64>,
}

impl FileConfig {
    /// Validates values against runtime constraints.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(secs) = self.request_timeout_secs
            && !(1..=3600).contains(&secs)
        {
            bail!("Invalid config value for `request_timeout_secs`: {secs}. Expected range: 1..=3600");
        }
        if let Some(rounds) = self.max_scroll_rounds
            && !(1..=10_000).contains(&rounds)
        {
            bail!("Invalid config value for `max_scroll_rounds`: {rounds}. Expected range: 1..=10000");
        }
        if let Some(rounds) = self.sweep_rounds
            && rounds > 20
        {
            bail!("Invalid config value for `sweep_rounds`: {rounds}. Expected range: 0..=20");
        }
        validate_delay_ms("settle_delay_ms", self.settle_delay_ms)?;
        validate_delay_ms("grace_delay_ms", self.grace_delay_ms)?;
        validate_delay_ms("retry_delay_ms", self.retry_delay_ms)?;
        validate_delay_ms("sweep_pause_ms", self.sweep_pause_ms)?;
        Ok(())
    }

    /// Acquisition settings with this file's overrides applied.
    pub(crate) fn acquisition_config(&self) -> AcquisitionConfig {
        let mut config = AcquisitionConfig::default();
        if let Some(ms) = self.settle_delay_ms {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.grace_delay_ms {
            config.grace_delay = Duration::from_millis(ms);
        }
        if let Some(rounds) = self.max_scroll_rounds {
            config.max_scroll_rounds = rounds;
        }
        config
    }

    /// Engine and orchestrator settings with this file's overrides applied.
    ///
    /// `retry_delay_ms` applies to both retry layers.
    pub(crate) fn download_config(&self) -> DownloadConfig {
        let mut config = DownloadConfig::default();
        if let Some(secs) = self.request_timeout_secs {
            config.engine.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.retry_delay_ms {
            let delay = Duration::from_millis(ms);
            config.engine.retry_policy =
                RetryPolicy::new(config.engine.retry_policy.max_attempts(), delay);
            config.orchestrator.primary_policy =
                RetryPolicy::new(config.orchestrator.primary_policy.max_attempts(), delay);
        }
        if let Some(rounds) = self.sweep_rounds {
            config.orchestrator.sweep_rounds = rounds;
        }
        if let Some(ms) = self.sweep_pause_ms {
            config.orchestrator.sweep_pause = Duration::from_millis(ms);
        }
        if let Some(dir) = &self.output_dir {
            config.orchestrator.output_dir.clone_from(dir);
        }
        config
    }

    /// Report path, falling back to [`DEFAULT_REPORT_PATH`].
    pub(crate) fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH))
    }
}

fn validate_delay_ms(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 600_000 {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=600000");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level this label maps to.
    #[must_use]
    pub(crate) fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config and where it came from.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedConfig {
    /// Resolved config path, if any base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed settings; defaults when no file exists.
    pub config: FileConfig,
    /// Whether the settings were read from disk.
    pub loaded_from_file: bool,
}

/// Resolves the config path.
///
/// Priority:
/// 1. `$HARVESTER_CONFIG`
/// 2. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 3. `$HOME/.config/harvester/config.toml`
#[must_use]
pub(crate) fn resolve_config_path() -> Option<PathBuf> {
    if let Some(explicit) = env_var_non_empty_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(explicit));
    }
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file if present.
///
/// An explicit `$HARVESTER_CONFIG` that does not exist is an error; a missing
/// default file is not.
pub(crate) fn load_config() -> Result<LoadedConfig> {
    let explicit = env_var_non_empty_os(CONFIG_PATH_ENV).is_some();
    let path = resolve_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };

    if !path_ref.exists() {
        if explicit {
            bail!(
                "Config file '{}' named by {CONFIG_PATH_ENV} does not exist",
                path_ref.display()
            );
        }
        return Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config,
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "report_path" => {
                cfg.report_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "capture_dir" => {
                cfg.capture_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "cookies_file" => {
                cfg.cookies_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "headers_file" => {
                cfg.headers_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "settle_delay_ms" => {
                cfg.settle_delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "grace_delay_ms" => {
                cfg.grace_delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "max_scroll_rounds" => {
                cfg.max_scroll_rounds = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "retry_delay_ms" => {
                cfg.retry_delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "sweep_rounds" => {
                cfg.sweep_rounds = Some(parse_integer_u32(value).with_context(invalid)?);
            }
            "sweep_pause_ms" => {
                cfg.sweep_pause_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
