//! File configuration for CLI defaults.
//!
//! The file is a flat list of `key = value` lines with `#` comments, read
//! from `$XDG_CONFIG_HOME/fast-media-loader/config.toml` (or
//! `$HOME/.config/fast-media-loader/config.toml`). Command-line flags take
//! precedence over file values, which take precedence over built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use fast_media_loader::download::{FetchKind, MAX_BATCH_SIZE, MIN_BATCH_SIZE, RetryPolicy};

const APP_DIR: &str = "fast-media-loader";
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Which download pathway to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    /// Always use the photo pathway.
    Photo,
    /// Always use the video pathway.
    Video,
    /// Sniff the extension of the first URL.
    #[default]
    Auto,
}

impl MediaType {
    /// Returns the stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Auto => "auto",
        }
    }

    /// The fixed kind, or `None` for [`MediaType::Auto`].
    #[must_use]
    pub fn fixed_kind(self) -> Option<FetchKind> {
        match self {
            Self::Photo => Some(FetchKind::Photo),
            Self::Video => Some(FetchKind::Video),
            Self::Auto => None,
        }
    }
}

/// Values read from the config file. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Batch size for both kinds (1..=100).
    pub batch_size: Option<usize>,
    /// Frame samples per second (>= 1).
    pub frame_rate: Option<u32>,
    /// Default media pathway.
    pub media_type: Option<MediaType>,
    /// Extract frames after downloading videos.
    pub extract_frames: Option<bool>,
    /// Per-attempt photo timeout in seconds (1..=3600).
    pub photo_timeout_secs: Option<u64>,
    /// Per-attempt video timeout in seconds (1..=3600).
    pub video_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against the same constraints as the CLI.
    pub fn validate(&self) -> Result<()> {
        if let Some(batch_size) = self.batch_size
            && !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size)
        {
            bail!(
                "Invalid config value for `batch_size`: {batch_size}. Expected range: {MIN_BATCH_SIZE}..={MAX_BATCH_SIZE}"
            );
        }
        if self.frame_rate == Some(0) {
            bail!("Invalid config value for `frame_rate`: 0. Expected a positive integer");
        }
        validate_timeout_secs("photo_timeout_secs", self.photo_timeout_secs)?;
        validate_timeout_secs("video_timeout_secs", self.video_timeout_secs)?;
        Ok(())
    }

    /// Applies the timeout overrides on top of `base`.
    #[must_use]
    pub fn apply_to_policy(&self, base: RetryPolicy) -> RetryPolicy {
        let mut policy = base;
        if let Some(secs) = self.photo_timeout_secs {
            policy = policy.with_timeout(FetchKind::Photo, Duration::from_secs(secs));
        }
        if let Some(secs) = self.video_timeout_secs {
            policy = policy.with_timeout(FetchKind::Video, Duration::from_secs(secs));
        }
        policy
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={MAX_TIMEOUT_SECS}");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fast-media-loader/config.toml`
/// 2. `$HOME/.config/fast-media-loader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config at the default path; a missing file yields defaults.
pub fn load_default_file_config() -> Result<(Option<PathBuf>, FileConfig)> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(existing) if existing.exists() => {
            let config = load_file_config(existing)?;
            Ok((path, config))
        }
        _ => Ok((path, FileConfig::default())),
    }
}

/// Reads and validates the config file at `path`.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config text. Unknown keys are rejected.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "batch_size" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.batch_size = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("batch_size out of range for usize"))?,
                );
            }
            "frame_rate" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.frame_rate = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("frame_rate out of range for u32"))?,
                );
            }
            "media_type" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.media_type = Some(parse_media_type(&parsed).with_context(|| {
                    format!("Invalid `media_type` value '{parsed}' on line {line_no}")
                })?);
            }
            "extract_frames" => {
                cfg.extract_frames = Some(parse_boolean(value).with_context(context)?);
            }
            "photo_timeout_secs" => {
                cfg.photo_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "video_timeout_secs" => {
                cfg.video_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
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

fn parse_media_type(value: &str) -> Result<MediaType> {
    match value {
        "photo" => Ok(MediaType::Photo),
        "video" => Ok(MediaType::Video),
        "auto" => Ok(MediaType::Auto),
        _ => bail!("Expected one of: photo, video, auto"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
