use crate::error::{CoreError, Result};
use crate::lyrics::LyricsState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Smallest accepted instrumental animation interval in seconds
pub const MIN_INSTRUMENTAL_INTERVAL: f64 = 0.1;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which MPRIS players to follow. Entries match as substrings of the bus name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Provider priority: providers are tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<LyricsProviderType>,
    /// Seconds added to every lyric timestamp before it is compared to the
    /// playback position.
    #[serde(default)]
    pub timestamp_offset: f64,
}

fn default_providers() -> Vec<LyricsProviderType> {
    vec![LyricsProviderType::Lrclib]
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            timestamp_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsProviderType {
    Lrclib,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory, `~/` is expanded. Defaults to the XDG cache dir.
    #[serde(default)]
    pub dir: Option<String>,
    /// Hours before a cached entry is refetched. 0 keeps entries forever.
    #[serde(default = "default_life_span_hours")]
    pub life_span_hours: u64,
    /// Which lyric states are worth caching.
    #[serde(default = "default_store_condition")]
    pub store_condition: Vec<LyricsState>,
}

const fn default_true() -> bool {
    true
}

const fn default_life_span_hours() -> u64 {
    24 * 7
}

fn default_store_condition() -> Vec<LyricsState> {
    vec![
        LyricsState::Synced,
        LyricsState::Plain,
        LyricsState::Instrumental,
    ]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            life_span_hours: default_life_span_hours(),
            store_condition: default_store_condition(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .as_deref()
            .map_or_else(crate::paths::cache_dir, crate::paths::expand_home)
    }

    /// `None` when entries never expire.
    #[must_use]
    pub fn life_span(&self) -> Option<Duration> {
        (self.life_span_hours > 0)
            .then(|| Duration::from_secs(self.life_span_hours.saturating_mul(3600)))
    }

    #[must_use]
    pub fn should_store(&self, state: LyricsState) -> bool {
        self.store_condition.contains(&state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    #[default]
    Piped,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "type", default)]
    pub kind: OutputType,
    #[serde(default)]
    pub piped: PipedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipedFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipedConfig {
    /// `stdout` or a file path that is atomically rewritten on every update
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default)]
    pub format: PipedFormat,
    #[serde(default = "default_true")]
    pub insert_newline: bool,
    /// Placeholders: `{icon}`, `{lyric}`, `{multiplier}`
    #[serde(default = "default_text_format")]
    pub text_format: String,
    /// Placeholder: `{value}`
    #[serde(default = "default_multiplier_format")]
    pub multiplier_format: String,
    #[serde(default)]
    pub lyric_icon: String,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub instrumental: InstrumentalConfig,
}

fn default_destination() -> String {
    "stdout".to_string()
}

fn default_text_format() -> String {
    "{icon} {lyric} {multiplier}".to_string()
}

fn default_multiplier_format() -> String {
    "x{value}".to_string()
}

impl Default for PipedConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            format: PipedFormat::Text,
            insert_newline: true,
            text_format: default_text_format(),
            multiplier_format: default_multiplier_format(),
            lyric_icon: String::new(),
            messages: MessagesConfig::default(),
            instrumental: InstrumentalConfig::default(),
        }
    }
}

impl PipedConfig {
    #[must_use]
    pub fn is_stdout(&self) -> bool {
        self.destination.eq_ignore_ascii_case("stdout")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_not_found")]
    pub not_found: String,
    #[serde(default = "default_no_synced")]
    pub no_synced_lyrics: String,
    #[serde(default = "default_loading")]
    pub getting_lyrics: String,
    #[serde(default = "default_error")]
    pub error: String,
    #[serde(default)]
    pub not_playing: String,
}

fn default_not_found() -> String {
    "Lyrics not found".to_string()
}

fn default_no_synced() -> String {
    "This song has no synced lyrics".to_string()
}

fn default_loading() -> String {
    "Getting lyrics...".to_string()
}

fn default_error() -> String {
    "Lyrics unavailable".to_string()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            not_found: default_not_found(),
            no_synced_lyrics: default_no_synced(),
            getting_lyrics: default_loading(),
            error: default_error(),
            not_playing: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentalConfig {
    /// Seconds between animation frames
    #[serde(default = "default_interval")]
    pub interval: f64,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_max_symbols")]
    pub max_symbols: u32,
}

const fn default_interval() -> f64 {
    0.5
}

fn default_symbol() -> String {
    "\u{266a}".to_string()
}

const fn default_max_symbols() -> u32 {
    3
}

impl Default for InstrumentalConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            symbol: default_symbol(),
            max_symbols: default_max_symbols(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write logs to the state directory
    #[serde(default)]
    pub file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
        }
    }
}

/// A problem found while validating the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: String,
    /// Fatal issues prevent startup, the rest were corrected in place.
    pub fatal: bool,
}

impl ValidationIssue {
    fn fatal(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
            fatal: true,
        }
    }

    fn corrected(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
            fatal: false,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Load config from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] if the file does not exist, or a
    /// read/parse error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load an explicitly requested config file, or the default location
    /// falling back to built-in defaults when that file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// explicitly requested file is missing.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        let path = crate::paths::config_path();
        match Self::load(&path) {
            Err(CoreError::ConfigNotFound { .. }) => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParseError`] on invalid TOML or field types.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the commented template to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }

    /// Check the configuration, clamping recoverable values in place.
    pub fn validate(&mut self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !self.lyrics.timestamp_offset.is_finite() {
            issues.push(ValidationIssue::fatal(
                "lyrics.timestamp_offset",
                "must be a finite number of seconds",
            ));
        }

        if self.lyrics.providers.is_empty() {
            issues.push(ValidationIssue::corrected(
                "lyrics.providers",
                "no providers configured, lyrics will only come from the cache",
            ));
        }

        let piped = &mut self.output.piped;
        if !piped.is_stdout() {
            let destination = crate::paths::expand_home(&piped.destination);
            let parent_missing = destination
                .parent()
                .is_some_and(|p| !p.as_os_str().is_empty() && !p.is_dir());
            if piped.destination.trim().is_empty() || parent_missing {
                issues.push(ValidationIssue::fatal(
                    "output.piped.destination",
                    format!("directory for {} does not exist", piped.destination),
                ));
            }
        }

        let instrumental = &mut piped.instrumental;
        if instrumental.interval.is_nan() || instrumental.interval < MIN_INSTRUMENTAL_INTERVAL {
            issues.push(ValidationIssue::corrected(
                "output.piped.instrumental.interval",
                format!(
                    "{} is below the minimum, using {MIN_INSTRUMENTAL_INTERVAL}",
                    instrumental.interval
                ),
            ));
            instrumental.interval = MIN_INSTRUMENTAL_INTERVAL;
        }
        if instrumental.max_symbols < 1 {
            issues.push(ValidationIssue::corrected(
                "output.piped.instrumental.max_symbols",
                "must be at least 1, using 1",
            ));
            instrumental.max_symbols = 1;
        }

        issues
    }
}

pub const CONFIG_TEMPLATE: &str = r#"# lyricsync configuration
# ~/.config/lyricsync/config.toml

[player]
# Follow only players whose MPRIS bus name contains one of these strings.
# Empty means any player.
included = []
# Never follow players whose bus name contains one of these strings.
excluded = []

[lyrics]
# Providers are tried in order: "lrclib"
providers = ["lrclib"]
# Seconds added to every lyric timestamp (negative shows lines later)
timestamp_offset = 0.0

[cache]
enabled = true
# dir = "~/.cache/lyricsync"
# Hours before cached lyrics are refetched, 0 keeps them forever
life_span_hours = 168
# Lyric kinds worth caching: "synced", "plain", "instrumental", "not_found"
store_condition = ["synced", "plain", "instrumental"]

[output]
type = "piped"

[output.piped]
# "stdout" or a file path
destination = "stdout"
# "text" or "json"
format = "text"
insert_newline = true
# Placeholders: {icon}, {lyric}, {multiplier}
text_format = "{icon} {lyric} {multiplier}"
# Shown when the same line repeats. Placeholder: {value}
multiplier_format = "x{value}"
lyric_icon = ""

[output.piped.messages]
not_found = "Lyrics not found"
no_synced_lyrics = "This song has no synced lyrics"
getting_lyrics = "Getting lyrics..."
error = "Lyrics unavailable"
not_playing = ""

[output.piped.instrumental]
# Seconds between animation frames (minimum 0.1)
interval = 0.5
symbol = "♪"
max_symbols = 3

[logging]
# Used when RUST_LOG is unset
level = "info"
# Also log to ~/.local/state/lyricsync/lyricsync.log
file = false
"#;
