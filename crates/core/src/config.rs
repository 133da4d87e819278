//! Server configuration schema and loader
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! missing file or an empty one yields a working server.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! public_origin = "https://play.example.com"
//!
//! [directory]
//! idle_timeout_secs = 600
//! reap_interval_secs = 30
//!
//! [game]
//! round_duration_secs = 30
//! intermission_secs = 5
//! max_players = 7
//! lives = 3
//! win_points = 1
//! stall_limit = 5
//! target_ratio = [4, 5]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "KEYNES_CONFIG";

/// Environment variable overriding `server.bind`
pub const BIND_ENV: &str = "KEYNES_BIND";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub directory: DirectoryConfig,
    pub game: GameRules,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Origin used when printing invite links (e.g. `https://host`)
    pub public_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_origin: None,
        }
    }
}

/// Hub directory housekeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// A hub with no connections is reclaimed after this long without activity
    pub idle_timeout_secs: u64,
    /// How often the reaper sweeps the directory
    pub reap_interval_secs: u64,
    /// Upper bound on live hubs (unbounded when absent)
    pub max_hubs: Option<usize>,
}

impl DirectoryConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            reap_interval_secs: 30,
            max_hubs: None,
        }
    }
}

/// Ratio applied to the mean of all submissions to obtain the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct TargetRatio {
    pub numerator: u32,
    pub denominator: u32,
}

impl TargetRatio {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for TargetRatio {
    fn default() -> Self {
        Self::new(4, 5)
    }
}

impl From<(u32, u32)> for TargetRatio {
    fn from((numerator, denominator): (u32, u32)) -> Self {
        Self::new(numerator, denominator)
    }
}

impl From<TargetRatio> for (u32, u32) {
    fn from(ratio: TargetRatio) -> Self {
        (ratio.numerator, ratio.denominator)
    }
}

/// Per-hub game rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Submission window of one round
    pub round_duration_secs: u64,
    /// Pause between a round result and the next round
    pub intermission_secs: u64,
    pub max_players: usize,
    /// Lives each player starts with
    pub lives: u32,
    /// Points added to each round winner
    pub win_points: u32,
    /// Consecutive rounds without an elimination before the game is called
    pub stall_limit: u32,
    pub target_ratio: TargetRatio,
}

impl GameRules {
    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.round_duration_secs)
    }

    pub fn intermission(&self) -> Duration {
        Duration::from_secs(self.intermission_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.round_duration_secs == 0 {
            return Err(Error::Config("game.round_duration_secs must be positive".into()));
        }
        if self.max_players < 2 {
            return Err(Error::Config("game.max_players must be at least 2".into()));
        }
        if self.lives == 0 {
            return Err(Error::Config("game.lives must be positive".into()));
        }
        if self.stall_limit == 0 {
            return Err(Error::Config("game.stall_limit must be positive".into()));
        }
        if self.target_ratio.denominator == 0 {
            return Err(Error::Config("game.target_ratio denominator is zero".into()));
        }
        Ok(())
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            intermission_secs: 5,
            max_players: 7,
            lives: 3,
            win_points: 1,
            stall_limit: 5,
            target_ratio: TargetRatio::default(),
        }
    }
}

impl Config {
    /// Parse from TOML text and validate
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from `$KEYNES_CONFIG` or the platform config directory, then
    /// apply `$KEYNES_BIND`
    pub fn from_env() -> Result<Self> {
        let mut config = match Self::default_path()? {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.server.bind = bind
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a socket address: {}", BIND_ENV, bind)))?;
        }

        Ok(config)
    }

    /// Path the config is read from, if one can be determined
    pub fn default_path() -> Result<Option<PathBuf>> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(Some(PathBuf::from(path)));
        }

        Ok(ProjectDirs::from("dev", "onyx", "keynes").map(|dirs| dirs.config_dir().join("keynes.toml")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.reap_interval_secs == 0 {
            return Err(Error::Config("directory.reap_interval_secs must be positive".into()));
        }
        if self.directory.max_hubs == Some(0) {
            return Err(Error::Config("directory.max_hubs must be positive".into()));
        }
        self.game.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.game.target_ratio, TargetRatio::new(4, 5));
        assert_eq!(config.game.round_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            r#"
[server]
bind = "127.0.0.1:9000"

[game]
lives = 1
target_ratio = [2, 3]
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.game.lives, 1);
        assert_eq!(config.game.target_ratio, TargetRatio::new(2, 3));
        // Untouched fields keep defaults
        assert_eq!(config.game.max_players, 7);
        assert_eq!(config.directory.idle_timeout_secs, 600);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::parse("[game]\nlives = 0").is_err());
        assert!(Config::parse("[game]\nmax_players = 1").is_err());
        assert!(Config::parse("[game]\ntarget_ratio = [1, 0]").is_err());
        assert!(Config::parse("[game]\nround_duration_secs = 0").is_err());
        assert!(Config::parse("[directory]\nmax_hubs = 0").is_err());
        assert!(matches!(
            Config::parse("[game]\nlives = \"many\""),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keynes.toml");
        fs::write(&path, "[directory]\nidle_timeout_secs = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.directory.idle_timeout(), Duration::from_secs(5));
    }
}
