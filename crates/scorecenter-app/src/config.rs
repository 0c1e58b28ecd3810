// Configuration loading and parsing (scorecenter.toml, credentials.toml).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use scorecenter_core::source::espn::{EspnSettings, DEFAULT_BASE_URL};
use scorecenter_drawer::{DrawerConfig, DrawerConfigError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to write default config: {message}")]
    DefaultsCopyError { message: String },

    #[error("invalid drawer configuration: {0}")]
    Drawer(#[from] DrawerConfigError),
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub sports: SportsConfig,
    pub display: DisplayConfig,
    pub drawer: DrawerConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Settings for the ESPN-backed data source.
    pub fn espn_settings(&self) -> EspnSettings {
        EspnSettings {
            base_url: self.api.base_url.clone(),
            api_key: self.credentials.espn_api_key.clone().unwrap_or_default(),
            proxy_prefix: self.api.proxy_prefix.clone(),
            min_call_spacing: Duration::from_millis(self.api.min_call_spacing_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// scorecenter.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire scorecenter.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ScoreCenterFile {
    api: ApiConfig,
    #[serde(default)]
    cache: CacheConfig,
    sports: SportsConfig,
    #[serde(default)]
    display: DisplayConfig,
    drawer: DrawerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prepended to every request URL when non-empty.
    #[serde(default)]
    pub proxy_prefix: String,
    #[serde(default = "default_call_spacing_ms")]
    pub min_call_spacing_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_call_spacing_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: scorecenter_core::loader::DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportsConfig {
    /// Sport whose leagues are loaded before the first selection.
    pub favorite: String,
    /// League selected once startup completes.
    pub favorite_league: String,
    /// Every sport added to the tree at startup, favorite included.
    pub starters: Vec<String>,
}

/// Drawer container size in display pixels.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DisplayConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 480,
            height: 800,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub espn_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/scorecenter.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- scorecenter.toml (required) ---
    let main_path = config_dir.join("scorecenter.toml");
    let main_text = read_file(&main_path)?;
    let file: ScoreCenterFile =
        toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
            path: main_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        api: file.api,
        cache: file.cache,
        sports: file.sports,
        display: file.display,
        drawer: file.drawer,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Files written into `config/` on first run. The credentials template keeps
/// its `.example` suffix so it is never read as real credentials.
const DEFAULT_FILES: &[(&str, &str)] = &[
    ("scorecenter.toml", include_str!("../defaults/scorecenter.toml")),
    (
        "credentials.toml.example",
        include_str!("../defaults/credentials.toml.example"),
    ),
];

/// Write any bundled default file that `<base_dir>/config/` lacks. Returns
/// the paths that were created; files already present are left alone.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot create {}: {e}", config_dir.display()),
    })?;

    let mut written = Vec::new();
    for (name, text) in DEFAULT_FILES {
        let target = config_dir.join(name);
        if write_new(&target, text)? {
            info!(path = %target.display(), "wrote default config file");
            written.push(target);
        }
    }
    Ok(written)
}

/// Create `path` with `text`. `Ok(false)` when it already exists.
fn write_new(path: &Path, text: &str) -> Result<bool, ConfigError> {
    let copy_err = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("cannot write {}: {e}", path.display()),
    };
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_err(e)),
    };
    file.write_all(text.as_bytes()).map_err(copy_err)?;
    Ok(true)
}

/// Where config lives: the working directory when it already has `config/`,
/// otherwise the per-user config directory.
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    if cwd.join("config").is_dir() {
        return Ok(cwd);
    }
    Ok(directories::ProjectDirs::from("", "", "scorecenter")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or(cwd))
}

/// Locate the config directory, copy in any missing defaults, then load.
pub fn load_config() -> Result<Config, ConfigError> {
    let base = base_dir()?;
    ensure_config_files(&base)?;
    load_config_from(&base)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.api.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "api.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    if config.api.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "api.request_timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    if config.cache.capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.capacity".into(),
            message: "must be > 0".into(),
        });
    }

    let sports = &config.sports;
    if sports.favorite.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "sports.favorite".into(),
            message: "must not be empty".into(),
        });
    }
    if !sports
        .starters
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&sports.favorite))
    {
        return Err(ConfigError::ValidationError {
            field: "sports.starters".into(),
            message: format!("must include the favorite sport '{}'", sports.favorite),
        });
    }

    let display_fields: &[(&str, i32)] = &[
        ("display.width", config.display.width),
        ("display.height", config.display.height),
    ];
    for (name, val) in display_fields {
        if *val <= 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be > 0, got {val}"),
            });
        }
    }

    config.drawer.resolve()?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scorecenter_drawer::Anchor;
    use std::fs;

    /// Fresh, empty temp dir.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        tmp
    }

    fn write_main(tmp: &Path, text: &str) {
        let config_dir = tmp.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("scorecenter.toml"), text).unwrap();
    }

    const MINIMAL: &str = r#"
[api]

[sports]
favorite = "basketball"
favorite_league = "NBA"
starters = ["basketball"]

[[drawer.panels]]
handle = "handle1"
content = "content1"
"#;

    #[test]
    fn first_run_writes_bundled_defaults_into_empty_dir() {
        let tmp = scratch("scorecenter_config_defaults");
        let written = ensure_config_files(&tmp).expect("should write default configs");
        assert_eq!(written.len(), 2);
        assert!(tmp.join("config/scorecenter.toml").is_file());
        assert!(tmp.join("config/credentials.toml.example").is_file());
        assert!(!tmp.join("config/credentials.toml").exists());

        let config = load_config_from(&tmp).expect("should load valid config");
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.min_call_spacing_ms, 1000);
        assert_eq!(config.cache.capacity, 200);
        assert_eq!(config.sports.favorite, "Baseball");
        assert_eq!(config.sports.favorite_league, "MLB");
        assert_eq!(
            config.sports.starters,
            vec!["Baseball", "Football", "Basketball", "Soccer"]
        );
        assert_eq!(config.drawer.panels.len(), 4);
        assert_eq!(config.drawer.panels[0].handle, "handle1");
        assert_eq!(config.drawer.panels[3].content, "content4");
        assert!(config.drawer.lock_first_open);
        assert!(config.credentials.espn_api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_keeps_existing_files() {
        let tmp = scratch("scorecenter_config_ensure");
        write_main(&tmp, "# user edited\n");

        let written = ensure_config_files(&tmp).unwrap();
        assert_eq!(written, vec![tmp.join("config/credentials.toml.example")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/scorecenter.toml")).unwrap(),
            "# user edited\n"
        );

        let again = ensure_config_files(&tmp).unwrap();
        assert!(again.is_empty(), "nothing new to write, got {again:?}");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_main_file_is_reported() {
        let tmp = std::env::temp_dir().join("scorecenter_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { ref path } if path.ends_with("scorecenter.toml")));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn minimal_file_fills_in_defaults() {
        let tmp = std::env::temp_dir().join("scorecenter_config_minimal");
        let _ = fs::remove_dir_all(&tmp);
        write_main(&tmp, MINIMAL);

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.proxy_prefix, "");
        assert_eq!(config.api.request_timeout_secs, 10);
        assert_eq!(config.cache.capacity, 200);
        assert_eq!(config.display.width, 480);
        assert_eq!(config.display.height, 800);
        assert!(config.drawer.allow_single_tap);
        assert_eq!(config.drawer.panels[0].handle_extent, 40);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_feed_espn_settings() {
        let tmp = std::env::temp_dir().join("scorecenter_config_creds");
        let _ = fs::remove_dir_all(&tmp);
        write_main(&tmp, MINIMAL);
        fs::write(
            tmp.join("config/credentials.toml"),
            "espn_api_key = \"k123\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        let settings = config.espn_settings();
        assert_eq!(settings.api_key, "k123");
        assert_eq!(settings.min_call_spacing, Duration::from_millis(1000));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn favorite_must_be_a_starter() {
        let tmp = std::env::temp_dir().join("scorecenter_config_starters");
        let _ = fs::remove_dir_all(&tmp);
        write_main(
            &tmp,
            &MINIMAL.replace("starters = [\"basketball\"]", "starters = [\"hockey\"]"),
        );

        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "sports.starters"),
            other => panic!("expected ValidationError, got {other:?}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let tmp = std::env::temp_dir().join("scorecenter_config_capacity");
        let _ = fs::remove_dir_all(&tmp);
        write_main(&tmp, &format!("{MINIMAL}\n[cache]\ncapacity = 0\n"));

        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "cache.capacity"),
            other => panic!("expected ValidationError, got {other:?}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn conflicting_drawer_placement_rejected() {
        let tmp = std::env::temp_dir().join("scorecenter_config_placement");
        let _ = fs::remove_dir_all(&tmp);
        let text = MINIMAL.replace(
            "[[drawer.panels]]",
            "[drawer]\nanchor = \"top\"\norientation = \"vertical\"\n\n[[drawer.panels]]",
        );
        write_main(&tmp, &text);

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Drawer(DrawerConfigError::ConflictingPlacement)
        ));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn drawer_anchor_parses() {
        let tmp = std::env::temp_dir().join("scorecenter_config_anchor");
        let _ = fs::remove_dir_all(&tmp);
        let text = MINIMAL.replace(
            "[[drawer.panels]]",
            "[drawer]\nanchor = \"left\"\n\n[[drawer.panels]]",
        );
        write_main(&tmp, &text);

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.drawer.anchor, Some(Anchor::Left));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let tmp = std::env::temp_dir().join("scorecenter_config_parse");
        let _ = fs::remove_dir_all(&tmp);
        write_main(&tmp, "[api\nbase_url = ");

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }
}
