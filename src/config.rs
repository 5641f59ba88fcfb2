use crate::error::{BridgeError, Result};
use crate::platform::DebounceScope;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.trim(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cocoro: CocoroConfig,
    pub platform: PlatformConfig,
    pub cache: CacheConfig,
}

/// Cocoro application credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoroConfig {
    pub app_secret: String,
    pub app_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    /// Quiet period before queued updates are submitted
    pub submit_debounce_ms: u64,
    /// Interval between device state refreshes
    pub refresh_interval_secs: u64,
    /// Interval between discovery passes; `None` discovers once at startup
    pub discovery_interval_secs: Option<u64>,
    pub debounce_scope: DebounceScope,
}

impl PlatformConfig {
    pub fn submit_debounce(&self) -> Duration {
        Duration::from_millis(self.submit_debounce_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn discovery_interval(&self) -> Option<Duration> {
        self.discovery_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: "SharpCocoro".to_string(),
            submit_debounce_ms: 1000,
            refresh_interval_secs: 10,
            discovery_interval_secs: None,
            debounce_scope: DebounceScope::PerDevice,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: base.join("cocoro-homekit-bridge").join("accessories.json"),
        }
    }
}

/// Homebridge-style platform block, e.g.
/// `{ "platform": "SharpCocoro", "name": "Aircons", "appSecret": "...", "appKey": "..." }`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformBlock {
    #[serde(default)]
    name: Option<String>,
    app_secret: String,
    app_key: String,
    #[serde(default)]
    submit_debounce_ms: Option<u64>,
    #[serde(default)]
    refresh_interval_secs: Option<u64>,
    #[serde(default)]
    discovery_interval_secs: Option<u64>,
    #[serde(default)]
    debounce_scope: Option<DebounceScope>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cocoro: CocoroConfig::default(),
            platform: PlatformConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Read a JSON platform block, then apply environment overrides.
    pub fn from_platform_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_platform_json(&content)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_platform_json(json: &str) -> Result<Self> {
        let block: PlatformBlock = serde_json::from_str(json)?;
        let mut config = Self::default();

        config.cocoro.app_secret = block.app_secret;
        config.cocoro.app_key = block.app_key;
        if let Some(name) = block.name {
            config.platform.name = name;
        }
        if let Some(ms) = block.submit_debounce_ms {
            config.platform.submit_debounce_ms = ms;
        }
        if let Some(secs) = block.refresh_interval_secs {
            config.platform.refresh_interval_secs = secs;
        }
        if block.discovery_interval_secs.is_some() {
            config.platform.discovery_interval_secs = block.discovery_interval_secs;
        }
        if let Some(scope) = block.debounce_scope {
            config.platform.debounce_scope = scope;
        }

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("COCORO_APP_SECRET") {
            self.cocoro.app_secret = secret;
        }
        if let Ok(key) = std::env::var("COCORO_APP_KEY") {
            self.cocoro.app_key = key;
        }
        if let Ok(name) = std::env::var("PLATFORM_NAME") {
            self.platform.name = name;
        }
        if let Ok(ms) = std::env::var("SUBMIT_DEBOUNCE_MS")
            && let Ok(ms) = ms.parse()
        {
            self.platform.submit_debounce_ms = ms;
        }
        if let Ok(secs) = std::env::var("REFRESH_INTERVAL_SECS")
            && let Ok(secs) = secs.parse()
        {
            self.platform.refresh_interval_secs = secs;
        }
        if let Ok(secs) = std::env::var("DISCOVERY_INTERVAL_SECS")
            && let Ok(secs) = secs.parse()
        {
            self.platform.discovery_interval_secs = Some(secs);
        }
        if let Ok(scope) = std::env::var("DEBOUNCE_SCOPE")
            && let Ok(scope) = scope.parse()
        {
            self.platform.debounce_scope = scope;
        }
        if let Ok(path) = std::env::var("ACCESSORY_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cocoro.app_secret.trim().is_empty() {
            return Err(BridgeError::Config("appSecret is required".to_string()));
        }
        if self.cocoro.app_key.trim().is_empty() {
            return Err(BridgeError::Config("appKey is required".to_string()));
        }
        if self.platform.refresh_interval_secs == 0 {
            return Err(BridgeError::Config(
                "refresh interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
