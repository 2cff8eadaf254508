//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or an explicit `-f` path), falls back to
//! built-in defaults when the default file is absent, then applies the
//! bot-service environment variables on top. Credentials are only ever taken
//! from the environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

// ── Resolved types ────────────────────────────────────────────────────────────

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/StaticViews`.
    pub static_views_dir: PathBuf,
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bot application registration. Empty `app_id` means the bot runs
/// unauthenticated (local emulator).
#[derive(Debug, Clone, Default)]
pub struct BotCredentials {
    pub app_id: String,
    pub app_password: Option<String>,
    /// Tenant the app registration lives in (single-tenant bots).
    pub tenant_id: Option<String>,
}

impl BotCredentials {
    pub fn is_anonymous(&self) -> bool {
        self.app_id.trim().is_empty()
    }
}

/// Outbound connector (reply) configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub login_authority: String,
    pub default_tenant: String,
    pub scope: String,
    pub timeout: Duration,
}

/// Inbound request authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub openid_metadata_url: String,
    pub issuer: String,
    pub jwks_cache: Duration,
    /// Minimum age of the key cache before an unknown `kid` may trigger a refetch.
    pub jwks_min_refresh: Duration,
    pub clock_skew: Duration,
}

/// Typing indicator shown while a message turn is running.
#[derive(Debug, Clone)]
pub struct TypingConfig {
    pub enabled: bool,
    pub delay: Duration,
    pub period: Duration,
}

/// Fully-resolved bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub http: HttpConfig,
    pub credentials: BotCredentials,
    /// OAuth connection configured on the bot registration.
    pub oauth_connection_name: Option<String>,
    pub connector: ConnectorConfig,
    pub auth: AuthConfig,
    pub typing: TypingConfig,
}

// ── Environment overrides ─────────────────────────────────────────────────────

/// Values taken from the process environment (or `.env`).
///
/// Kept as a plain struct so tests can build one without touching real env.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub app_id: Option<String>,
    pub app_password: Option<String>,
    pub directory_id: Option<String>,
    pub oauth_connection_name: Option<String>,
    pub port: Option<String>,
    pub log_level: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            app_id: non_empty_var("MicrosoftAppId"),
            app_password: non_empty_var("MicrosoftAppPassword"),
            directory_id: non_empty_var("MicrosoftDirectoryId"),
            oauth_connection_name: non_empty_var("OAuthConnectionName"),
            port: non_empty_var("port").or_else(|| non_empty_var("PORT")),
            log_level: non_empty_var("TENANT_SSO_LOG_LEVEL"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    oauth: RawOAuth,
    #[serde(default)]
    connector: RawConnector,
    #[serde(default)]
    auth: RawAuth,
    #[serde(default)]
    typing: RawTyping,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_bot_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    /// Allowed in TOML for non-secret local setups; env wins.
    #[serde(default)]
    app_id: Option<String>,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level(), app_id: None }
    }
}

#[derive(Deserialize)]
struct RawHttp {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_static_views_dir")]
    static_views_dir: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_views_dir: default_static_views_dir(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawOAuth {
    #[serde(default)]
    connection_name: Option<String>,
}

#[derive(Deserialize)]
struct RawConnector {
    #[serde(default = "default_login_authority")]
    login_authority: String,
    #[serde(default = "default_tenant")]
    default_tenant: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawConnector {
    fn default() -> Self {
        Self {
            login_authority: default_login_authority(),
            default_tenant: default_tenant(),
            scope: default_scope(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawAuth {
    #[serde(default = "default_openid_metadata_url")]
    openid_metadata_url: String,
    #[serde(default = "default_issuer")]
    issuer: String,
    #[serde(default = "default_jwks_cache_seconds")]
    jwks_cache_seconds: u64,
    #[serde(default = "default_jwks_min_refresh_seconds")]
    jwks_min_refresh_seconds: u64,
    #[serde(default = "default_clock_skew_seconds")]
    clock_skew_seconds: u64,
}

impl Default for RawAuth {
    fn default() -> Self {
        Self {
            openid_metadata_url: default_openid_metadata_url(),
            issuer: default_issuer(),
            jwks_cache_seconds: default_jwks_cache_seconds(),
            jwks_min_refresh_seconds: default_jwks_min_refresh_seconds(),
            clock_skew_seconds: default_clock_skew_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawTyping {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_typing_delay_ms")]
    delay_ms: u64,
    #[serde(default = "default_typing_period_ms")]
    period_ms: u64,
}

impl Default for RawTyping {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: default_typing_delay_ms(),
            period_ms: default_typing_period_ms(),
        }
    }
}

fn default_bot_name() -> String { "tenant-sso-bot".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3978 }
fn default_static_views_dir() -> String { "StaticViews".to_string() }
fn default_login_authority() -> String { "https://login.microsoftonline.com".to_string() }
fn default_tenant() -> String { "botframework.com".to_string() }
fn default_scope() -> String { "https://api.botframework.com/.default".to_string() }
fn default_timeout_seconds() -> u64 { 30 }
fn default_openid_metadata_url() -> String {
    "https://login.botframework.com/v1/.well-known/openidconfiguration".to_string()
}
fn default_issuer() -> String { "https://api.botframework.com".to_string() }
fn default_jwks_cache_seconds() -> u64 { 24 * 60 * 60 }
fn default_jwks_min_refresh_seconds() -> u64 { 5 * 60 }
fn default_clock_skew_seconds() -> u64 { 5 * 60 }
fn default_typing_delay_ms() -> u64 { 500 }
fn default_typing_period_ms() -> u64 { 2000 }
fn default_true() -> bool { true }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `config_path` (or `config/default.toml`) and apply
/// overrides from the process environment.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = EnvOverrides::from_env();
    match config_path {
        Some(path) => load_from(Some(Path::new(path)), &overrides),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            let path = default_path.exists().then_some(default_path);
            load_from(path, &overrides)
        }
    }
}

/// Internal loader. `None` means "no file, use built-in defaults".
pub fn load_from(path: Option<&Path>, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str::<RawConfig>(&text)
                .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
        }
        None => RawConfig::default(),
    };

    resolve(raw, overrides)
}

fn resolve(raw: RawConfig, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let port = match overrides.port.as_deref() {
        Some(p) => p
            .trim()
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("invalid port '{p}': {e}")))?,
        None => raw.http.port,
    };

    let app_id = overrides
        .app_id
        .clone()
        .or(raw.bot.app_id)
        .unwrap_or_default();

    let oauth_connection_name = overrides
        .oauth_connection_name
        .clone()
        .or(raw.oauth.connection_name)
        .filter(|c| !c.trim().is_empty());

    if raw.typing.period_ms == 0 {
        return Err(AppError::Config("typing.period_ms must be greater than zero".into()));
    }

    Ok(Config {
        bot_name: raw.bot.name,
        log_level: overrides.log_level.clone().unwrap_or(raw.bot.log_level),
        http: HttpConfig {
            host: raw.http.host,
            port,
            static_views_dir: PathBuf::from(raw.http.static_views_dir),
        },
        credentials: BotCredentials {
            app_id,
            app_password: overrides.app_password.clone(),
            tenant_id: overrides.directory_id.clone(),
        },
        oauth_connection_name,
        connector: ConnectorConfig {
            login_authority: raw.connector.login_authority.trim_end_matches('/').to_string(),
            default_tenant: raw.connector.default_tenant,
            scope: raw.connector.scope,
            timeout: Duration::from_secs(raw.connector.timeout_seconds),
        },
        auth: AuthConfig {
            openid_metadata_url: raw.auth.openid_metadata_url,
            issuer: raw.auth.issuer,
            jwks_cache: Duration::from_secs(raw.auth.jwks_cache_seconds),
            jwks_min_refresh: Duration::from_secs(raw.auth.jwks_min_refresh_seconds),
            clock_skew: Duration::from_secs(raw.auth.clock_skew_seconds),
        },
        typing: TypingConfig {
            enabled: raw.typing.enabled,
            delay: Duration::from_millis(raw.typing.delay_ms),
            period: Duration::from_millis(raw.typing.period_ms),
        },
    })
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Config with built-in defaults, anonymous credentials and no typing
    /// indicator. Used by tests.
    pub fn test_default() -> Self {
        let mut config = resolve(RawConfig::default(), &EnvOverrides::default())
            .unwrap_or_else(|e| panic!("built-in defaults must resolve: {e}"));
        config.typing.enabled = false;
        config.oauth_connection_name = Some("TestConnection".into());
        config
    }
}
