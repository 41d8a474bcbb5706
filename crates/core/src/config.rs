use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confirm::DEFAULT_TTL_SECS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bot_token: SecretString,
    pub log_channel_id: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub seed_account_id: String,
    pub seed_balance: u64,
    pub token_secret: SecretString,
    pub confirm_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub log_channel_id: Option<String>,
    pub token_secret: Option<String>,
    pub port: Option<u16>,
    pub seed_account_id: Option<String>,
    pub seed_balance: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                bot_token: String::new().into(),
                log_channel_id: String::new(),
                api_base_url: "https://discord.com/api/v10".to_string(),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 3000 },
            ledger: LedgerConfig {
                seed_account_id: "123456789012345678".to_string(),
                seed_balance: 1_000,
                token_secret: String::new().into(),
                confirm_ttl_secs: DEFAULT_TTL_SECS,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tipjar.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            if let Some(bot_token_value) = gateway.bot_token {
                self.gateway.bot_token = secret_value(bot_token_value);
            }
            if let Some(log_channel_id) = gateway.log_channel_id {
                self.gateway.log_channel_id = log_channel_id;
            }
            if let Some(api_base_url) = gateway.api_base_url {
                self.gateway.api_base_url = api_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(ledger) = patch.ledger {
            if let Some(seed_account_id) = ledger.seed_account_id {
                self.ledger.seed_account_id = seed_account_id;
            }
            if let Some(seed_balance) = ledger.seed_balance {
                self.ledger.seed_balance = seed_balance;
            }
            if let Some(token_secret_value) = ledger.token_secret {
                self.ledger.token_secret = secret_value(token_secret_value);
            }
            if let Some(confirm_ttl_secs) = ledger.confirm_ttl_secs {
                self.ledger.confirm_ttl_secs = confirm_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TIPJAR_GATEWAY_BOT_TOKEN") {
            self.gateway.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TIPJAR_GATEWAY_LOG_CHANNEL_ID") {
            self.gateway.log_channel_id = value;
        }
        if let Some(value) = read_env("TIPJAR_GATEWAY_API_BASE_URL") {
            self.gateway.api_base_url = value;
        }

        if let Some(value) = read_env("TIPJAR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // TIPJAR_SERVER_PORT wins; bare PORT is honored for parity with
        // common hosting environments.
        let port = read_env("TIPJAR_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("TIPJAR_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("TIPJAR_LEDGER_SEED_ACCOUNT_ID") {
            self.ledger.seed_account_id = value;
        }
        if let Some(value) = read_env("TIPJAR_LEDGER_SEED_BALANCE") {
            self.ledger.seed_balance = parse_u64("TIPJAR_LEDGER_SEED_BALANCE", &value)?;
        }
        if let Some(value) = read_env("TIPJAR_LEDGER_TOKEN_SECRET") {
            self.ledger.token_secret = secret_value(value);
        }
        if let Some(value) = read_env("TIPJAR_LEDGER_CONFIRM_TTL_SECS") {
            self.ledger.confirm_ttl_secs = parse_u64("TIPJAR_LEDGER_CONFIRM_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("TIPJAR_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("TIPJAR_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.gateway.bot_token = secret_value(bot_token);
        }
        if let Some(log_channel_id) = overrides.log_channel_id {
            self.gateway.log_channel_id = log_channel_id;
        }
        if let Some(token_secret) = overrides.token_secret {
            self.ledger.token_secret = secret_value(token_secret);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(seed_account_id) = overrides.seed_account_id {
            self.ledger.seed_account_id = seed_account_id;
        }
        if let Some(seed_balance) = overrides.seed_balance {
            self.ledger.seed_balance = seed_balance;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_server(&self.server)?;
        validate_ledger(&self.ledger)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tipjar.toml"), PathBuf::from("config/tipjar.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.bot_token.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "gateway.bot_token is required. Create a bot application and copy its token"
                .to_string(),
        ));
    }

    if gateway.log_channel_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "gateway.log_channel_id is required (the channel that receives audit notices)"
                .to_string(),
        ));
    }

    if !gateway.api_base_url.starts_with("http://") && !gateway.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "gateway.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_ledger(ledger: &LedgerConfig) -> Result<(), ConfigError> {
    if ledger.seed_account_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ledger.seed_account_id must not be empty".to_string(),
        ));
    }

    if ledger.token_secret.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "ledger.token_secret is required (signs confirmation tokens)".to_string(),
        ));
    }

    if ledger.confirm_ttl_secs == 0 || ledger.confirm_ttl_secs > 3_600 {
        return Err(ConfigError::Validation(
            "ledger.confirm_ttl_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    server: Option<ServerPatch>,
    ledger: Option<LedgerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    bot_token: Option<String>,
    log_channel_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LedgerPatch {
    seed_account_id: Option<String>,
    seed_balance: Option<u64>,
    token_secret: Option<String>,
    confirm_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use crate::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            bot_token: Some("bot-token-test".to_string()),
            log_channel_id: Some("C-LOG".to_string()),
            token_secret: Some("signing-secret".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.seed_balance, 1_000);
        assert_eq!(config.ledger.confirm_ttl_secs, 300);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn load_fails_without_bot_token() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                log_channel_id: Some("C-LOG".to_string()),
                token_secret: Some("signing-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("gateway.bot_token"));
    }

    #[test]
    fn load_fails_without_token_secret() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("bot-token-test".to_string()),
                log_channel_id: Some("C-LOG".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("ledger.token_secret"));
    }

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                port: Some(4100),
                seed_account_id: Some("999".to_string()),
                seed_balance: Some(5_000),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect("load");

        assert_eq!(config.server.port, 4100);
        assert_eq!(config.ledger.seed_account_id, "999");
        assert_eq!(config.ledger.seed_balance, 5_000);
        assert_eq!(config.gateway.bot_token.expose_secret(), "bot-token-test");
    }

    #[test]
    fn config_file_patch_is_applied() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[server]\nport = 8099\n\n[ledger]\nseed_balance = 42\nconfirm_ttl_secs = 60\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: valid_overrides(),
        })
        .expect("load");

        assert_eq!(config.server.port, 8099);
        assert_eq!(config.ledger.seed_balance, 42);
        assert_eq!(config.ledger.confirm_ttl_secs, 60);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: valid_overrides(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn out_of_range_ttl_fails_validation() {
        let mut config = AppConfig::default();
        config.gateway.bot_token = "token".to_string().into();
        config.gateway.log_channel_id = "C-LOG".to_string();
        config.ledger.token_secret = "secret".to_string().into();
        config.ledger.confirm_ttl_secs = 0;

        let message = config.validate().err().expect("validation error").to_string();
        assert!(message.contains("confirm_ttl_secs"));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!("compact".parse::<LogFormat>().is_ok());
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
