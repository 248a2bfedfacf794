use crate::services::{MAX_POLICY_SPAN_SECS, VerificationPolicy};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub superuser: SuperuserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
    #[serde(default = "default_signup_token_expires_in")]
    pub signup_token_expires_in: i64, // seconds
}

fn default_signup_token_expires_in() -> i64 {
    1800
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailBackend {
    Smtp,
    /// Writes codes to the log instead of sending them. Development only.
    #[default]
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub backend: EmailBackend,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_address: String,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: EmailBackend::Console,
            host: "smtp-relay.brevo.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "Al-Qur'an <noreply@alquran.com>".to_string(),
            use_tls: true,
            timeout_secs: 30,
        }
    }
}

/// Timing and quota policy for email verification codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub code_ttl_secs: i64,
    pub resend_cooldown_secs: i64,
    pub max_codes_per_window: u64,
    pub rate_window_secs: i64,
    pub retention_hours: i64,
    pub cleanup_interval_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 300,
            resend_cooldown_secs: 60,
            max_codes_per_window: 3,
            rate_window_secs: 3600,
            retention_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

impl VerificationConfig {
    /// Rejects spans the verification store cannot turn into durations.
    pub fn validate(&self) -> Result<(), String> {
        VerificationPolicy::try_from(self).map_err(|e| e.to_string())?;
        if !(0..=MAX_POLICY_SPAN_SECS / 3600).contains(&self.retention_hours) {
            return Err(format!(
                "verification.retention_hours must be between 0 and {}, got {}",
                MAX_POLICY_SPAN_SECS / 3600,
                self.retention_hours
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperuserConfig {
    pub email: String,
    pub password: String,
}

impl Default for SuperuserConfig {
    fn default() -> Self {
        Self {
            email: "admin@alquran.com".to_string(),
            password: "admin123".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment.
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                        signup_token_expires_in: get_env_parse(
                            "JWT_SIGNUP_EXPIRES_IN",
                            default_signup_token_expires_in(),
                        ),
                    },
                    email: EmailConfig::default(),
                    verification: VerificationConfig::default(),
                    superuser: SuperuserConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        config.verification.validate()?;
        Ok(config)
    }

    // Environment variables win over file values.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get_env("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Some(v) = get_env("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(v) = get_env("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(v) = get_env("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Some(v) = get_env("JWT_SIGNUP_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.signup_token_expires_in = n;
        }

        // Email
        if let Some(v) = get_env("EMAIL_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "smtp" => self.email.backend = EmailBackend::Smtp,
                "console" => self.email.backend = EmailBackend::Console,
                other => log::warn!("Unknown EMAIL_BACKEND {other:?}, keeping configured value"),
            }
        }
        if let Some(v) = get_env("EMAIL_HOST") {
            self.email.host = v;
        }
        if let Some(v) = get_env("EMAIL_PORT")
            && let Ok(p) = v.parse()
        {
            self.email.port = p;
        }
        if let Some(v) = get_env("EMAIL_HOST_USER") {
            self.email.username = v;
        }
        if let Some(v) = get_env("EMAIL_HOST_PASSWORD") {
            self.email.password = v;
        }
        if let Some(v) = get_env("DEFAULT_FROM_EMAIL") {
            self.email.from_address = v;
        }
        if let Some(v) = get_env("EMAIL_USE_TLS")
            && let Ok(b) = v.parse()
        {
            self.email.use_tls = b;
        }
        if let Some(v) = get_env("EMAIL_TIMEOUT")
            && let Ok(n) = v.parse()
        {
            self.email.timeout_secs = n;
        }

        // Verification policy
        if let Some(v) = get_env("VERIFICATION_RETENTION_HOURS")
            && let Ok(n) = v.parse()
        {
            self.verification.retention_hours = n;
        }
        if let Some(v) = get_env("VERIFICATION_CLEANUP_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            self.verification.cleanup_interval_secs = n;
        }

        // Superuser bootstrap
        if let Some(v) = get_env("SUPERUSER_EMAIL") {
            self.superuser.email = v;
        }
        if let Some(v) = get_env("SUPERUSER_PASSWORD") {
            self.superuser.password = v;
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    get_env(name)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
