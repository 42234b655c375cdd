use crate::app_config::{AppConfig, Environment, MailConfig};
use crate::boot::{BootMode, BOOT_MODE_VAR};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REPOCRAWL_ENV", "development"))?;

    let bind_addr = or_default("REPOCRAWL_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("REPOCRAWL_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("REPOCRAWL_LOG_LEVEL", "info");
    let tasks_path = PathBuf::from(or_default("REPOCRAWL_TASKS_PATH", "./config/tasks.yaml"));
    let boot_mode = BootMode::from_lookup(lookup(BOOT_MODE_VAR));

    let db_max_connections = parse_u32("REPOCRAWL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REPOCRAWL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REPOCRAWL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let smtp_port = match lookup("SMTP_PORT") {
        Ok(raw) => Some(
            raw.parse::<u16>()
                .map_err(|e| invalid("SMTP_PORT", e.to_string()))?,
        ),
        Err(_) => None,
    };
    let smtp_tls = parse_bool("SMTP_TLS", &or_default("SMTP_TLS", "true"))?;

    let mail = MailConfig {
        smtp_host: lookup("SMTP_HOST").ok().filter(|h| !h.trim().is_empty()),
        smtp_port,
        smtp_tls,
        smtp_username: lookup("SMTP_USERNAME").ok(),
        smtp_password: lookup("SMTP_PASSWORD").ok(),
        from: or_default("MONITOR_MAIL_FROM", "repocrawl@localhost"),
        to: split_list(&or_default("MONITOR_MAIL_TO", "")),
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        tasks_path,
        boot_mode,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        mail,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REPOCRAWL_ENV".to_string(),
            reason: format!("expected development, test, or production; got {other:?}"),
        }),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
