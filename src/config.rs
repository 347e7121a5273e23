use std::time::Duration;

use serde::Deserialize;

use crate::authz::PolicyRule;
use crate::errors::AppError;
use crate::gateway::TokenSource;

/// Everything the gateway needs, supplied once at process start. Changing
/// the policy requires a restart; nothing here mutates at runtime.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub rules: Vec<PolicyRule>,
    pub cache_ttl: Duration,
    pub lookup_timeout: Duration,
    pub token_source: TokenSource,
    pub login_path: String,
}

#[derive(Deserialize)]
struct PolicyFile {
    rules: Vec<PolicyRule>,
}

impl GatewayConfig {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules,
            cache_ttl: Duration::from_secs(45),
            lookup_timeout: Duration::from_millis(2000),
            token_source: TokenSource::BearerHeader,
            login_path: "/login".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let policy_path = std::env::var("GATEWAY_POLICY_FILE")
            .map_err(|_| AppError::configuration("GATEWAY_POLICY_FILE not set"))?;
        let raw = std::fs::read_to_string(&policy_path).map_err(|err| {
            AppError::configuration(format!("failed to read policy file {policy_path}: {err}"))
        })?;
        let rules = parse_policy(&raw)?;

        let cache_ttl = Duration::from_secs(env_u64("GATEWAY_CACHE_TTL_SECS", 45)?);
        let lookup_timeout = Duration::from_millis(env_u64("GATEWAY_LOOKUP_TIMEOUT_MS", 2000)?);
        let token_source = parse_token_source(
            &std::env::var("GATEWAY_TOKEN_SOURCE").unwrap_or_else(|_| "header".to_string()),
        )?;
        let login_path =
            std::env::var("GATEWAY_LOGIN_PATH").unwrap_or_else(|_| "/login".to_string());

        Ok(Self {
            rules,
            cache_ttl,
            lookup_timeout,
            token_source,
            login_path,
        })
    }
}

/// Parse the JSON policy file. `serde_path_to_error` pins a parse failure to
/// the exact rule and field, which matters in a file operators edit by hand.
pub fn parse_policy(raw: &str) -> Result<Vec<PolicyRule>, AppError> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    let file: PolicyFile = serde_path_to_error::deserialize(deserializer).map_err(|err| {
        AppError::configuration(format!("invalid policy file at {}: {}", err.path(), err.inner()))
    })?;
    Ok(file.rules)
}

fn parse_token_source(value: &str) -> Result<TokenSource, AppError> {
    if value == "header" {
        return Ok(TokenSource::BearerHeader);
    }
    if let Some(name) = value.strip_prefix("cookie:") {
        if name.is_empty() {
            return Err(AppError::configuration(
                "GATEWAY_TOKEN_SOURCE cookie form needs a name: cookie:<name>",
            ));
        }
        return Ok(TokenSource::Cookie(name.to_string()));
    }
    Err(AppError::configuration(format!(
        "GATEWAY_TOKEN_SOURCE must be \"header\" or \"cookie:<name>\", got \"{value}\""
    )))
}

fn env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|_| AppError::configuration(format!("{name} must be a valid integer"))),
        Err(_) => Ok(default),
    }
}
