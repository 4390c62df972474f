//! Process configuration (§4.11, §6), loaded once from the environment at
//! startup. Every field has a documented default except `database_url`.

use std::env;

use lore_core::AuthMode;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool_or(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub migrations_dir: String,
    pub db_pool_min: u32,
    pub db_pool_max: u32,
    pub auth_mode: AuthMode,
    pub oidc_issuer: Option<String>,
    pub oidc_audience: Option<String>,
    pub oidc_role_claim: String,
    pub oidc_org_claim: String,
    pub metrics_enabled: bool,
    pub log_format: String,
    pub log_level: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub body_size_limit_bytes: u64,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let auth_mode_raw = env_or("AUTH_MODE", "api-key-only");
        let auth_mode: AuthMode = auth_mode_raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        Ok(Self {
            database_url,
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8765),
            migrations_dir: env_or("MIGRATIONS_DIR", "migrations"),
            db_pool_min: env_parse_or("DB_POOL_MIN", lore_db::DEFAULT_POOL_MIN),
            db_pool_max: env_parse_or("DB_POOL_MAX", lore_db::DEFAULT_POOL_MAX),
            auth_mode,
            oidc_issuer: env::var("OIDC_ISSUER").ok(),
            oidc_audience: env::var("OIDC_AUDIENCE").ok(),
            oidc_role_claim: env_or("OIDC_ROLE_CLAIM", "role"),
            oidc_org_claim: env_or("OIDC_ORG_CLAIM", "tenant_id"),
            metrics_enabled: env_bool_or("METRICS_ENABLED", true),
            log_format: env_or("LOG_FORMAT", "pretty"),
            log_level: env_or("LOG_LEVEL", "info"),
            rate_limit_max_requests: env_parse_or(
                "RATE_LIMIT_MAX_REQUESTS",
                lore_ratelimit::DEFAULT_MAX_REQUESTS,
            ),
            rate_limit_window_seconds: env_parse_or(
                "RATE_LIMIT_WINDOW_SECONDS",
                lore_ratelimit::DEFAULT_WINDOW_SECONDS,
            ),
            body_size_limit_bytes: env_parse_or("BODY_SIZE_LIMIT_BYTES", 1_048_576),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        env::remove_var("LORE_TEST_ENV_OR");
        assert_eq!(env_or("LORE_TEST_ENV_OR", "fallback"), "fallback");
    }

    #[test]
    fn env_parse_or_falls_back_on_unparsable_values() {
        env::set_var("LORE_TEST_ENV_PARSE_OR", "not-a-number");
        assert_eq!(env_parse_or::<u32>("LORE_TEST_ENV_PARSE_OR", 7), 7);
        env::set_var("LORE_TEST_ENV_PARSE_OR", "42");
        assert_eq!(env_parse_or::<u32>("LORE_TEST_ENV_PARSE_OR", 7), 42);
        env::remove_var("LORE_TEST_ENV_PARSE_OR");
    }

    #[test]
    fn env_bool_or_accepts_the_documented_truthy_spellings() {
        for truthy in ["1", "true", "TRUE", "yes"] {
            env::set_var("LORE_TEST_ENV_BOOL_OR", truthy);
            assert!(env_bool_or("LORE_TEST_ENV_BOOL_OR", false));
        }
        env::set_var("LORE_TEST_ENV_BOOL_OR", "no");
        assert!(!env_bool_or("LORE_TEST_ENV_BOOL_OR", true));
        env::remove_var("LORE_TEST_ENV_BOOL_OR");
    }

    #[test]
    fn addr_joins_host_and_port() {
        let settings = Settings {
            database_url: "postgres://localhost/lore".into(),
            host: "127.0.0.1".into(),
            port: 9000,
            migrations_dir: "migrations".into(),
            db_pool_min: 2,
            db_pool_max: 10,
            auth_mode: AuthMode::ApiKeyOnly,
            oidc_issuer: None,
            oidc_audience: None,
            oidc_role_claim: "role".into(),
            oidc_org_claim: "tenant_id".into(),
            metrics_enabled: true,
            log_format: "pretty".into(),
            log_level: "info".into(),
            rate_limit_max_requests: 100,
            rate_limit_window_seconds: 60,
            body_size_limit_bytes: 1_048_576,
        };
        assert_eq!(settings.addr(), "127.0.0.1:9000");
    }
}
