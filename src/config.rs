use crate::auth::challenge::normalize_domain;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    /// Host the challenge `Domain:` line must name, normalized.
    pub service_domain: String,
    pub dashboard_path: String,

    // Limits
    pub max_body_bytes: usize,

    // TTLs (in seconds)
    pub nonce_ttl_secs: u64,
    pub nonce_issue_interval_secs: u64,
    pub session_ttl_secs: u64,

    // External stores
    pub store_timeout_ms: u64,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("service_domain", &self.service_domain)
            .field("dashboard_path", &self.dashboard_path)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("nonce_issue_interval_secs", &self.nonce_issue_interval_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        // Redis (required)
        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let service_domain = env::var("SERVICE_DOMAIN")
            .map_err(|_| ConfigError::MissingVar("SERVICE_DOMAIN".to_string()))?;
        let service_domain = normalize_domain(&service_domain);
        if service_domain.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVICE_DOMAIN".to_string(),
                "cannot be empty".to_string(),
            ));
        }
        if service_domain.contains(char::is_whitespace) || service_domain.contains('/') {
            return Err(ConfigError::InvalidValue(
                "SERVICE_DOMAIN".to_string(),
                "must be a bare host name".to_string(),
            ));
        }

        let dashboard_path = env::var("DASHBOARD_PATH").unwrap_or_else(|_| "/dashboard".to_string());
        if !dashboard_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "DASHBOARD_PATH".to_string(),
                "must start with '/'".to_string(),
            ));
        }

        // Limits
        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", 2_097_152)?;

        // TTLs
        let nonce_ttl_secs = parse_env_or_default("NONCE_TTL_SECS", 300)?;
        let nonce_issue_interval_secs = parse_env_or_default("NONCE_ISSUE_INTERVAL_SECS", 10)?;
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 7_200)?;

        if nonce_ttl_secs == 0 || session_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "NONCE_TTL_SECS/SESSION_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // External stores
        let store_timeout_ms = parse_env_or_default("STORE_TIMEOUT_MS", 3_000)?;

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 30)?;

        Ok(Config {
            redis_url,
            bind_addr,
            service_domain,
            dashboard_path,
            max_body_bytes,
            nonce_ttl_secs,
            nonce_issue_interval_secs,
            session_ttl_secs,
            store_timeout_ms,
            rate_limit_auth_per_min,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests run serially since they modify global env vars.
    // unwrap_or_else handles poison from prior panics.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_test_env() {
        env::remove_var("REDIS_URL");
        env::remove_var("BIND_ADDR");
        env::remove_var("SERVICE_DOMAIN");
        env::remove_var("DASHBOARD_PATH");
        env::remove_var("MAX_BODY_BYTES");
        env::remove_var("NONCE_TTL_SECS");
        env::remove_var("NONCE_ISSUE_INTERVAL_SECS");
        env::remove_var("SESSION_TTL_SECS");
        env::remove_var("STORE_TIMEOUT_MS");
        env::remove_var("RATE_LIMIT_AUTH_PER_MIN");
    }

    fn set_required() {
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("SERVICE_DOMAIN", "example.com");
    }

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_empty_service_domain() {
        let _guard = lock_test();
        clear_test_env();

        // Set to empty rather than removing so a .env file cannot fill it in
        // (dotenvy doesn't override existing vars).
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("SERVICE_DOMAIN", "");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SERVICE_DOMAIN"
        ));

        clear_test_env();
    }

    #[test]
    fn test_service_domain_rejects_urls() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("SERVICE_DOMAIN", "https://example.com/");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SERVICE_DOMAIN"
        ));

        clear_test_env();
    }

    #[test]
    fn test_service_domain_is_normalized() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("SERVICE_DOMAIN", " Blog.Example.COM:8443 ");

        let config = Config::from_env().unwrap();
        assert_eq!(config.service_domain, "blog.example.com");

        clear_test_env();
    }

    #[test]
    fn test_invalid_dashboard_path() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("DASHBOARD_PATH", "dashboard");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "DASHBOARD_PATH"
        ));

        clear_test_env();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("NONCE_TTL_SECS", "0");

        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidValue(_, _)
        ));

        clear_test_env();
    }

    #[test]
    fn test_unparseable_number() {
        let _guard = lock_test();
        clear_test_env();

        set_required();
        env::set_var("SESSION_TTL_SECS", "two hours");

        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::ParseError(ref s, _) if s == "SESSION_TTL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_redis_url() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("REDIS_URL", "redis://:hunter2@10.0.0.5:6379");
        env::set_var("SERVICE_DOMAIN", "example.com");

        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));

        clear_test_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();

        // Set required vars + override any .env defaults to ensure predictable values
        set_required();
        env::set_var("BIND_ADDR", "0.0.0.0:3000");

        let config = Config::from_env().unwrap();

        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.service_domain, "example.com");
        assert_eq!(config.dashboard_path, "/dashboard");
        assert_eq!(config.max_body_bytes, 2_097_152);
        assert_eq!(config.nonce_ttl_secs, 300);
        assert_eq!(config.nonce_issue_interval_secs, 10);
        assert_eq!(config.session_ttl_secs, 7_200);
        assert_eq!(config.store_timeout(), Duration::from_millis(3_000));
        assert_eq!(config.rate_limit_auth_per_min, 30);

        clear_test_env();
    }
}
