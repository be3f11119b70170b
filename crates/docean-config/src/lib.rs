//! Provider configuration
//!
//! Resolves the settings the provider needs before it can talk to the
//! DigitalOcean API. Every value can be given explicitly through
//! [`ConfigBuilder`]; anything left unset falls back to the environment and
//! then to a built-in default.
//!
//! | Setting | Environment | Default |
//! |---------|-------------|---------|
//! | token | `DIGITALOCEAN_TOKEN`, `DIGITALOCEAN_ACCESS_TOKEN` | required |
//! | API endpoint | `DIGITALOCEAN_API_URL` | `https://api.digitalocean.com` |
//! | Spaces endpoint | `SPACES_ENDPOINT_URL` | `https://{{.Region}}.digitaloceanspaces.com` |
//! | Spaces keys | `SPACES_ACCESS_KEY_ID`, `SPACES_SECRET_ACCESS_KEY` | none |
//! | request rate | `DIGITALOCEAN_REQUESTS_PER_SECOND` | `0` (unlimited) |
//! | retry count | `DIGITALOCEAN_HTTP_RETRY_MAX` | `4` |
//! | retry wait | `DIGITALOCEAN_HTTP_RETRY_WAIT_MIN` / `_MAX` | `1.0` / `30.0` seconds |

pub mod error;

pub use error::*;

use std::time::Duration;

pub const ENV_TOKEN: &str = "DIGITALOCEAN_TOKEN";
pub const ENV_ACCESS_TOKEN: &str = "DIGITALOCEAN_ACCESS_TOKEN";
pub const ENV_API_URL: &str = "DIGITALOCEAN_API_URL";
pub const ENV_SPACES_ENDPOINT: &str = "SPACES_ENDPOINT_URL";
pub const ENV_SPACES_ACCESS_KEY_ID: &str = "SPACES_ACCESS_KEY_ID";
pub const ENV_SPACES_SECRET_ACCESS_KEY: &str = "SPACES_SECRET_ACCESS_KEY";
pub const ENV_REQUESTS_PER_SECOND: &str = "DIGITALOCEAN_REQUESTS_PER_SECOND";
pub const ENV_HTTP_RETRY_MAX: &str = "DIGITALOCEAN_HTTP_RETRY_MAX";
pub const ENV_HTTP_RETRY_WAIT_MIN: &str = "DIGITALOCEAN_HTTP_RETRY_WAIT_MIN";
pub const ENV_HTTP_RETRY_WAIT_MAX: &str = "DIGITALOCEAN_HTTP_RETRY_WAIT_MAX";

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com";
pub const DEFAULT_SPACES_ENDPOINT: &str = "https://{{.Region}}.digitaloceanspaces.com";
pub const DEFAULT_HTTP_RETRY_MAX: u32 = 4;
pub const DEFAULT_HTTP_RETRY_WAIT_MIN: f64 = 1.0;
pub const DEFAULT_HTTP_RETRY_WAIT_MAX: f64 = 30.0;

const REGION_PLACEHOLDER: &str = "{{.Region}}";

/// Resolved provider configuration
///
/// Constructed once at provider initialization and shared read-only by
/// every resource callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    token: Option<String>,
    pub api_endpoint: String,
    pub spaces_endpoint: String,
    pub spaces_access_id: Option<String>,
    pub spaces_secret_key: Option<String>,
    /// Client-side request rate; `0.0` disables limiting
    pub requests_per_second: f64,
    pub http_retry_max: u32,
    pub http_retry_wait_min: Duration,
    pub http_retry_wait_max: Duration,
}

impl Config {
    /// Build a configuration purely from the process environment
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::default().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The API token, or [`ConfigError::MissingToken`] when none was found
    pub fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ConfigError::MissingToken)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Render the Spaces endpoint for a region
    ///
    /// The `{{.Region}}` placeholder is replaced; an endpoint without the
    /// placeholder is returned unchanged.
    pub fn spaces_endpoint(&self, region: &str) -> String {
        self.spaces_endpoint.replace(REGION_PLACEHOLDER, region)
    }

    pub fn has_spaces_credentials(&self) -> bool {
        self.spaces_access_id.is_some() && self.spaces_secret_key.is_some()
    }
}

/// Explicit overrides layered on top of the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    token: Option<String>,
    api_endpoint: Option<String>,
    spaces_endpoint: Option<String>,
    spaces_access_id: Option<String>,
    spaces_secret_key: Option<String>,
    requests_per_second: Option<f64>,
    http_retry_max: Option<u32>,
    http_retry_wait_min: Option<f64>,
    http_retry_wait_max: Option<f64>,
}

impl ConfigBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn api_endpoint(mut self, url: impl Into<String>) -> Self {
        self.api_endpoint = Some(url.into());
        self
    }

    pub fn spaces_endpoint(mut self, url: impl Into<String>) -> Self {
        self.spaces_endpoint = Some(url.into());
        self
    }

    pub fn spaces_credentials(
        mut self,
        access_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.spaces_access_id = Some(access_id.into());
        self.spaces_secret_key = Some(secret_key.into());
        self
    }

    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    pub fn http_retry_max(mut self, max: u32) -> Self {
        self.http_retry_max = Some(max);
        self
    }

    pub fn http_retry_wait(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.http_retry_wait_min = Some(min_secs);
        self.http_retry_wait_max = Some(max_secs);
        self
    }

    /// Resolve against the process environment
    pub fn build(self) -> Result<Config> {
        self.build_with(|name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary variable lookup
    pub fn build_with<F>(self, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = self
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| env(ENV_TOKEN))
            .or_else(|| env(ENV_ACCESS_TOKEN));

        let api_endpoint = self
            .api_endpoint
            .or_else(|| env(ENV_API_URL))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        validate_url(ENV_API_URL, &api_endpoint)?;

        let spaces_endpoint = self
            .spaces_endpoint
            .or_else(|| env(ENV_SPACES_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_SPACES_ENDPOINT.to_string());

        let requests_per_second = match self.requests_per_second {
            Some(v) => v,
            None => parse_env(&env, ENV_REQUESTS_PER_SECOND)?.unwrap_or(0.0),
        };
        if !(requests_per_second.is_finite() && requests_per_second >= 0.0) {
            return Err(invalid(
                ENV_REQUESTS_PER_SECOND,
                requests_per_second,
                "must be a non-negative number",
            ));
        }

        let http_retry_max = match self.http_retry_max {
            Some(v) => v,
            None => parse_env(&env, ENV_HTTP_RETRY_MAX)?.unwrap_or(DEFAULT_HTTP_RETRY_MAX),
        };

        let wait_min = match self.http_retry_wait_min {
            Some(v) => v,
            None => {
                parse_env(&env, ENV_HTTP_RETRY_WAIT_MIN)?.unwrap_or(DEFAULT_HTTP_RETRY_WAIT_MIN)
            }
        };
        let wait_max = match self.http_retry_wait_max {
            Some(v) => v,
            None => {
                parse_env(&env, ENV_HTTP_RETRY_WAIT_MAX)?.unwrap_or(DEFAULT_HTTP_RETRY_WAIT_MAX)
            }
        };
        let http_retry_wait_min = seconds(ENV_HTTP_RETRY_WAIT_MIN, wait_min)?;
        let http_retry_wait_max = seconds(ENV_HTTP_RETRY_WAIT_MAX, wait_max)?;
        if http_retry_wait_min > http_retry_wait_max {
            return Err(invalid(
                ENV_HTTP_RETRY_WAIT_MIN,
                wait_min,
                "must not exceed the maximum retry wait",
            ));
        }

        let config = Config {
            token,
            api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
            spaces_endpoint,
            spaces_access_id: self.spaces_access_id.or_else(|| env(ENV_SPACES_ACCESS_KEY_ID)),
            spaces_secret_key: self
                .spaces_secret_key
                .or_else(|| env(ENV_SPACES_SECRET_ACCESS_KEY)),
            requests_per_second,
            http_retry_max,
            http_retry_wait_min,
            http_retry_wait_max,
        };

        tracing::debug!(
            api_endpoint = %config.api_endpoint,
            requests_per_second = config.requests_per_second,
            http_retry_max = config.http_retry_max,
            "resolved provider configuration"
        );
        Ok(config)
    }
}

fn parse_env<T, F>(env: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, &raw, e)),
    }
}

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(name, secs, e))
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            name: name.to_string(),
            url: url.to_string(),
        })
    }
}

fn invalid(name: &str, value: impl ToString, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().build_with(lookup(&[])).unwrap();

        assert!(!config.has_token());
        assert_eq!(config.token(), Err(ConfigError::MissingToken));
        assert_eq!(config.api_endpoint, DEFAULT_API_URL);
        assert_eq!(config.spaces_endpoint, DEFAULT_SPACES_ENDPOINT);
        assert_eq!(config.requests_per_second, 0.0);
        assert_eq!(config.http_retry_max, 4);
        assert_eq!(config.http_retry_wait_min, Duration::from_secs(1));
        assert_eq!(config.http_retry_wait_max, Duration::from_secs(30));
    }

    #[test]
    fn test_token_precedence() {
        let config = Config::builder()
            .build_with(lookup(&[
                (ENV_TOKEN, "primary"),
                (ENV_ACCESS_TOKEN, "secondary"),
            ]))
            .unwrap();
        assert_eq!(config.token().unwrap(), "primary");

        let config = Config::builder()
            .build_with(lookup(&[(ENV_TOKEN, ""), (ENV_ACCESS_TOKEN, "secondary")]))
            .unwrap();
        assert_eq!(config.token().unwrap(), "secondary");

        let config = Config::builder()
            .token("explicit")
            .build_with(lookup(&[(ENV_TOKEN, "primary")]))
            .unwrap();
        assert_eq!(config.token().unwrap(), "explicit");
    }

    #[test]
    fn test_numeric_settings_from_env() {
        let config = Config::builder()
            .build_with(lookup(&[
                (ENV_REQUESTS_PER_SECOND, "2.5"),
                (ENV_HTTP_RETRY_MAX, "7"),
                (ENV_HTTP_RETRY_WAIT_MIN, "0.5"),
                (ENV_HTTP_RETRY_WAIT_MAX, "10"),
            ]))
            .unwrap();

        assert_eq!(config.requests_per_second, 2.5);
        assert_eq!(config.http_retry_max, 7);
        assert_eq!(config.http_retry_wait_min, Duration::from_millis(500));
        assert_eq!(config.http_retry_wait_max, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_numeric_value() {
        let err = Config::builder()
            .build_with(lookup(&[(ENV_HTTP_RETRY_MAX, "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref name, .. } if name == ENV_HTTP_RETRY_MAX));

        let err = Config::builder()
            .build_with(lookup(&[(ENV_REQUESTS_PER_SECOND, "-1")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_wait_bounds_must_be_ordered() {
        let err = Config::builder()
            .http_retry_wait(5.0, 1.0)
            .build_with(lookup(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_api_url_validation_and_trailing_slash() {
        let err = Config::builder()
            .build_with(lookup(&[(ENV_API_URL, "api.example.com")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let config = Config::builder()
            .api_endpoint("http://localhost:8080/")
            .build_with(lookup(&[]))
            .unwrap();
        assert_eq!(config.api_endpoint, "http://localhost:8080");
    }

    #[test]
    fn test_spaces_endpoint_rendering() {
        let config = Config::builder().build_with(lookup(&[])).unwrap();
        assert_eq!(
            config.spaces_endpoint("nyc3"),
            "https://nyc3.digitaloceanspaces.com"
        );

        let config = Config::builder()
            .spaces_endpoint("https://spaces.internal")
            .build_with(lookup(&[]))
            .unwrap();
        assert_eq!(config.spaces_endpoint("ams3"), "https://spaces.internal");
    }

    #[test]
    #[serial]
    fn test_from_process_env() {
        temp_env::with_vars(
            [
                (ENV_TOKEN, None),
                (ENV_ACCESS_TOKEN, Some("from-env")),
                (ENV_SPACES_ACCESS_KEY_ID, Some("key")),
                (ENV_SPACES_SECRET_ACCESS_KEY, Some("secret")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.token().unwrap(), "from-env");
                assert!(config.has_spaces_credentials());
            },
        );
    }
}
