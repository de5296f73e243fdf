//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Onboarding configuration.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Base URL of the remote account service.
    pub api_base_url: String,
    /// Path of the account-creation endpoint, appended to `api_base_url`.
    pub register_path: String,
    /// Request timeout for the account-creation call.
    pub http_timeout: Duration,
    /// Location of the local snapshot database.
    pub db_path: String,
    /// Clear snapshots left by an abandoned attempt when a new registration starts.
    pub clear_stale_on_start: bool,
    /// Treat missing profile fields as a reconcile failure.
    pub require_profile: bool,
    /// Port for the onboarding REST surface.
    pub http_port: u16,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            register_path: "/api/auth/register/".to_string(),
            http_timeout: Duration::from_secs(15),
            db_path: "./data/flexfit-onboarding.db".to_string(),
            clear_stale_on_start: true,
            require_profile: false,
            http_port: 8080,
        }
    }
}

impl OnboardingConfig {
    /// Build a config from `FLEXFIT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("FLEXFIT_API_URL").unwrap_or(defaults.api_base_url);
        if api_base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "FLEXFIT_API_URL".to_string(),
                hint: "Set it to the account service base URL".to_string(),
            });
        }
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "FLEXFIT_API_URL".to_string(),
                message: format!("expected an http(s) URL, got {api_base_url:?}"),
            });
        }

        let register_path = lookup("FLEXFIT_REGISTER_PATH").unwrap_or(defaults.register_path);
        let db_path = lookup("FLEXFIT_DB_PATH").unwrap_or(defaults.db_path);

        let http_timeout = match lookup("FLEXFIT_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_value("FLEXFIT_HTTP_TIMEOUT_SECS", &raw)?),
            None => defaults.http_timeout,
        };
        let clear_stale_on_start = match lookup("FLEXFIT_CLEAR_STALE") {
            Some(raw) => parse_bool("FLEXFIT_CLEAR_STALE", &raw)?,
            None => defaults.clear_stale_on_start,
        };
        let require_profile = match lookup("FLEXFIT_REQUIRE_PROFILE") {
            Some(raw) => parse_bool("FLEXFIT_REQUIRE_PROFILE", &raw)?,
            None => defaults.require_profile,
        };
        let http_port = match lookup("FLEXFIT_HTTP_PORT") {
            Some(raw) => parse_value("FLEXFIT_HTTP_PORT", &raw)?,
            None => defaults.http_port,
        };

        Ok(Self {
            api_base_url,
            register_path,
            http_timeout,
            db_path,
            clear_stale_on_start,
            require_profile,
            http_port,
        })
    }

    /// Full URL of the account-creation endpoint.
    pub fn register_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.register_path.trim_start_matches('/')
        )
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = OnboardingConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.clear_stale_on_start);
        assert!(!config.require_profile);
        assert_eq!(config.register_url(), "http://127.0.0.1:8000/api/auth/register/");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = OnboardingConfig::from_lookup(lookup_from(&[
            ("FLEXFIT_API_URL", "https://accounts.example.com/"),
            ("FLEXFIT_REGISTER_PATH", "v2/signup"),
            ("FLEXFIT_HTTP_TIMEOUT_SECS", "3"),
            ("FLEXFIT_CLEAR_STALE", "off"),
            ("FLEXFIT_REQUIRE_PROFILE", "yes"),
            ("FLEXFIT_HTTP_PORT", "9090"),
        ]))
        .unwrap();
        assert_eq!(config.register_url(), "https://accounts.example.com/v2/signup");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert!(!config.clear_stale_on_start);
        assert!(config.require_profile);
        assert_eq!(config.http_port, 9090);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = OnboardingConfig::from_lookup(lookup_from(&[("FLEXFIT_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "FLEXFIT_HTTP_TIMEOUT_SECS"));

        let err = OnboardingConfig::from_lookup(lookup_from(&[("FLEXFIT_API_URL", "ftp://nope")]))
            .unwrap_err();
        assert!(err.to_string().contains("FLEXFIT_API_URL"));

        let err = OnboardingConfig::from_lookup(lookup_from(&[("FLEXFIT_API_URL", " ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));

        assert!(
            OnboardingConfig::from_lookup(lookup_from(&[("FLEXFIT_CLEAR_STALE", "maybe")])).is_err()
        );
    }
}
