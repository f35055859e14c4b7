//! Client configuration
//!
//! # Example
//! ```rust,ignore
//! use docbridge_mongodb::ClientConfig;
//!
//! // From environment
//! let config = ClientConfig::from_env()?;
//!
//! // Or explicit configuration
//! let config = ClientConfig::new("mongodb://localhost:27017", "shop")
//!     .with_timeout(Duration::from_secs(60));
//! ```

use docbridge_common::{Error, ErrorKind, Result};
use std::time::Duration;

/// Connection string used when `MONGODB_URI` is not set
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Per-operation timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters shared by every operation of a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Connection string, e.g. `mongodb://host:port`
    pub uri: String,
    /// Database every operation works against
    pub database: String,
    /// Deadline applied to each round trip with the server (default: 10s)
    pub timeout: Duration,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl ClientConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            timeout: DEFAULT_TIMEOUT,
            app_name: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Create configuration from environment variables.
    ///
    /// - `MONGODB_URI` (default `mongodb://localhost:27017`)
    /// - `MONGODB_DATABASE` (required)
    /// - `MONGODB_TIMEOUT_SECS` (optional, whole seconds)
    /// - `MONGODB_APP_NAME` (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let uri = lookup("MONGODB_URI").unwrap_or_else(|| DEFAULT_URI.to_string());
        let database = lookup("MONGODB_DATABASE").ok_or_else(|| {
            Error::message(ErrorKind::Configuration, "MONGODB_DATABASE is not set")
        })?;

        let mut config = Self::new(uri, database);

        if let Some(raw) = lookup("MONGODB_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::message(
                    ErrorKind::Configuration,
                    format!("MONGODB_TIMEOUT_SECS must be a whole number of seconds, got '{}'", raw),
                )
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(app_name) = lookup("MONGODB_APP_NAME") {
            config.app_name = Some(app_name);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before it is used to dial
    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::message(
                ErrorKind::Configuration,
                "connection string cannot be empty",
            ));
        }
        if self.database.is_empty() {
            return Err(Error::message(
                ErrorKind::Configuration,
                "database name cannot be empty",
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::message(
                ErrorKind::Configuration,
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_new_uses_default_timeout() {
        let config = ClientConfig::new("mongodb://localhost:27017", "test_client");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.app_name, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new("mongodb://db:27017", "shop")
            .with_timeout(Duration::from_secs(60))
            .with_app_name("inventory");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.app_name.as_deref(), Some("inventory"));
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config =
            ClientConfig::from_lookup(lookup_from(&[("MONGODB_DATABASE", "shop")])).unwrap();
        assert_eq!(config.uri, DEFAULT_URI);
        assert_eq!(config.database, "shop");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_all_vars() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://mongo:27017"),
            ("MONGODB_DATABASE", "orders"),
            ("MONGODB_TIMEOUT_SECS", " 30 "),
            ("MONGODB_APP_NAME", "billing"),
        ]))
        .unwrap();
        assert_eq!(config.uri, "mongodb://mongo:27017");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.app_name.as_deref(), Some("billing"));
    }

    #[test]
    fn test_from_lookup_missing_database() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_lookup_bad_timeout() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("MONGODB_DATABASE", "orders"),
            ("MONGODB_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ClientConfig::new(DEFAULT_URI, "shop").with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let err = ClientConfig::from_lookup(lookup_from(&[
            ("MONGODB_DATABASE", "orders"),
            ("MONGODB_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
