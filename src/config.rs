use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// `RUST_LOG` directives, e.g. `info,sqlx=warn`.
    pub log_filter: String,
    pub max_connections: u32,
}

impl Config {
    /// Reads `DATABASE_URL`, `RUST_LOG` and `DATABASE_MAX_CONNECTIONS`,
    /// loading a `.env` file first outside of tests.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());
        if let Err(err) = EnvFilter::try_new(&log_filter) {
            return Err(ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid filter: {}", log_filter, err),
            ));
        }

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DATABASE_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", value),
                )
            })?,
            None => 5,
        };

        Ok(Self {
            database_url,
            log_filter,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/erp")])).unwrap();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn accepts_per_target_directives() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("RUST_LOG", "info,sqlx=warn"),
        ]))
        .unwrap();
        assert_eq!(config.log_filter, "info,sqlx=warn");
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref var) if var == "DATABASE_URL"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(ref var, _) if var == "DATABASE_MAX_CONNECTIONS"
        ));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("RUST_LOG", "sqlx=chatty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "RUST_LOG"));
    }
}
