use std::collections::HashMap;
use thiserror::Error;

/// Matcher timeouts and sweep cadence, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Window to accept out-of-order wins before treating them as orphans,
    /// and the deadline for parked early-win entries.
    pub loss_timeout_ms: i64,
    /// Retention of WIN entries in the finished map.
    pub win_timeout_ms: i64,
    /// Retention of LOSS entries in the finished map.
    pub auction_timeout_ms: i64,
    /// Cadence at which the host runs the expiry sweep.
    pub sweep_interval_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            loss_timeout_ms: 15_000,
            win_timeout_ms: 3_600_000,
            auction_timeout_ms: 3_600_000,
            sweep_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            loss_timeout_ms: parse_ms(&env_map, "LOSS_TIMEOUT_MS", defaults.loss_timeout_ms)?,
            win_timeout_ms: parse_ms(&env_map, "WIN_TIMEOUT_MS", defaults.win_timeout_ms)?,
            auction_timeout_ms: parse_ms(
                &env_map,
                "AUCTION_TIMEOUT_MS",
                defaults.auction_timeout_ms,
            )?,
            sweep_interval_ms: parse_ms(
                &env_map,
                "SWEEP_INTERVAL_MS",
                defaults.sweep_interval_ms,
            )?,
        })
    }
}

fn parse_ms(
    env_map: &HashMap<String, String>,
    name: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let Some(raw) = env_map.get(name) else {
        return Ok(default);
    };
    let value = raw.parse::<i64>().map_err(|_| {
        ConfigError::InvalidValue(name.to_string(), "must be a valid i64".to_string())
    })?;
    if value <= 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be positive".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.loss_timeout_ms, 15_000);
        assert_eq!(config.win_timeout_ms, 3_600_000);
        assert_eq!(config.auction_timeout_ms, 3_600_000);
        assert_eq!(config.sweep_interval_ms, 1_000);
    }

    #[test]
    fn test_overrides_from_env() {
        let mut env_map = HashMap::new();
        env_map.insert("LOSS_TIMEOUT_MS".to_string(), "5000".to_string());
        env_map.insert("SWEEP_INTERVAL_MS".to_string(), "250".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.loss_timeout_ms, 5_000);
        assert_eq!(config.sweep_interval_ms, 250);
        assert_eq!(config.win_timeout_ms, 3_600_000);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut env_map = HashMap::new();
        env_map.insert("WIN_TIMEOUT_MS".to_string(), "not_a_number".to_string());

        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WIN_TIMEOUT_MS"),
            other => panic!("Expected InvalidValue error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_timeout_is_rejected() {
        let mut env_map = HashMap::new();
        env_map.insert("AUCTION_TIMEOUT_MS".to_string(), "0".to_string());

        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "AUCTION_TIMEOUT_MS"),
            other => panic!("Expected InvalidValue error, got {:?}", other),
        }
    }
}
