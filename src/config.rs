use std::str::FromStr;

use crate::error::ConfigError;
use crate::solver::SolverOptions;

pub const BIND_ENV: &str = "TIMETABLE_BIND";
pub const THREADS_ENV: &str = "TIMETABLE_SOLVER_THREADS";
pub const SOLVER_SEED_ENV: &str = "TIMETABLE_SOLVER_SEED";
pub const TIME_LIMIT_ENV: &str = "TIMETABLE_TIME_LIMIT_SECS";
pub const SOLVER_LOG_ENV: &str = "TIMETABLE_SOLVER_LOG";
pub const SEED_ENV: &str = "TIMETABLE_SEED";

/// Service settings. Every field has a default; the environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub solver: SolverOptions,
    /// Weekly-once seed used when a request does not carry one.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            solver: SolverOptions::default(),
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(addr) = lookup(BIND_ENV) {
            config.bind_addr = addr;
        }
        if let Some(threads) = parse(&lookup, THREADS_ENV)? {
            config.solver.threads = threads;
        }
        if let Some(seed) = parse(&lookup, SOLVER_SEED_ENV)? {
            config.solver.random_seed = seed;
        }
        config.solver.time_limit_secs = parse(&lookup, TIME_LIMIT_ENV)?;
        if let Some(log) = parse(&lookup, SOLVER_LOG_ENV)? {
            config.solver.log_to_console = log;
        }
        config.seed = parse(&lookup, SEED_ENV)?;
        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(config_from(&[]).unwrap(), Config::default());
    }

    #[test]
    fn environment_overrides() {
        let config = config_from(&[
            (BIND_ENV, "0.0.0.0:9000"),
            (THREADS_ENV, "4"),
            (TIME_LIMIT_ENV, "12.5"),
            (SOLVER_LOG_ENV, "true"),
            (SEED_ENV, "77"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.solver.threads, 4);
        assert_eq!(config.solver.random_seed, 1234);
        assert_eq!(config.solver.time_limit_secs, Some(12.5));
        assert!(config.solver.log_to_console);
        assert_eq!(config.seed, Some(77));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config_from(&[(THREADS_ENV, "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: THREADS_ENV,
                value: "many".to_string()
            }
        );
    }
}
