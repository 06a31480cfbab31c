use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{config_error, Error};
use crate::matching::{DynMatchingPolicy, FareBidding, RandomAssignment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Simulate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Matching {
    FareBidding,
    RandomAssignment(RandomAssignment),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub matching: Matching,
    pub simulation_drivers: usize,
    pub simulation_customers: usize,
    pub simulation_rounds: usize,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, Error> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| config_error(format!("{} has an invalid value {:?}", key, value))),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mode = match lookup("TEMPOGO_MODE").as_deref().map(str::trim) {
            None | Some("serve") => Mode::Serve,
            Some("simulate") => Mode::Simulate,
            Some(other) => return Err(config_error(format!("unknown TEMPOGO_MODE {:?}", other))),
        };

        let matching = match lookup("MATCHING_POLICY").as_deref().map(str::trim) {
            None | Some("fare_bidding") => Matching::FareBidding,
            Some("random") => {
                let min_fare = parse_or(&lookup, "RANDOM_MIN_FARE", 300.0)?;
                let max_fare = parse_or(&lookup, "RANDOM_MAX_FARE", 1000.0)?;

                Matching::RandomAssignment(RandomAssignment::new(min_fare, max_fare)?)
            }
            Some(other) => {
                return Err(config_error(format!("unknown MATCHING_POLICY {:?}", other)))
            }
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            host: lookup("TEMPOGO_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: parse_or(&lookup, "TEMPOGO_PORT", 3000)?,
            mode,
            matching,
            simulation_drivers: parse_or(&lookup, "SIMULATION_DRIVERS", 4)?,
            simulation_customers: parse_or(&lookup, "SIMULATION_CUSTOMERS", 8)?,
            simulation_rounds: parse_or(&lookup, "SIMULATION_ROUNDS", 20)?,
        })
    }

    pub fn server_addr(&self) -> Result<SocketAddr, Error> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(config_error)
    }

    pub fn matching_policy(&self) -> DynMatchingPolicy {
        match self.matching {
            Matching::FareBidding => Box::new(FareBidding),
            Matching::RandomAssignment(policy) => Box::new(policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_serve_from_memory_with_fare_bidding() {
        let config = config(&[]).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.mode, Mode::Serve);
        assert_eq!(config.matching, Matching::FareBidding);
        assert_eq!(config.server_addr().unwrap().port(), 3000);
        assert_eq!(config.matching_policy().name(), "fare_bidding");
    }

    #[test]
    fn random_policy_reads_fare_bounds() {
        let config = config(&[
            ("MATCHING_POLICY", "random"),
            ("RANDOM_MIN_FARE", "100"),
            ("RANDOM_MAX_FARE", "200"),
        ])
        .unwrap();

        assert_eq!(
            config.matching,
            Matching::RandomAssignment(RandomAssignment::new(100.0, 200.0).unwrap())
        );
        assert_eq!(config.matching_policy().name(), "random_assignment");
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = config(&[("TEMPOGO_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Config);

        assert!(config(&[("TEMPOGO_MODE", "batch")]).is_err());
        assert!(config(&[
            ("MATCHING_POLICY", "random"),
            ("RANDOM_MIN_FARE", "900"),
            ("RANDOM_MAX_FARE", "100"),
        ])
        .is_err());
    }

    #[test]
    fn blank_database_url_means_memory() {
        let config = config(&[("DATABASE_URL", "  "), ("TEMPOGO_MODE", "simulate")]).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.mode, Mode::Simulate);
    }

    #[test]
    fn random_policy_refuses_unusable_fare_bounds() {
        for (min, max) in [("300", "inf"), ("NaN", "900"), ("300.5", "300.7")] {
            let err = config(&[
                ("MATCHING_POLICY", "random"),
                ("RANDOM_MIN_FARE", min),
                ("RANDOM_MAX_FARE", max),
            ])
            .unwrap_err();

            assert_eq!(err.kind, crate::error::ErrorKind::Config, "{} {}", min, max);
        }
    }
}
