use std::env;

use anyhow::{Context, Result};

use crate::schemas::TripInfo;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE: &str = "TripBoard";
const DEFAULT_WRITE_RETRIES: usize = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub bind: String,
    /// Without a URI trips only live in memory.
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub cors_origin: Option<String>,
    pub write_retries: usize,
    pub trip: TripInfo,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let write_retries = match var("TRIPBOARD_WRITE_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("TRIPBOARD_WRITE_RETRIES must be a number, got {raw:?}"))?,
            None => DEFAULT_WRITE_RETRIES,
        };

        Ok(Config {
            bind: var("TRIPBOARD_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            mongodb_uri: var("MONGODB_URI"),
            database: var("TRIPBOARD_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            cors_origin: var("TRIPBOARD_CORS_ORIGIN"),
            write_retries,
            trip: TripInfo {
                name: var("TRIP_NAME").unwrap_or_else(|| "Our trip".to_string()),
                destination: var("TRIP_DESTINATION").unwrap_or_default(),
                dates: var("TRIP_DATES").unwrap_or_default(),
                group_name: var("TRIP_GROUP").unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.mongodb_uri, None);
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(config.write_retries, DEFAULT_WRITE_RETRIES);
        assert_eq!(config.trip.name, "Our trip");
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("TRIPBOARD_BIND", "127.0.0.1:9000"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("TRIPBOARD_DATABASE", "Trips"),
            ("TRIPBOARD_CORS_ORIGIN", "http://localhost:3000"),
            ("TRIPBOARD_WRITE_RETRIES", "5"),
            ("TRIP_NAME", "Sweet thirties"),
            ("TRIP_DESTINATION", "Malaysia"),
            ("TRIP_DATES", "03/07 - 16/07"),
            ("TRIP_GROUP", "Riverland"),
        ])
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.mongodb_uri.as_deref(), Some("mongodb://localhost:27017"));
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.write_retries, 5);
        assert_eq!(config.trip.destination, "Malaysia");
        assert_eq!(config.trip.group_name, "Riverland");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("MONGODB_URI", "  ")]).unwrap();
        assert_eq!(config.mongodb_uri, None);
    }

    #[test]
    fn bad_retry_count_is_an_error() {
        let err = config_from(&[("TRIPBOARD_WRITE_RETRIES", "many")]).unwrap_err();
        assert!(err.to_string().contains("TRIPBOARD_WRITE_RETRIES"));
    }
}
