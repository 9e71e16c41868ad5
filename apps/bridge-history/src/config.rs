use std::fmt::Display;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use nonzero_ext::nonzero;

use crate::error::{HistoryError, Result};
use crate::history::HistorySettings;
use crate::indexer::RetryPolicy;
use crate::pagination::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone)]
pub struct Config {
    pub l1_rpc_url: String,
    pub l2_rpc_url: String,
    pub l1_indexer_url: String,
    pub l2_indexer_url: String,
    pub server_port: u16,
    pub page_size: u32,
    pub resolution_concurrency: usize,
    pub indexer_retry_count: u32,
    pub indexer_retry_interval_ms: u64,
    pub rpc_requests_per_second: NonZeroU32,
    pub indexer_requests_per_second: NonZeroU32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| HistoryError::Config(format!("{name} is required")))
        };

        let page_size: u32 = parse_or(&lookup, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(HistoryError::Config("Invalid PAGE_SIZE: must be positive".into()));
        }

        let resolution_concurrency: usize = parse_or(&lookup, "RESOLUTION_CONCURRENCY", 8)?;
        if resolution_concurrency == 0 {
            return Err(HistoryError::Config(
                "Invalid RESOLUTION_CONCURRENCY: must be positive".into(),
            ));
        }

        Ok(Self {
            l1_rpc_url: required("L1_RPC_URL")?,
            l2_rpc_url: required("L2_RPC_URL")?,
            l1_indexer_url: required("L1_INDEXER_URL")?,
            l2_indexer_url: required("L2_INDEXER_URL")?,
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            page_size,
            resolution_concurrency,
            indexer_retry_count: parse_or(&lookup, "INDEXER_RETRY_COUNT", 2)?,
            indexer_retry_interval_ms: parse_or(&lookup, "INDEXER_RETRY_INTERVAL_MS", 1000)?,
            rpc_requests_per_second: parse_or(&lookup, "RPC_REQUESTS_PER_SECOND", nonzero!(25u32))?,
            indexer_requests_per_second: parse_or(
                &lookup,
                "INDEXER_REQUESTS_PER_SECOND",
                nonzero!(10u32),
            )?,
        })
    }

    pub fn history_settings(&self) -> HistorySettings {
        HistorySettings {
            page_size: self.page_size,
            resolution_concurrency: self.resolution_concurrency,
            retry: RetryPolicy {
                retries: self.indexer_retry_count,
                interval: Duration::from_millis(self.indexer_retry_interval_ms),
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| HistoryError::Config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("L1_RPC_URL", "http://l1.local"),
            ("L2_RPC_URL", "http://l2.local"),
            ("L1_INDEXER_URL", "http://l1-subgraph.local"),
            ("L2_INDEXER_URL", "http://l2-subgraph.local"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&vars(&[])).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.rpc_requests_per_second.get(), 25);
        assert_eq!(config.indexer_requests_per_second.get(), 10);
        assert_eq!(config.history_settings(), HistorySettings::default());
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars = vars(&[]);
        vars.remove("L2_INDEXER_URL");
        let err = load(&vars).unwrap_err();
        assert_eq!(err.to_string(), "config error: L2_INDEXER_URL is required");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(load(&vars(&[("SERVER_PORT", "http")])).is_err());
        assert!(load(&vars(&[("PAGE_SIZE", "0")])).is_err());
        assert!(load(&vars(&[("RPC_REQUESTS_PER_SECOND", "0")])).is_err());

        let config = load(&vars(&[("INDEXER_RETRY_COUNT", " 5 ")])).unwrap();
        assert_eq!(config.history_settings().retry.retries, 5);
    }
}
