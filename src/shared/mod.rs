use std::env;

use derivative::Derivative;
use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{BufError, Result};

pub type FrameId = isize;
pub type PageId = isize;

pub const BUFFER_POOL_SIZE: usize = 50;
pub const DEFAULT_BUCKET_SIZE: usize = 4;
pub const DEFAULT_REPLACER_K: usize = 2;
pub const INVALID_FRAME_ID: FrameId = -1;
pub const INVALID_PAGE_ID: PageId = -1;

const BUCKET_SIZE_VAR: &str = "BUFCORE_BUCKET_SIZE";
const POOL_SIZE_VAR: &str = "BUFCORE_POOL_SIZE";
const REPLACER_K_VAR: &str = "BUFCORE_REPLACER_K";

lazy_static! {
    /// Process-wide configuration, read from the environment on first use.
    /// Falls back to the defaults if any variable fails to parse or validate.
    pub static ref CONFIG: Config = Config::from_env().unwrap_or_else(|err| {
        warn!("ignoring environment configuration: {}", err);
        Config::default()
    });
}

/// Sizing parameters for the page table and the replacer.
#[derive(Serialize, Deserialize, Derivative, Debug, Clone, Copy, PartialEq, Eq)]
#[derivative(Default)]
#[serde(default)]
pub struct Config {
    /// Entries per hash bucket before it has to split.
    #[derivative(Default(value = "DEFAULT_BUCKET_SIZE"))]
    pub bucket_size: usize,
    /// Number of frames the replacer accepts ids for.
    #[derivative(Default(value = "BUFFER_POOL_SIZE"))]
    pub pool_size: usize,
    /// History window of the LRU-K replacer.
    #[derivative(Default(value = "DEFAULT_REPLACER_K"))]
    pub replacer_k: usize,
}

impl Config {
    /// Defaults overlaid with `BUFCORE_BUCKET_SIZE`, `BUFCORE_POOL_SIZE` and
    /// `BUFCORE_REPLACER_K` where set.
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.bucket_size = parse_override(&lookup, BUCKET_SIZE_VAR, config.bucket_size)?;
        config.pool_size = parse_override(&lookup, POOL_SIZE_VAR, config.pool_size)?;
        config.replacer_k = parse_override(&lookup, REPLACER_K_VAR, config.replacer_k)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket_size == 0 {
            return Err(BufError::InvalidConfig("bucket_size must be positive".into()));
        }
        if self.replacer_k == 0 {
            return Err(BufError::InvalidConfig("replacer_k must be positive".into()));
        }
        Ok(())
    }
}

fn parse_override<F>(lookup: &F, name: &str, current: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(current),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|err| BufError::InvalidConfig(format!("{}={:?}: {}", name, raw, err))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bucket_size, DEFAULT_BUCKET_SIZE);
        assert_eq!(config.pool_size, BUFFER_POOL_SIZE);
        assert_eq!(config.replacer_k, DEFAULT_REPLACER_K);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let config =
            Config::from_lookup(lookup_in(&[(BUCKET_SIZE_VAR, "16"), (REPLACER_K_VAR, " 3 ")]))
                .unwrap();
        assert_eq!(config.bucket_size, 16);
        assert_eq!(config.pool_size, BUFFER_POOL_SIZE);
        assert_eq!(config.replacer_k, 3);
    }

    #[test]
    fn rejects_garbage_and_zero() {
        let err = Config::from_lookup(lookup_in(&[(POOL_SIZE_VAR, "lots")])).unwrap_err();
        assert!(matches!(err, BufError::InvalidConfig(msg) if msg.contains(POOL_SIZE_VAR)));

        let err = Config::from_lookup(lookup_in(&[(BUCKET_SIZE_VAR, "0")])).unwrap_err();
        assert!(matches!(err, BufError::InvalidConfig(_)));
    }

    #[test]
    fn encode_decode() {
        let config = Config {
            bucket_size: 32,
            pool_size: 128,
            replacer_k: 4,
        };
        let bytes = bincode::serialize(&config).unwrap();
        let decoded: Config = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"bucket_size": 16}"#).unwrap();
        assert_eq!(config.bucket_size, 16);
        assert_eq!(config.pool_size, BUFFER_POOL_SIZE);
        assert_eq!(config.replacer_k, DEFAULT_REPLACER_K);

        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn global_config_is_valid() {
        assert!(CONFIG.validate().is_ok());
    }
}
