//! CLI configuration from environment.

use skynet_core::AirspaceLimits;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_SAVE_FILE: &str = "skynet_save.txt";
pub const DEFAULT_LOG_FILE: &str = "skynet_logs.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub save_file: PathBuf,
    pub log_file: PathBuf,
    pub limits: AirspaceLimits,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AirspaceLimits::default();
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(default)
        };

        Self {
            save_file: lookup("SKYNET_SAVE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_FILE)),
            log_file: lookup("SKYNET_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            limits: AirspaceLimits {
                node_capacity: number("SKYNET_NODE_CAPACITY", defaults.node_capacity),
                queue_capacity: number("SKYNET_QUEUE_CAPACITY", defaults.queue_capacity),
                registry_buckets: number("SKYNET_REGISTRY_BUCKETS", defaults.registry_buckets),
                ..defaults
            },
        }
    }
}
