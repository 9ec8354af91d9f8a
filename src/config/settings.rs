use crate::error::{NoobcashError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

static DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
static DEFAULT_BOOTSTRAP_ADDR: &str = "127.0.0.1:5000";

const LISTEN_ADDRESS_KEY: &str = "NOOBCASH_LISTEN";
const BOOTSTRAP_ADDRESS_KEY: &str = "NOOBCASH_BOOTSTRAP";

/// Consensus parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Leading zero characters required in a block hash
    pub difficulty: usize,
    /// Transactions per block
    pub capacity: usize,
    /// Expected size of the ring, bootstrap included
    pub nodes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            difficulty: 4,
            capacity: 5,
            nodes: 5,
        }
    }
}

impl NodeConfig {
    pub fn new(difficulty: usize, capacity: usize, nodes: usize) -> Result<NodeConfig> {
        let config = NodeConfig {
            difficulty,
            capacity,
            nodes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(NoobcashError::Config(
                "block capacity must be at least 1".to_string(),
            ));
        }
        if self.nodes == 0 {
            return Err(NoobcashError::Config(
                "node count must be at least 1".to_string(),
            ));
        }
        // a SHA-256 hex digest only has 64 characters
        if self.difficulty > 64 {
            return Err(NoobcashError::Config(format!(
                "difficulty {} can never be met",
                self.difficulty
            )));
        }
        Ok(())
    }
}

/// Exponential backoff for peer calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 3_000,
            timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything a node process needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen: String,
    pub bootstrap_address: String,
    pub is_bootstrap: bool,
    pub max_connections: usize,
    #[serde(flatten)]
    pub node: NodeConfig,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen: String::from(DEFAULT_LISTEN_ADDR),
            bootstrap_address: String::from(DEFAULT_BOOTSTRAP_ADDR),
            is_bootstrap: false,
            max_connections: 64,
            node: NodeConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(LISTEN_ADDRESS_KEY) {
            self.listen = addr;
        }
        if let Ok(addr) = env::var(BOOTSTRAP_ADDRESS_KEY) {
            self.bootstrap_address = addr;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.node.validate()?;
        if self.max_connections == 0 {
            return Err(NoobcashError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        self.listen_parts().map(|_| ())
    }

    /// Split the listen address into the ip and port advertised in the ring.
    pub fn listen_parts(&self) -> Result<(String, u16)> {
        let (ip, port) = self
            .listen
            .rsplit_once(':')
            .ok_or_else(|| NoobcashError::Config(format!("Invalid listen address {}", self.listen)))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| NoobcashError::Config(format!("Invalid port in {}: {e}", self.listen)))?;
        Ok((ip.to_string(), port))
    }
}
