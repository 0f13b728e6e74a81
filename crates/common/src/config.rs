use std::{fs::File, net::SocketAddr, time::Duration};

use alloy_primitives::FixedBytes;
use clap::Parser;
use crucible_types::{keypair_from_hex, BlsKeypair};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{AlgoType, ConfigError, RelayEndpointConfig};

pub const DEFAULT_SUBMISSION_OFFSET_MS: i64 = 3_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Hex encoded BLS secret key used to sign bids.
    pub builder_secret_key: String,
    /// Hex encoded BLS secret key of the local relay.
    #[serde(default)]
    pub relay_secret_key: Option<String>,
    pub chain: ChainConfig,

    #[serde(default)]
    pub enable_local_relay: bool,
    #[serde(default)]
    pub enable_validator_checks: bool,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub remote_relay_endpoint: String,
    #[serde(default)]
    pub secondary_remote_relay_endpoints: Vec<String>,
    #[serde(default)]
    pub enable_cancellations: bool,
    #[serde(default = "default_relay_request_timeout_ms")]
    pub relay_request_timeout_ms: u64,

    #[serde(default)]
    pub beacon_endpoints: Vec<Url>,

    #[serde(default = "default_rate_limit_duration_ms")]
    pub rate_limit_duration_ms: u64,
    #[serde(default = "default_rate_limit_max_burst")]
    pub rate_limit_max_burst: u32,
    /// Time reserved before the end of the slot, signed so bad values can be reported.
    #[serde(default)]
    pub submission_offset_ms: Option<i64>,

    #[serde(default = "default_algo_type")]
    pub algo_type: String,
    #[serde(default)]
    pub competing_algo_types: Vec<String>,
    #[serde(default = "default_price_cutoff_percent")]
    pub price_cutoff_percent: u64,
    #[serde(default = "default_max_merged_bundles")]
    pub max_merged_bundles: usize,
    #[serde(default = "default_multi_snap_workers")]
    pub multi_snap_workers: usize,
    #[serde(default)]
    pub discard_revertible_tx_on_err: bool,
    #[serde(default = "default_gas_ceil")]
    pub gas_ceil: u64,

    #[serde(default)]
    pub dry_run: bool,

    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub peer_builder: Option<PeerBuilderConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BuilderConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let start_config = StartConfig::parse();
        Self::from_file(&start_config.config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: BuilderConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// Checks every option that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.seconds_in_slot == 0 {
            return Err(ConfigError::ZeroSecondsInSlot);
        }

        self.builder_keypair()?;
        if self.enable_local_relay {
            self.relay_keypair()?;
        }

        if self.remote_relay_endpoint.is_empty() && !self.enable_local_relay {
            return Err(ConfigError::NoRelay);
        }
        self.remote_relay()?;
        self.secondary_relays()?;

        self.submission_offset()?;
        self.rate_limit_interval()?;
        if self.rate_limit_max_burst == 0 {
            return Err(ConfigError::ZeroRateLimitBurst);
        }
        self.algorithms()?;

        if self.price_cutoff_percent > 100 {
            return Err(ConfigError::PriceCutoffOutOfRange(self.price_cutoff_percent));
        }
        if self.multi_snap_workers == 0 {
            return Err(ConfigError::ZeroMultiSnapWorkers);
        }

        Ok(())
    }

    pub fn builder_keypair(&self) -> Result<BlsKeypair, ConfigError> {
        keypair_from_hex(&self.builder_secret_key).map_err(ConfigError::InvalidBuilderKey)
    }

    pub fn relay_keypair(&self) -> Result<BlsKeypair, ConfigError> {
        let key = self.relay_secret_key.as_deref().ok_or(ConfigError::MissingRelayKey)?;
        keypair_from_hex(key).map_err(ConfigError::InvalidRelayKey)
    }

    /// Parsed primary remote relay, `None` when no remote endpoint is configured.
    pub fn remote_relay(&self) -> Result<Option<RelayEndpointConfig>, ConfigError> {
        if self.remote_relay_endpoint.is_empty() {
            return Ok(None);
        }
        RelayEndpointConfig::parse(&self.remote_relay_endpoint).map(Some)
    }

    /// Parsed secondary relays. A single empty entry is treated as no secondaries.
    pub fn secondary_relays(&self) -> Result<Vec<RelayEndpointConfig>, ConfigError> {
        match self.secondary_remote_relay_endpoints.as_slice() {
            [] => Ok(Vec::new()),
            [single] if single.is_empty() => Ok(Vec::new()),
            endpoints => endpoints.iter().map(|e| RelayEndpointConfig::parse(e)).collect(),
        }
    }

    pub fn submission_offset(&self) -> Result<Duration, ConfigError> {
        let offset_ms = self.submission_offset_ms.unwrap_or(DEFAULT_SUBMISSION_OFFSET_MS);
        let max_ms = self.chain.seconds_in_slot.saturating_mul(1000);

        if offset_ms < 0 || offset_ms as u64 > max_ms {
            return Err(ConfigError::SubmissionOffsetOutOfRange { offset_ms, max_ms });
        }

        Ok(Duration::from_millis(offset_ms as u64))
    }

    pub fn rate_limit_interval(&self) -> Result<Duration, ConfigError> {
        if self.rate_limit_duration_ms == 0 {
            return Err(ConfigError::ZeroRateLimitDuration);
        }
        Ok(Duration::from_millis(self.rate_limit_duration_ms))
    }

    /// Primary algorithm followed by the deduplicated competing ones.
    pub fn algorithms(&self) -> Result<Vec<AlgoType>, ConfigError> {
        let mut algos = vec![self.algo_type.parse::<AlgoType>()?];
        for name in &self.competing_algo_types {
            let algo = name.parse::<AlgoType>()?;
            if !algos.contains(&algo) {
                algos.push(algo);
            }
        }
        Ok(algos)
    }

    pub fn relay_request_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub genesis_time: u64,
    #[serde(default = "default_seconds_in_slot")]
    pub seconds_in_slot: u64,
    #[serde(default)]
    pub genesis_fork_version: FixedBytes<4>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub url: Url,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerBuilderConfig {
    pub host: String,
    #[serde(default = "default_relay_request_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub enum LoggingConfig {
    #[default]
    Console,
    File {
        dir_path: String,
        file_name: String,
    },
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[clap(name = "crucible")]
pub struct StartConfig {
    #[clap(long, default_value = "config.yml")]
    pub config: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 28545))
}

fn default_relay_request_timeout_ms() -> u64 {
    2_000
}

fn default_rate_limit_duration_ms() -> u64 {
    500
}

fn default_rate_limit_max_burst() -> u32 {
    10
}

fn default_algo_type() -> String {
    AlgoType::MevGeth.to_string()
}

fn default_price_cutoff_percent() -> u64 {
    50
}

fn default_max_merged_bundles() -> usize {
    3
}

fn default_multi_snap_workers() -> usize {
    4
}

fn default_gas_ceil() -> u64 {
    30_000_000
}

fn default_seconds_in_slot() -> u64 {
    12
}

fn default_namespace() -> String {
    "builder".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;

    fn secret_key() -> String {
        hex::encode_prefixed(BlsKeypair::random().sk.serialize().as_bytes())
    }

    fn base_yaml() -> String {
        format!(
            r#"
builder_secret_key: "{}"
chain:
  genesis_time: 1606824023
remote_relay_endpoint: "http://relay.local;ssz=true"
simulator:
  url: "http://127.0.0.1:8545"
"#,
            secret_key()
        )
    }

    fn config() -> BuilderConfig {
        serde_yaml::from_str(&base_yaml()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.chain.seconds_in_slot, 12);
        assert_eq!(config.rate_limit_duration_ms, 500);
        assert_eq!(config.rate_limit_max_burst, 10);
        assert_eq!(config.price_cutoff_percent, 50);
        assert_eq!(config.max_merged_bundles, 3);
        assert_eq!(config.gas_ceil, 30_000_000);
        assert_eq!(config.simulator.namespace, "builder");
        assert_eq!(config.listen_addr.port(), 28545);
        assert!(matches!(config.logging, LoggingConfig::Console));
        assert_eq!(config.submission_offset().unwrap(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_submission_offset_bounds() {
        let mut config = config();

        for ok in [0, 1, 6_000, 12_000] {
            config.submission_offset_ms = Some(ok);
            assert_eq!(config.submission_offset().unwrap(), Duration::from_millis(ok as u64));
        }

        for bad in [-1, 12_001] {
            config.submission_offset_ms = Some(bad);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::SubmissionOffsetOutOfRange { offset_ms, max_ms: 12_000 }) if offset_ms == bad
            ));
        }
    }

    #[test]
    fn test_relay_requirements() {
        let mut config = config();
        config.remote_relay_endpoint.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoRelay)));

        config.enable_local_relay = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingRelayKey)));

        config.relay_secret_key = Some("0x1234".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRelayKey(_))));

        config.relay_secret_key = Some(secret_key());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_builder_key() {
        let mut config = config();
        config.builder_secret_key = "not hex".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBuilderKey(_))));
    }

    #[test]
    fn test_secondary_relays() {
        let mut config = config();
        config.secondary_remote_relay_endpoints = vec![String::new()];
        assert!(config.secondary_relays().unwrap().is_empty());

        config.secondary_remote_relay_endpoints =
            vec!["http://a;gzip=1".to_string(), "http://b".to_string()];
        let relays = config.secondary_relays().unwrap();
        assert_eq!(relays.len(), 2);
        assert!(relays[0].gzip_enabled);

        config.secondary_remote_relay_endpoints = vec!["http://a".to_string(), String::new()];
        assert!(matches!(config.secondary_relays(), Err(ConfigError::EmptyRelayEndpoint)));
    }

    #[test]
    fn test_algorithms() {
        let mut config = config();
        config.algo_type = "greedy".to_string();
        config.competing_algo_types =
            vec!["mev-geth".to_string(), "Greedy".to_string(), "greedy-buckets".to_string()];
        assert_eq!(
            config.algorithms().unwrap(),
            vec![AlgoType::Greedy, AlgoType::MevGeth, AlgoType::GreedyBuckets]
        );

        config.competing_algo_types = vec!["fastest".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::UnknownAlgorithm(name)) if name == "fastest"));
    }

    #[test]
    fn test_invalid_numbers() {
        let mut config = config();
        config.price_cutoff_percent = 101;
        assert!(matches!(config.validate(), Err(ConfigError::PriceCutoffOutOfRange(101))));

        let mut config = self::config();
        config.rate_limit_duration_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRateLimitDuration)));

        let mut config = self::config();
        config.rate_limit_max_burst = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRateLimitBurst)));

        let mut config = self::config();
        config.chain.seconds_in_slot = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroSecondsInSlot)));
    }

    #[test]
    fn test_file_logging_config() {
        let yaml = format!(
            "{}logging:\n  File:\n    dir_path: /tmp/logs\n    file_name: crucible\n",
            base_yaml()
        );
        let config: BuilderConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(config.logging, LoggingConfig::File { ref file_name, .. } if file_name == "crucible"));
    }
}
