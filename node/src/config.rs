// concord/node/src/config.rs

use concord_core::ConsensusConfig;
use concord_p2p::{DiscoveryConfig, NetworkConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("node address must not be empty")]
    EmptyAddress,
}

/// The `[node]` table.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NodeSection {
    /// The producer identity this node signs blocks as.
    pub address: String,
    pub producer_interval_ms: u64,
    pub allow_empty_blocks: bool,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            address: "node-1".to_string(),
            producer_interval_ms: 4_000,
            allow_empty_blocks: false,
        }
    }
}

impl NodeSection {
    pub fn producer_interval(&self) -> Duration {
        Duration::from_millis(self.producer_interval_ms.max(1))
    }
}

// This struct maps directly to the structure of the TOML file.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub node: NodeSection,
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub consensus: ConsensusConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.node.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::consensus::{LeaderSelection, StakeEntry};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.consensus, ConsensusConfig::ProofOfWork { difficulty: 3 });
    }

    #[test]
    fn full_file_is_parsed() {
        let file = write_config(
            r#"
            [node]
            address = "alice"
            producer_interval_ms = 1000
            allow_empty_blocks = true

            [network]
            listen_address = "0.0.0.0:9000"
            bootstrap_nodes = ["10.0.0.2:9000"]

            [discovery]
            enabled = true
            port = 6100

            [consensus]
            kind = "proof-of-stake"
            selection = "local-draw"
            stakes = [{ address = "alice", stake = 40 }, { address = "bob", stake = 60 }]
            "#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.node.address, "alice");
        assert_eq!(config.node.producer_interval(), Duration::from_secs(1));
        assert!(config.node.allow_empty_blocks);
        assert_eq!(config.network.bootstrap_nodes, vec!["10.0.0.2:9000".to_string()]);
        assert_eq!(config.network.max_frame_bytes, NetworkConfig::default().max_frame_bytes);
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.broadcast_address, "255.255.255.255");
        assert_eq!(
            config.consensus,
            ConsensusConfig::ProofOfStake {
                selection: LeaderSelection::LocalDraw,
                stakes: vec![
                    StakeEntry { address: "alice".into(), stake: 40 },
                    StakeEntry { address: "bob".into(), stake: 60 },
                ],
            }
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_consensus_kind_is_a_parse_error() {
        let file = write_config("[consensus]\nkind = \"proof-of-luck\"\n");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn blank_address_is_refused() {
        let file = write_config("[node]\naddress = \"  \"\n");
        assert!(matches!(Config::load(file.path()), Err(ConfigError::EmptyAddress)));
    }
}
