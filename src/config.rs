//! JSON configuration.
//!
//! One document describes both ends of a deployment: the client and server
//! node identities, the dispatch pacing, and the time source kind.
//!
//! ```json
//! {
//!   "client": { "nodeId": "asset-1" },
//!   "server": { "nodeId": "sim-server" },
//!   "delta_time_usec": 1000,
//!   "max_delay_usec": 500000,
//!   "time_source_type": "real"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Identity of one node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

fn default_time_source_type() -> String {
    "real".to_owned()
}

/// Deployment configuration shared by server and client.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub client: NodeConfig,
    pub server: NodeConfig,
    /// Pacing of the poll and conductor loops, in microseconds.
    pub delta_time_usec: i64,
    /// Default response timeout armed by the client; absent means no
    /// timeout.
    #[serde(default)]
    pub max_delay_usec: Option<i64>,
    /// "real" or "manual".
    #[serde(default = "default_time_source_type")]
    pub time_source_type: String,
    /// Optional path to a transport-specific service description.
    #[serde(default)]
    pub rpc_service_config_path: Option<PathBuf>,
}

impl RemoteConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.client.node_id.is_empty() {
            return Err(Error::Config("client.nodeId must not be empty".to_owned()));
        }
        if self.server.node_id.is_empty() {
            return Err(Error::Config("server.nodeId must not be empty".to_owned()));
        }
        if self.delta_time_usec <= 0 {
            return Err(Error::Config(format!(
                "delta_time_usec must be positive, got {}",
                self.delta_time_usec
            )));
        }
        if let Some(delay) = self.max_delay_usec {
            if delay <= 0 {
                return Err(Error::Config(format!(
                    "max_delay_usec must be positive, got {delay}"
                )));
            }
        }
        match self.time_source_type.as_str() {
            "real" | "manual" => Ok(()),
            other => Err(Error::Config(format!(
                "time_source_type must be \"real\" or \"manual\", got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "client": { "nodeId": "asset-1" },
        "server": { "nodeId": "sim-server" },
        "delta_time_usec": 1000
    }"#;

    #[test]
    fn minimal_document_fills_defaults() {
        let config = RemoteConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.client.node_id, "asset-1");
        assert_eq!(config.server.node_id, "sim-server");
        assert_eq!(config.delta_time_usec, 1000);
        assert_eq!(config.max_delay_usec, None);
        assert_eq!(config.time_source_type, "real");
        assert!(config.rpc_service_config_path.is_none());
    }

    #[test]
    fn full_document_parses() {
        let config = RemoteConfig::from_json(
            r#"{
                "client": { "nodeId": "asset-1" },
                "server": { "nodeId": "sim-server" },
                "delta_time_usec": 2000,
                "max_delay_usec": 500000,
                "time_source_type": "manual",
                "rpc_service_config_path": "services.json"
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_delay_usec, Some(500_000));
        assert_eq!(config.time_source_type, "manual");
    }

    #[test]
    fn nonpositive_delta_rejected_with_key() {
        let err = RemoteConfig::from_json(
            r#"{
                "client": { "nodeId": "asset-1" },
                "server": { "nodeId": "sim-server" },
                "delta_time_usec": 0
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("delta_time_usec"));
    }

    #[test]
    fn empty_node_id_rejected_with_key() {
        let err = RemoteConfig::from_json(
            r#"{
                "client": { "nodeId": "" },
                "server": { "nodeId": "sim-server" },
                "delta_time_usec": 1000
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("client.nodeId"));
    }

    #[test]
    fn unknown_time_source_rejected() {
        let err = RemoteConfig::from_json(
            r#"{
                "client": { "nodeId": "asset-1" },
                "server": { "nodeId": "sim-server" },
                "delta_time_usec": 1000,
                "time_source_type": "quartz"
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("time_source_type"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RemoteConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = RemoteConfig::load(file.path()).unwrap();
        assert_eq!(config.client.node_id, "asset-1");
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        assert!(matches!(
            RemoteConfig::load(Path::new("/nonexistent/remote.json")),
            Err(Error::Io(_))
        ));
    }
}
