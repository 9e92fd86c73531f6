//! Declarative configuration loading from TOML.
//!
//! Requires the `config-file` feature. The file is deserialized into
//! [`FileConfig`], a serde-friendly mirror of [`MemberConfig`], and then
//! converted through [`MemberConfigBuilder`] so the same validation applies.
//!
//! # Example TOML
//!
//! ```toml
//! cluster-name = "production"
//! listen-address = "10.0.0.1:5701"
//! members = ["10.0.0.1:5701", "10.0.0.2:5701"]
//! partition-count = 271
//! byte-order = "big"
//! invocation-timeout-ms = 30000
//! connect-timeout-ms = 5000
//! max-frame-size = 16777216
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MemberConfig, MemberConfigBuilder};

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Cluster name.
    pub cluster_name: Option<String>,
    /// Address this member listens on.
    pub listen_address: Option<String>,
    /// Cluster member addresses.
    pub members: Option<Vec<String>>,
    /// Number of partitions.
    pub partition_count: Option<i32>,
    /// Byte order: `big`, `little` or `native`.
    pub byte_order: Option<String>,
    /// Invocation timeout in milliseconds.
    pub invocation_timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Largest accepted frame in bytes.
    pub max_frame_size: Option<usize>,
}

impl TryFrom<FileConfig> for MemberConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = MemberConfigBuilder::new();

        if let Some(name) = file.cluster_name {
            builder = builder.cluster_name(name);
        }

        if let Some(addr) = file.listen_address {
            let addr = addr
                .parse()
                .map_err(|e| ConfigError::new(format!("invalid listen-address '{addr}': {e}")))?;
            builder = builder.listen_address(addr);
        }

        if let Some(members) = file.members {
            let members = members
                .iter()
                .map(|m| {
                    m.parse()
                        .map_err(|e| ConfigError::new(format!("invalid member '{m}': {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.members(members);
        }

        if let Some(count) = file.partition_count {
            builder = builder.partition_count(count);
        }

        if let Some(order) = file.byte_order {
            let order = order
                .parse()
                .map_err(|e| ConfigError::new(format!("invalid byte-order: {e}")))?;
            builder = builder.byte_order(order);
        }

        if let Some(ms) = file.invocation_timeout_ms {
            builder = builder.invocation_timeout(Duration::from_millis(ms));
        }

        if let Some(ms) = file.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }

        if let Some(size) = file.max_frame_size {
            builder = builder.max_frame_size(size);
        }

        builder.build()
    }
}

impl MemberConfig {
    /// Loads configuration from a TOML file.
    ///
    /// ```ignore
    /// let config = MemberConfig::from_toml("hazelgrid-member.toml")?;
    /// ```
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read TOML config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file_config: FileConfig = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }
}
