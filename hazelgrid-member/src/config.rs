//! Member configuration types and builders.

use std::net::SocketAddr;
use std::time::Duration;

use hazelgrid_core::protocol::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, INITIAL_FRAME_SIZE};
use hazelgrid_core::{ByteOrder, GridError};

/// Default cluster name.
const DEFAULT_CLUSTER_NAME: &str = "dev";
/// Default listen address, also the member's identity in the partition table.
const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    5701,
));
/// Default partition count.
const DEFAULT_PARTITION_COUNT: i32 = 271;
/// Default deadline for a forwarded operation.
const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable holding the cluster name.
pub const ENV_CLUSTER_NAME: &str = "HAZELGRID_CLUSTER_NAME";
/// Environment variable holding the listen address.
pub const ENV_LISTEN_ADDRESS: &str = "HAZELGRID_LISTEN_ADDRESS";
/// Environment variable holding comma-separated member addresses.
pub const ENV_MEMBERS: &str = "HAZELGRID_MEMBERS";
/// Environment variable holding the partition count.
pub const ENV_PARTITION_COUNT: &str = "HAZELGRID_PARTITION_COUNT";
/// Environment variable holding the byte order (`big`, `little` or `native`).
pub const ENV_BYTE_ORDER: &str = "HAZELGRID_BYTE_ORDER";
/// Environment variable holding the invocation timeout in milliseconds.
pub const ENV_INVOCATION_TIMEOUT_MS: &str = "HAZELGRID_INVOCATION_TIMEOUT_MS";
/// Environment variable holding the connect timeout in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "HAZELGRID_CONNECT_TIMEOUT_MS";

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for GridError {
    fn from(err: ConfigError) -> Self {
        GridError::Configuration(err.message)
    }
}

/// Configuration of a single member.
#[derive(Debug, Clone)]
pub struct MemberConfig {
    cluster_name: String,
    listen_address: SocketAddr,
    members: Vec<SocketAddr>,
    partition_count: i32,
    byte_order: ByteOrder,
    invocation_timeout: Duration,
    connect_timeout: Duration,
    max_frame_size: usize,
}

impl MemberConfig {
    /// Creates a new member configuration builder.
    pub fn builder() -> MemberConfigBuilder {
        MemberConfigBuilder::new()
    }

    /// Returns the cluster name.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Returns the address this member listens on and is known by.
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Returns every cluster member, this one included, sorted and deduplicated.
    pub fn members(&self) -> &[SocketAddr] {
        &self.members
    }

    /// Returns the number of partitions.
    pub fn partition_count(&self) -> i32 {
        self.partition_count
    }

    /// Returns the byte order of the serialization service.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns the deadline for a forwarded operation.
    pub fn invocation_timeout(&self) -> Duration {
        self.invocation_timeout
    }

    /// Returns the timeout for opening a connection to another member.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the largest frame accepted or sent.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Loads configuration from environment variables.
    ///
    /// # Supported Environment Variables
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `HAZELGRID_CLUSTER_NAME` | `cluster_name` |
    /// | `HAZELGRID_LISTEN_ADDRESS` | `listen_address` |
    /// | `HAZELGRID_MEMBERS` | Comma-separated addresses (e.g., `10.0.0.1:5701,10.0.0.2:5701`) |
    /// | `HAZELGRID_PARTITION_COUNT` | `partition_count` |
    /// | `HAZELGRID_BYTE_ORDER` | `big`, `little` or `native` |
    /// | `HAZELGRID_INVOCATION_TIMEOUT_MS` | Invocation timeout in milliseconds |
    /// | `HAZELGRID_CONNECT_TIMEOUT_MS` | Connect timeout in milliseconds |
    ///
    /// Values that do not parse are reported as errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = MemberConfigBuilder::new();

        if let Some(val) = lookup(ENV_CLUSTER_NAME) {
            builder = builder.cluster_name(val);
        }

        if let Some(val) = lookup(ENV_LISTEN_ADDRESS) {
            builder = builder.listen_address(parse_address(ENV_LISTEN_ADDRESS, &val)?);
        }

        if let Some(val) = lookup(ENV_MEMBERS) {
            let members = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_address(ENV_MEMBERS, s))
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.members(members);
        }

        if let Some(val) = lookup(ENV_PARTITION_COUNT) {
            builder = builder.partition_count(parse_number(ENV_PARTITION_COUNT, &val)?);
        }

        if let Some(val) = lookup(ENV_BYTE_ORDER) {
            let order = val
                .parse::<ByteOrder>()
                .map_err(|e| ConfigError::new(format!("{}: {}", ENV_BYTE_ORDER, e)))?;
            builder = builder.byte_order(order);
        }

        if let Some(val) = lookup(ENV_INVOCATION_TIMEOUT_MS) {
            let ms: u64 = parse_number(ENV_INVOCATION_TIMEOUT_MS, &val)?;
            builder = builder.invocation_timeout(Duration::from_millis(ms));
        }

        if let Some(val) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            let ms: u64 = parse_number(ENV_CONNECT_TIMEOUT_MS, &val)?;
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }

        builder.build()
    }
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            listen_address: DEFAULT_LISTEN_ADDRESS,
            members: vec![DEFAULT_LISTEN_ADDRESS],
            partition_count: DEFAULT_PARTITION_COUNT,
            byte_order: ByteOrder::BigEndian,
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

fn parse_address(var: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::new(format!("{}: invalid address '{}': {}", var, value, e)))
}

fn parse_number<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::new(format!("{}: invalid number '{}': {}", var, value, e)))
}

/// Builder for `MemberConfig`.
#[derive(Debug, Clone, Default)]
pub struct MemberConfigBuilder {
    cluster_name: Option<String>,
    listen_address: Option<SocketAddr>,
    members: Vec<SocketAddr>,
    partition_count: Option<i32>,
    byte_order: Option<ByteOrder>,
    invocation_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    max_frame_size: Option<usize>,
}

impl MemberConfigBuilder {
    /// Creates a new member configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster name.
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    /// Sets the address this member listens on.
    pub fn listen_address(mut self, address: SocketAddr) -> Self {
        self.listen_address = Some(address);
        self
    }

    /// Adds a cluster member address.
    pub fn add_member(mut self, address: SocketAddr) -> Self {
        self.members.push(address);
        self
    }

    /// Sets the cluster member addresses, replacing any previously configured.
    pub fn members(mut self, addresses: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.members = addresses.into_iter().collect();
        self
    }

    /// Sets the number of partitions.
    pub fn partition_count(mut self, count: i32) -> Self {
        self.partition_count = Some(count);
        self
    }

    /// Sets the byte order of the serialization service.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = Some(order);
        self
    }

    /// Sets the deadline for forwarded operations.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the largest frame accepted or sent.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Builds the member configuration, returning an error if validation fails.
    ///
    /// The listen address is always part of the member list, and the list is
    /// sorted so that every member derives the same initial partition table.
    pub fn build(self) -> Result<MemberConfig, ConfigError> {
        let cluster_name = self
            .cluster_name
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());
        if cluster_name.is_empty() {
            return Err(ConfigError::new("cluster_name must not be empty"));
        }

        let partition_count = self.partition_count.unwrap_or(DEFAULT_PARTITION_COUNT);
        if partition_count <= 0 {
            return Err(ConfigError::new(format!(
                "partition_count must be positive, got {}",
                partition_count
            )));
        }

        let invocation_timeout = self
            .invocation_timeout
            .unwrap_or(DEFAULT_INVOCATION_TIMEOUT);
        if invocation_timeout.is_zero() {
            return Err(ConfigError::new("invocation_timeout must be greater than zero"));
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(ConfigError::new("connect_timeout must be greater than zero"));
        }

        let max_frame_size = self.max_frame_size.unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        let min_frame_size = FRAME_HEADER_SIZE + INITIAL_FRAME_SIZE;
        if max_frame_size < min_frame_size {
            return Err(ConfigError::new(format!(
                "max_frame_size must be at least {} bytes, got {}",
                min_frame_size, max_frame_size
            )));
        }

        let listen_address = self.listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS);
        let mut members = self.members;
        members.push(listen_address);
        members.sort();
        members.dedup();

        Ok(MemberConfig {
            cluster_name,
            listen_address,
            members,
            partition_count,
            byte_order: self.byte_order.unwrap_or_default(),
            invocation_timeout,
            connect_timeout,
            max_frame_size,
        })
    }
}
