//! hazelgrid member binary.
//!
//! Reads its configuration from `HAZELGRID_*` environment variables (or, with
//! the `config-file` feature, from the TOML file named by
//! `HAZELGRID_CONFIG_FILE`) and serves until Ctrl-C.

use std::sync::Arc;

use hazelgrid_member::{MemberConfig, MemberServer, Node};
use tracing_subscriber::{fmt, EnvFilter};

fn load_config() -> Result<MemberConfig, hazelgrid_member::ConfigError> {
    #[cfg(feature = "config-file")]
    {
        if let Ok(path) = std::env::var("HAZELGRID_CONFIG_FILE") {
            tracing::info!("Loading configuration from {}", path);
            return MemberConfig::from_toml(path);
        }
    }
    MemberConfig::from_env()
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hazelgrid_member=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!(
        "hazelgrid member v{} (cluster '{}', {} members, {} partitions)",
        env!("CARGO_PKG_VERSION"),
        config.cluster_name(),
        config.members().len(),
        config.partition_count()
    );

    let server = match MemberServer::bind(config.listen_address()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let node = match Node::builder(config).build() {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!("Failed to create node: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    };

    if let Err(e) = server.run(node, shutdown).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
