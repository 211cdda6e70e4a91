//! Gateway configuration.
//!
//! For now this only configures the HTTP listen address. The underlying
//! node configuration is taken from `ledger::NodeConfig::default()`.

use std::net::SocketAddr;

/// Configuration for the gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // Bind to all interfaces so peers on other hosts can reach the
        // message and block submission endpoints.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self { listen_addr: addr }
    }
}
