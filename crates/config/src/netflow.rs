//! NetFlow source configuration
//!
//! Zero-valued sizing fields mean "use the processor default", so a bare
//! `[netflow]` section (or none at all) listens on 127.0.0.1:2055 with one
//! worker per CPU.

use serde::Deserialize;

/// NetFlow v5 UDP source configuration
///
/// # Example
///
/// ```toml
/// [netflow]
/// address = "0.0.0.0"
/// port = 2055
/// num_workers = 8
/// backlog = 1000
/// recv_buffer_size = 4194304
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetflowConfig {
    /// Bind address
    /// Default: "127.0.0.1"
    pub address: String,

    /// Listen port
    /// Default: 2055
    pub port: u16,

    /// Number of decode workers
    /// Default: 0 (one per CPU)
    pub num_workers: usize,

    /// Datagrams queued ahead of the workers before the receiver waits
    /// Default: 0 (100)
    pub backlog: usize,

    /// Capacity of each receive buffer in bytes, larger datagrams are truncated
    /// Default: 0 (2048)
    pub packet_size: usize,

    /// Idle receive buffers kept for reuse
    /// Default: 0 (same as backlog)
    pub pool_size: usize,

    /// Kernel socket receive buffer (SO_RCVBUF) in bytes
    /// Default: OS default
    pub recv_buffer_size: Option<usize>,

    /// Allocate every pooled buffer at startup
    /// Default: true
    pub prefill_pool: bool,
}

impl Default for NetflowConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 2055,
            num_workers: 0,
            backlog: 0,
            packet_size: 0,
            pool_size: 0,
            recv_buffer_size: None,
            prefill_pool: true,
        }
    }
}

impl NetflowConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') {
            // IPv6 literal
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetflowConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:2055");
        assert_eq!(config.num_workers, 0);
        assert_eq!(config.recv_buffer_size, None);
        assert!(config.prefill_pool);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
address = "0.0.0.0"
port = 9995
num_workers = 8
backlog = 1000
packet_size = 1500
pool_size = 2000
recv_buffer_size = 4194304
prefill_pool = false
"#;
        let config: NetflowConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9995");
        assert_eq!(config.num_workers, 8);
        assert_eq!(config.backlog, 1000);
        assert_eq!(config.packet_size, 1500);
        assert_eq!(config.pool_size, 2000);
        assert_eq!(config.recv_buffer_size, Some(4_194_304));
        assert!(!config.prefill_pool);
    }

    #[test]
    fn test_ipv6_bind_address() {
        let config = NetflowConfig {
            address: "::1".into(),
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "[::1]:2055");
    }
}
