//! Configuration validation
//!
//! Rejects values the collector cannot run with:
//! - NetFlow buffers too small to hold a v5 header
//! - Worker counts far beyond any host
//! - A zero metrics interval while reporting is enabled

use crate::Config;
use crate::error::{ConfigError, Result};

/// Smallest useful receive buffer: one NetFlow v5 header
const MIN_PACKET_SIZE: usize = 24;

/// Upper bound on decode workers
const MAX_WORKERS: usize = 4096;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_netflow(config)?;
    validate_metrics(config)?;
    Ok(())
}

fn validate_netflow(config: &Config) -> Result<()> {
    let netflow = &config.netflow;

    // Zero selects the default
    if netflow.packet_size != 0 && netflow.packet_size < MIN_PACKET_SIZE {
        return Err(ConfigError::invalid_value(
            "netflow",
            "packet_size",
            format!("{} is smaller than a {MIN_PACKET_SIZE}-byte header", netflow.packet_size),
        ));
    }

    if netflow.num_workers > MAX_WORKERS {
        return Err(ConfigError::invalid_value(
            "netflow",
            "num_workers",
            format!("{} exceeds the limit of {MAX_WORKERS}", netflow.num_workers),
        ));
    }

    if netflow.address.is_empty() {
        return Err(ConfigError::invalid_value("netflow", "address", "must not be empty"));
    }

    if netflow.recv_buffer_size == Some(0) {
        return Err(ConfigError::invalid_value(
            "netflow",
            "recv_buffer_size",
            "must be positive, omit it to keep the OS default",
        ));
    }

    Ok(())
}

fn validate_metrics(config: &Config) -> Result<()> {
    if config.metrics.enabled && config.metrics.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "interval",
            "must be non-zero when metrics are enabled",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_packet_size_below_header() {
        let result = Config::from_str("[netflow]\npacket_size = 23");
        match result {
            Err(ConfigError::InvalidValue { section, field, .. }) => {
                assert_eq!(section, "netflow");
                assert_eq!(field, "packet_size");
            }
            other => panic!("expected invalid packet_size, got {other:?}"),
        }
    }

    #[test]
    fn test_packet_size_boundaries() {
        assert!(Config::from_str("[netflow]\npacket_size = 0").is_ok());
        assert!(Config::from_str("[netflow]\npacket_size = 24").is_ok());
        assert!(Config::from_str("[netflow]\npacket_size = 1464").is_ok());
    }

    #[test]
    fn test_too_many_workers() {
        let result = Config::from_str("[netflow]\nnum_workers = 100000");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "num_workers", .. })
        ));
    }

    #[test]
    fn test_empty_address() {
        let result = Config::from_str("[netflow]\naddress = \"\"");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "address", .. })
        ));
    }

    #[test]
    fn test_zero_recv_buffer() {
        let result = Config::from_str("[netflow]\nrecv_buffer_size = 0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "recv_buffer_size", .. })
        ));
    }

    #[test]
    fn test_zero_metrics_interval() {
        let result = Config::from_str("[metrics]\ninterval = \"0s\"");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { section: "metrics", .. })
        ));

        // Allowed when reporting is off
        assert!(Config::from_str("[metrics]\nenabled = false\ninterval = \"0s\"").is_ok());
    }
}
