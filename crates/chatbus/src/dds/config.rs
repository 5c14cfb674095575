// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Factory configuration: `-DCPS*` command-line arguments and the optional
//! TOML file they point to.
//!
//! ```toml
//! [transport]
//! mode = "udp"                  # or "intra"
//! multicast_group = "239.255.0.1"
//! port_base = 7400
//! domain_gain = 250
//! heartbeat_period_ms = 100
//!
//! [history]
//! depth = 64
//! ```

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Error, Result, MAX_DOMAIN_ID};

/// How participants exchange samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportMode {
    /// Same-process endpoints only, no sockets.
    #[default]
    #[serde(rename = "intra")]
    IntraProcess,
    /// Per-domain UDP multicast group.
    #[serde(rename = "udp")]
    UdpMulticast,
}

impl std::str::FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "intra" | "intra-process" | "inproc" => Ok(TransportMode::IntraProcess),
            "udp" | "multicast" | "rtps_udp" => Ok(TransportMode::UdpMulticast),
            other => Err(Error::InvalidConfig(format!(
                "unknown transport '{}' (expected 'intra' or 'udp')",
                other
            ))),
        }
    }
}

/// `[transport]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub mode: TransportMode,

    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,

    #[serde(default = "default_port_base")]
    pub port_base: u16,

    #[serde(default = "default_domain_gain")]
    pub domain_gain: u16,

    #[serde(default = "default_heartbeat_period_ms")]
    pub heartbeat_period_ms: u64,
}

fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 255, 0, 1)
}

fn default_port_base() -> u16 {
    7400
}

fn default_domain_gain() -> u16 {
    250
}

fn default_heartbeat_period_ms() -> u64 {
    100
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            multicast_group: default_multicast_group(),
            port_base: default_port_base(),
            domain_gain: default_domain_gain(),
            heartbeat_period_ms: default_heartbeat_period_ms(),
        }
    }
}

/// `[history]` table: writer-side history kept for repairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_depth")]
    pub depth: u32,
}

fn default_depth() -> u32 {
    64
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
        }
    }
}

/// Complete factory configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

impl FactoryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigFileNotFound(path.display().to_string())
            } else {
                Error::IoError(e)
            }
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration described by transport arguments.
    pub fn from_args(args: &TransportArgs) -> Result<Self> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(mode) = args.transport {
            config.transport.mode = mode;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if !t.multicast_group.is_multicast() {
            return Err(Error::InvalidConfig(format!(
                "{} is not a multicast address",
                t.multicast_group
            )));
        }
        if t.heartbeat_period_ms == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_period_ms must be positive".into(),
            ));
        }
        let highest = u32::from(t.port_base) + u32::from(t.domain_gain) * MAX_DOMAIN_ID + 1;
        if highest > u32::from(u16::MAX) {
            return Err(Error::InvalidConfig(format!(
                "port_base {} + domain_gain {} overflows the port range for domain {}",
                t.port_base, t.domain_gain, MAX_DOMAIN_ID
            )));
        }
        if self.history.depth == 0 {
            return Err(Error::InvalidConfig("history depth must be positive".into()));
        }
        Ok(())
    }
}

/// Recognized `-DCPS*` command-line arguments.
///
/// Arguments that do not start with `-DCPS` belong to the host program and
/// are skipped. Unknown `-DCPS*` options are logged and ignored along with
/// their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportArgs {
    pub transport: Option<TransportMode>,
    pub config_file: Option<PathBuf>,
    pub debug_level: Option<u32>,
}

impl TransportArgs {
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            let arg = arg.as_ref();
            if !arg.starts_with("-DCPS") {
                continue;
            }

            let value = iter
                .next()
                .map(|v| v.as_ref().to_string())
                .ok_or_else(|| Error::InvalidConfig(format!("{} requires a value", arg)))?;

            match arg {
                "-DCPSTransport" => parsed.transport = Some(value.parse()?),
                "-DCPSConfigFile" => parsed.config_file = Some(PathBuf::from(value)),
                "-DCPSDebugLevel" => {
                    let level = value.parse::<u32>().map_err(|_| {
                        Error::InvalidConfig(format!("-DCPSDebugLevel: '{}' is not a number", value))
                    })?;
                    parsed.debug_level = Some(level);
                }
                other => log::warn!("[Factory] ignoring unsupported option {} {}", other, value),
            }
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FactoryConfig::default();
        assert_eq!(config.transport.mode, TransportMode::IntraProcess);
        assert_eq!(config.transport.multicast_group, Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(config.transport.port_base, 7400);
        assert_eq!(config.transport.domain_gain, 250);
        assert_eq!(config.history.depth, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FactoryConfig::from_toml(
            r#"
[transport]
mode = "udp"
heartbeat_period_ms = 250
"#,
        )
        .expect("parse");
        assert_eq!(config.transport.mode, TransportMode::UdpMulticast);
        assert_eq!(config.transport.heartbeat_period_ms, 250);
        assert_eq!(config.transport.port_base, 7400);
        assert_eq!(config.history.depth, 64);
    }

    #[test]
    fn test_rejects_unicast_group() {
        let err = FactoryConfig::from_toml("[transport]\nmulticast_group = \"10.0.0.1\"\n")
            .expect_err("unicast group");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_port_overflow() {
        let err = FactoryConfig::from_toml("[transport]\nport_base = 60000\n")
            .expect_err("port overflow");
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_parse_args() {
        let args = TransportArgs::parse([
            "chat-bridge",
            "--port",
            "7000",
            "-DCPSTransport",
            "udp",
            "-DCPSDebugLevel",
            "4",
            "-DCPSBit",
            "0",
        ])
        .expect("parse");
        assert_eq!(args.transport, Some(TransportMode::UdpMulticast));
        assert_eq!(args.debug_level, Some(4));
        assert_eq!(args.config_file, None);
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = TransportArgs::parse(["-DCPSConfigFile"]).expect_err("missing value");
        assert!(err.to_string().contains("requires a value"));
    }

    #[test]
    fn test_unknown_transport() {
        let err = TransportArgs::parse(["-DCPSTransport", "tcp"]).expect_err("bad transport");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_config_file_then_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bus.toml");
        std::fs::write(&path, "[transport]\nmode = \"udp\"\n[history]\ndepth = 8\n")
            .expect("write config");

        let args = TransportArgs::parse([
            "-DCPSConfigFile",
            path.to_str().expect("utf8 path"),
            "-DCPSTransport",
            "intra",
        ])
        .expect("parse");
        let config = FactoryConfig::from_args(&args).expect("resolve");
        assert_eq!(config.transport.mode, TransportMode::IntraProcess);
        assert_eq!(config.history.depth, 8);
    }

    #[test]
    fn test_missing_config_file() {
        let args = TransportArgs {
            config_file: Some(PathBuf::from("/nonexistent/bus.toml")),
            ..Default::default()
        };
        let err = FactoryConfig::from_args(&args).expect_err("missing file");
        assert!(matches!(err, Error::ConfigFileNotFound(_)));
    }
}
