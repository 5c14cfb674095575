// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network transport: frame codec, port mapping and the UDP multicast
//! transport.

pub mod frame;
mod udp;

pub use frame::{Frame, FrameBody, FrameHeader, FrameKind};
pub use udp::UdpTransport;
pub(crate) use udp::now_ns;

use crate::dds::{Error, Result, TransportConfig, MAX_DOMAIN_ID};

/// Offset of the data port from the domain's base port.
pub const DATA_PORT_OFFSET: u16 = 1;

/// Ports used by one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Multicast data port: `port_base + domain_gain * domain_id + 1`.
    pub multicast: u16,
}

impl PortMapping {
    pub fn for_domain(config: &TransportConfig, domain_id: u32) -> Result<Self> {
        if domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(domain_id));
        }
        let port = u32::from(config.port_base)
            + u32::from(config.domain_gain) * domain_id
            + u32::from(DATA_PORT_OFFSET);
        let multicast = u16::try_from(port).map_err(|_| {
            Error::InvalidConfig(format!("port {} for domain {} out of range", port, domain_id))
        })?;
        Ok(Self { multicast })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = TransportConfig::default();
        assert_eq!(
            PortMapping::for_domain(&config, 0).expect("domain 0").multicast,
            7401
        );
        assert_eq!(
            PortMapping::for_domain(&config, 10).expect("domain 10").multicast,
            9901
        );
    }

    #[test]
    fn test_invalid_domain() {
        let config = TransportConfig::default();
        assert!(matches!(
            PortMapping::for_domain(&config, 233),
            Err(Error::InvalidDomainId(233))
        ));
    }
}
