use std::net::{AddrParseError, Ipv4Addr};
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Parsed IPv4 CIDR: a 32-bit network address plus mask length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    pub network: u32,
    pub mask: u8,
}

impl Ipv4Cidr {
    pub fn new(network: u32, mask: u8) -> Self {
        Self { network, mask }
    }

    /// Canonical "A.B.C.D/L" representation, used as the SeenStore key.
    pub fn to_canonical_string(self) -> String {
        format!("{}/{}", Ipv4Addr::from(self.network), self.mask)
    }

    pub fn contains(self, ip: u32) -> bool {
        let shift = 32 - self.mask;
        let masked = if shift >= 32 { 0 } else { (self.network >> shift) << shift };
        let ip_masked = if shift >= 32 { 0 } else { (ip >> shift) << shift };
        masked == ip_masked
    }
}

/// Parse "A.B.C.D/L" into an `Ipv4Cidr`, masking off any host bits beyond `L`.
pub fn parse_ipv4_cidr(prefix: &str) -> Result<Ipv4Cidr, PipelineError> {
    let (addr, mask) = prefix
        .split_once('/')
        .ok_or_else(|| PipelineError::Parse(format!("not a CIDR: '{}'", prefix)))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|err: AddrParseError| PipelineError::Parse(format!("{} '{}'", err, prefix)))?;
    let mask: u8 = mask
        .parse()
        .map_err(|err: ParseIntError| PipelineError::Parse(format!("{} '{}'", err, prefix)))?;
    if mask > 32 {
        return Err(PipelineError::Parse(format!(
            "mask length out of range: '{}'",
            prefix
        )));
    }
    let network = u32::from(addr);
    let shift = 32 - mask;
    let network = if shift >= 32 { 0 } else { (network >> shift) << shift };
    Ok(Ipv4Cidr::new(network, mask))
}

/// Best-effort parse of a dotted IPv4 address into its 32-bit representation.
pub fn parse_ipv4(addr: &str) -> Result<u32, PipelineError> {
    addr.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| PipelineError::InvalidAddress(addr.to_string()))
}
