use std::fmt;

use crate::error::PipelineError;
use crate::utils::{parse_ipv4_cidr, Ipv4Cidr};

/// A routed prefix as observed on the wire. Only the IPv4 variant participates
/// in geolocation/classification; IPv6 is carried through for completeness but
/// ignored downstream (see Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    V4(Ipv4Cidr),
    /// Opaque marker; IPv6 prefixes are parsed just enough to be recognized and skipped.
    V6,
}

impl Prefix {
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        if text.contains(':') {
            return Ok(Prefix::V6);
        }
        Ok(Prefix::V4(parse_ipv4_cidr(text)?))
    }

    pub fn as_v4(self) -> Option<Ipv4Cidr> {
        match self {
            Prefix::V4(cidr) => Some(cidr),
            Prefix::V6 => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Prefix::V4(cidr) => write!(f, "{}", cidr.to_canonical_string()),
            Prefix::V6 => write!(f, "<ipv6>"),
        }
    }
}
