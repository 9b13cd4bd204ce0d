use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, Reader};

use crate::error::PipelineError;

/// Thin wrapper over a MaxMind-compatible (GeoLite2/GeoIP2 City) database.
pub struct OfflineGeoDb {
    reader: Reader<Vec<u8>>,
}

impl OfflineGeoDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let reader = Reader::open_readfile(path)
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        Ok(Self { reader })
    }

    /// Returns `(lat, lng, country_code, city)`. Any missing field comes back
    /// as its zero value (0.0 / empty string) rather than failing the lookup.
    pub fn lookup(&self, ip: u32) -> Option<(f64, f64, String, String)> {
        let addr = IpAddr::from(std::net::Ipv4Addr::from(ip));
        let city: geoip2::City = self.reader.lookup(addr).ok()?;

        let (lat, lng) = city
            .location
            .as_ref()
            .map(|loc| (loc.latitude.unwrap_or(0.0), loc.longitude.unwrap_or(0.0)))
            .unwrap_or((0.0, 0.0));

        let cc = city
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .unwrap_or_default()
            .to_string();

        let city_name = city
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
            .unwrap_or(&"")
            .to_string();

        Some((lat, lng, cc, city_name))
    }
}
