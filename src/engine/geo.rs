//! Best-effort country classification via a local MMDB database

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Sentinel country for any lookup that cannot be resolved
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Country classifier backed by an optional GeoLite2 database.
///
/// Absence of the database is not an error: every lookup degrades to
/// [`UNKNOWN_COUNTRY`], which is itself a valid bucket key.
pub struct GeoClassifier {
    reader: Option<Arc<Reader<Vec<u8>>>>,
}

impl GeoClassifier {
    /// Open the database at `path`. A missing or unreadable file produces a
    /// disabled classifier rather than an error; the batch must not fail
    /// because geo data is absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        match Reader::open_readfile(&path) {
            Ok(reader) => Self {
                reader: Some(Arc::new(reader)),
            },
            Err(e) => {
                log::warn!(
                    "geo database {:?} unavailable, country detection disabled: {}",
                    path.as_ref(),
                    e
                );
                Self { reader: None }
            }
        }
    }

    /// A classifier with no database; every lookup returns unknown.
    pub fn disabled() -> Self {
        Self { reader: None }
    }

    /// Map an IP string to a lowercased country name, or `"unknown"` for a
    /// missing database, unparsable address, or failed lookup. Never errors.
    pub fn classify(&self, ip: &str) -> String {
        let Some(reader) = &self.reader else {
            return UNKNOWN_COUNTRY.to_string();
        };
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return UNKNOWN_COUNTRY.to_string();
        };

        self.lookup_country(reader, addr)
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
    }

    fn lookup_country(&self, reader: &Reader<Vec<u8>>, addr: IpAddr) -> Option<String> {
        let lookup_result = reader.lookup(addr).ok()?;
        let record: Option<geoip2::Country> = lookup_result.decode().ok()?;
        record?
            .country
            .names
            .english
            .map(|name| name.to_lowercase())
    }
}

impl Clone for GeoClassifier {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.as_ref().map(Arc::clone),
        }
    }
}
