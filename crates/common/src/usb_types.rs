//! USB identifiers and device filters

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Vendor id programmed into the MCA firmware
pub const CAPEMCA_VENDOR_ID: u16 = 0x4701;

/// Product id programmed into the MCA firmware
pub const CAPEMCA_PRODUCT_ID: u16 = 0x0290;

/// VID:PID match criterion
///
/// Textual form is `0xVVVV:0xPPPP`; either side may be `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Match exactly one VID/PID pair
    pub fn exact(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Match any device
    pub fn any() -> Self {
        Self {
            vendor_id: None,
            product_id: None,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|vid| vid == vendor_id)
            && self.product_id.is_none_or(|pid| pid == product_id)
    }

    /// Parse a filter pattern such as `0x4701:0x0290` or `0x4701:*`
    pub fn parse(filter: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidFilter {
            filter: filter.to_string(),
            reason: reason.to_string(),
        };

        let (vid, pid) = filter
            .split_once(':')
            .ok_or_else(|| invalid("expected VID:PID (e.g. '0x4701:0x0290' or '0x4701:*')"))?;
        if pid.contains(':') {
            return Err(invalid("expected exactly one ':'"));
        }

        Ok(Self {
            vendor_id: parse_id(vid.trim()).map_err(|reason| invalid(&format!("VID {}", reason)))?,
            product_id: parse_id(pid.trim())
                .map_err(|reason| invalid(&format!("PID {}", reason)))?,
        })
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::exact(CAPEMCA_VENDOR_ID, CAPEMCA_PRODUCT_ID)
    }
}

impl FromStr for DeviceFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(vid) => write!(f, "{:#06x}", vid)?,
            None => write!(f, "*")?,
        }
        match self.product_id {
            Some(pid) => write!(f, ":{:#06x}", pid),
            None => write!(f, ":*"),
        }
    }
}

fn parse_id(id: &str) -> std::result::Result<Option<u16>, String> {
    if id == "*" {
        return Ok(None);
    }

    let hex = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| format!("'{}' must start with '0x'", id))?;
    if hex.is_empty() || hex.len() > 4 {
        return Err(format!("'{}' must have 1-4 hex digits", id));
    }

    u16::from_str_radix(hex, 16)
        .map(Some)
        .map_err(|_| format!("'{}' is not a valid hex number", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_is_capemca() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(0x4701, 0x0290));
        assert!(!filter.matches(0x4701, 0x0291));
        assert_eq!(filter.to_string(), "0x4701:0x0290");
    }

    #[test]
    fn test_parse_valid_filters() {
        assert_eq!(
            DeviceFilter::parse("0x4701:0x0290").unwrap(),
            DeviceFilter::exact(0x4701, 0x0290)
        );
        assert_eq!(
            DeviceFilter::parse("0XABCD:*").unwrap(),
            DeviceFilter {
                vendor_id: Some(0xabcd),
                product_id: None
            }
        );
        assert_eq!(DeviceFilter::parse("*:*").unwrap(), DeviceFilter::any());
    }

    #[test]
    fn test_parse_invalid_filters() {
        for filter in [
            "4701:0290",
            "0x4701",
            "0x4701:0x0290:0x1",
            "0xGHIJ:0x0290",
            "0x12345:0x0290",
            "0x:0x0290",
        ] {
            assert!(
                DeviceFilter::parse(filter).is_err(),
                "'{}' should not parse",
                filter
            );
        }
    }

    #[test]
    fn test_wildcard_matching() {
        let vendor_only: DeviceFilter = "0x4701:*".parse().unwrap();
        assert!(vendor_only.matches(0x4701, 0x0001));
        assert!(!vendor_only.matches(0x4702, 0x0290));
        assert!(DeviceFilter::any().matches(0, 0));
    }

    #[test]
    fn test_display_roundtrip() {
        let filter = DeviceFilter {
            vendor_id: None,
            product_id: Some(0x0290),
        };
        assert_eq!(filter.to_string(), "*:0x0290");
        assert_eq!(DeviceFilter::parse(&filter.to_string()).unwrap(), filter);
    }
}
