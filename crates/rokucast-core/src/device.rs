//! Device types for tracking discovered players

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Vendor name a device-info record must carry, compared uppercased
pub const EXPECTED_VENDOR: &str = "ROKU";

/// Fields read from a device's `device-info` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `vendor-name`
    pub vendor_name: String,
    /// `user-device-name` (name the owner gave the device)
    pub user_device_name: Option<String>,
    /// `friendly-device-name`
    pub friendly_device_name: Option<String>,
    /// `model-name`
    pub model_name: Option<String>,
    /// `serial-number`
    pub serial_number: Option<String>,
}

impl DeviceInfo {
    /// Whether the vendor confirms this is the expected device type
    pub fn is_roku(&self) -> bool {
        self.vendor_name.to_uppercase() == EXPECTED_VENDOR
    }

    /// The user-assigned name, falling back to the friendly name and model
    pub fn display_name(&self) -> String {
        self.user_device_name
            .as_deref()
            .or(self.friendly_device_name.as_deref())
            .or(self.model_name.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

/// A confirmed device found on one of the scanned prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Address the device answered on
    pub ip: Ipv4Addr,
    /// Vendor as reported by the device
    pub vendor: String,
    /// User-assigned device name
    pub name: String,
    /// Model name, if reported
    pub model: Option<String>,
    /// When the device was found
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    pub fn from_info(ip: Ipv4Addr, info: &DeviceInfo) -> Self {
        Self {
            ip,
            vendor: info.vendor_name.trim().to_string(),
            name: info.display_name(),
            model: info.model_name.clone(),
            discovered_at: Utc::now(),
        }
    }

    /// List entry label, `"{name} - {ip}"`
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(vendor: &str, name: Option<&str>) -> DeviceInfo {
        DeviceInfo {
            vendor_name: vendor.to_string(),
            user_device_name: name.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_vendor_match_is_case_insensitive() {
        assert!(info("Roku", None).is_roku());
        assert!(info("ROKU", None).is_roku());
        assert!(info("roku", None).is_roku());
        assert!(!info("Sonos", None).is_roku());
        assert!(!info("Roku Inc", None).is_roku());
        assert!(!info(" Roku ", None).is_roku());
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(info("Roku", Some("Living Room")).display_name(), "Living Room");

        let mut unnamed = info("Roku", None);
        unnamed.model_name = Some("Roku Ultra".to_string());
        assert_eq!(unnamed.display_name(), "Roku Ultra");

        assert_eq!(info("Roku", None).display_name(), "");
    }

    #[test]
    fn test_discovered_device_from_info() {
        let device = DiscoveredDevice::from_info(
            Ipv4Addr::new(192, 168, 1, 12),
            &info("Roku", Some("Bedroom")),
        );
        assert_eq!(device.name, "Bedroom");
        assert_eq!(device.vendor, "Roku");
        assert_eq!(device.label(), "Bedroom - 192.168.1.12");
    }
}
