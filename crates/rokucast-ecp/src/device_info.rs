//! Parsing of `/query/device-info` responses
//!
//! Devices return a small XML document:
//!
//! ```xml
//! <device-info>
//!     <vendor-name>Roku</vendor-name>
//!     <model-name>Roku Ultra</model-name>
//!     <user-device-name>Living Room</user-device-name>
//!     ...
//! </device-info>
//! ```
//!
//! Other HTTP servers on port 8060 return all sorts of things, so the reader
//! is lenient: the first `device-info` element is located anywhere in the
//! document, tag names compare case-insensitively, mismatched end tags are
//! tolerated, and only the first occurrence of each field counts.

use quick_xml::events::Event;
use quick_xml::Reader;
use rokucast_core::DeviceInfo;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum DeviceInfoError {
    #[error("Failed to parse device-info XML: {0}")]
    ParseError(String),
    #[error("Missing <{0}> element")]
    MissingElement(&'static str),
}

const DEVICE_INFO_TAG: &str = "device-info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    VendorName,
    UserDeviceName,
    FriendlyDeviceName,
    ModelName,
    SerialNumber,
}

impl Field {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vendor-name" => Some(Self::VendorName),
            "user-device-name" => Some(Self::UserDeviceName),
            "friendly-device-name" => Some(Self::FriendlyDeviceName),
            "model-name" => Some(Self::ModelName),
            "serial-number" => Some(Self::SerialNumber),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Fields {
    vendor_name: Option<String>,
    user_device_name: Option<String>,
    friendly_device_name: Option<String>,
    model_name: Option<String>,
    serial_number: Option<String>,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::VendorName => &mut self.vendor_name,
            Field::UserDeviceName => &mut self.user_device_name,
            Field::FriendlyDeviceName => &mut self.friendly_device_name,
            Field::ModelName => &mut self.model_name,
            Field::SerialNumber => &mut self.serial_number,
        }
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Parse a device-info document into a [`DeviceInfo`]
pub fn parse_device_info(body: &str) -> Result<DeviceInfo, DeviceInfoError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut depth = 0usize;
    // Depth at which <device-info> was opened
    let mut info_depth: Option<usize> = None;
    let mut current: Option<Field> = None;
    let mut fields = Fields::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DeviceInfoError::ParseError(e.to_string()))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = tag_name(e.name().as_ref());
                if info_depth.is_none() {
                    if name == DEVICE_INFO_TAG {
                        info_depth = Some(depth);
                    }
                    continue;
                }
                current = Field::from_tag(&name).filter(|field| {
                    let slot = fields.slot(*field);
                    if slot.is_some() {
                        return false;
                    }
                    *slot = Some(String::new());
                    true
                });
            }
            Event::Empty(e) => {
                // <device-info/> has no fields; a self-closed field is an empty value
                if info_depth.is_some() {
                    if let Some(field) = Field::from_tag(&tag_name(e.name().as_ref())) {
                        fields.slot(field).get_or_insert_with(String::new);
                    }
                } else if tag_name(e.name().as_ref()) == DEVICE_INFO_TAG {
                    return Err(DeviceInfoError::MissingElement("vendor-name"));
                }
            }
            Event::End(_) => {
                if info_depth == Some(depth) {
                    break;
                }
                depth = depth.saturating_sub(1);
                current = None;
            }
            Event::Text(text) => {
                if let Some(field) = current {
                    let text = text
                        .unescape()
                        .map_err(|e| DeviceInfoError::ParseError(e.to_string()))?;
                    if let Some(value) = fields.slot(field) {
                        value.push_str(&text);
                    }
                }
            }
            Event::CData(data) => {
                if let Some(field) = current {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if let Some(value) = fields.slot(field) {
                        value.push_str(&text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if info_depth.is_none() {
        return Err(DeviceInfoError::MissingElement(DEVICE_INFO_TAG));
    }

    let vendor_name = fields
        .vendor_name
        .ok_or(DeviceInfoError::MissingElement("vendor-name"))?;

    let info = DeviceInfo {
        vendor_name: vendor_name.trim().to_string(),
        user_device_name: fields.user_device_name.map(|s| s.trim().to_string()),
        friendly_device_name: fields.friendly_device_name.map(|s| s.trim().to_string()),
        model_name: fields.model_name.map(|s| s.trim().to_string()),
        serial_number: fields.serial_number.map(|s| s.trim().to_string()),
    };

    trace!(vendor = %info.vendor_name, name = ?info.user_device_name, "Parsed device-info");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROKU_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<device-info>
	<udn>29600009-2c02-10c4-8038-c83a35f4e0b6</udn>
	<serial-number>X00400ABCDEF</serial-number>
	<vendor-name>Roku</vendor-name>
	<model-name>Roku Ultra</model-name>
	<friendly-device-name>Roku Ultra - X00400ABCDEF</friendly-device-name>
	<user-device-name>Living Room</user-device-name>
	<is-tv>false</is-tv>
</device-info>
"#;

    #[test]
    fn test_parse_roku_device_info() {
        let info = parse_device_info(ROKU_BODY).unwrap();
        assert_eq!(info.vendor_name, "Roku");
        assert_eq!(info.user_device_name.as_deref(), Some("Living Room"));
        assert_eq!(info.model_name.as_deref(), Some("Roku Ultra"));
        assert_eq!(info.serial_number.as_deref(), Some("X00400ABCDEF"));
        assert!(info.is_roku());
    }

    #[test]
    fn test_parse_other_vendor() {
        let body = "<device-info><vendor-name>Sonos</vendor-name>\
                    <user-device-name>Kitchen</user-device-name></device-info>";
        let info = parse_device_info(body).unwrap();
        assert_eq!(info.vendor_name, "Sonos");
        assert!(!info.is_roku());
    }

    #[test]
    fn test_device_info_nested_in_other_markup() {
        let body = "<html><body><DEVICE-INFO><Vendor-Name>ROKU</Vendor-Name>\
                    <User-Device-Name>Bedroom</User-Device-Name></DEVICE-INFO></body></html>";
        let info = parse_device_info(body).unwrap();
        assert!(info.is_roku());
        assert_eq!(info.user_device_name.as_deref(), Some("Bedroom"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let body = "<device-info><vendor-name>Roku</vendor-name>\
                    <vendor-name>Other</vendor-name></device-info>";
        assert_eq!(parse_device_info(body).unwrap().vendor_name, "Roku");
    }

    #[test]
    fn test_fields_outside_device_info_are_ignored() {
        let body = "<root><vendor-name>Roku</vendor-name><device-info>\
                    <vendor-name>Sonos</vendor-name></device-info></root>";
        assert_eq!(parse_device_info(body).unwrap().vendor_name, "Sonos");
    }

    #[test]
    fn test_escaped_text() {
        let body = "<device-info><vendor-name>Roku</vendor-name>\
                    <user-device-name>Tom &amp; Jerry</user-device-name></device-info>";
        let info = parse_device_info(body).unwrap();
        assert_eq!(info.user_device_name.as_deref(), Some("Tom & Jerry"));
    }

    #[test]
    fn test_surrounding_whitespace_is_stripped() {
        let body = "<device-info>\n  <vendor-name>\n    Roku\n  </vendor-name>\n</device-info>";
        let info = parse_device_info(body).unwrap();
        assert_eq!(info.vendor_name, "Roku");
        assert!(info.is_roku());
    }

    #[test]
    fn test_missing_device_info() {
        let err = parse_device_info("<html><body>It works!</body></html>").unwrap_err();
        assert!(matches!(err, DeviceInfoError::MissingElement("device-info")));

        let err = parse_device_info("").unwrap_err();
        assert!(matches!(err, DeviceInfoError::MissingElement("device-info")));
    }

    #[test]
    fn test_missing_vendor() {
        let body = "<device-info><user-device-name>Den</user-device-name></device-info>";
        let err = parse_device_info(body).unwrap_err();
        assert!(matches!(err, DeviceInfoError::MissingElement("vendor-name")));
    }

    #[test]
    fn test_plain_text_is_not_device_info() {
        assert!(parse_device_info("{\"status\":\"ok\"}").is_err());
    }
}
