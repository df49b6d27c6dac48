use std::io::BufReader;

use tracing::debug;
use xmltree::Element;

use crate::errors::ControlError;
use crate::soap_client::{extract_optional_child_text, find_child_with_suffix, http_agent};

/// The parts of a ZonePlayer `device_description.xml` the alert services use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescription {
    pub room_name: String,
    /// `uuid:RINCON_...` identifier of the player.
    pub udn: String,
    pub friendly_name: Option<String>,
    pub model_name: Option<String>,
}

impl DeviceDescription {
    /// Player UID without the `uuid:` prefix, as used in `x-rincon-queue:` URIs.
    pub fn uid(&self) -> &str {
        self.udn.strip_prefix("uuid:").unwrap_or(&self.udn)
    }
}

/// Downloads and parses the description document at `location`.
pub fn fetch_description(location: &str) -> Result<DeviceDescription, ControlError> {
    debug!(location, "Fetching device description");

    let mut response = http_agent()
        .get(location)
        .call()
        .map_err(|e| ControlError::http(location, e))?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ControlError::http(location, e))?;

    if !(200..300).contains(&status) {
        return Err(ControlError::BadDescription(
            location.to_string(),
            format!("HTTP status {}", status),
        ));
    }

    parse_description(location, body.as_bytes())
}

pub fn parse_description(location: &str, xml: &[u8]) -> Result<DeviceDescription, ControlError> {
    let bad = |reason: &str| ControlError::BadDescription(location.to_string(), reason.to_string());

    let root = Element::parse(BufReader::new(xml)).map_err(|e| bad(&e.to_string()))?;
    let device = find_child_with_suffix(&root, "device").ok_or_else(|| bad("no <device> element"))?;

    let udn = extract_optional_child_text(device, "UDN").ok_or_else(|| bad("no <UDN> element"))?;
    let friendly_name = extract_optional_child_text(device, "friendlyName");
    let room_name = extract_optional_child_text(device, "roomName")
        .or_else(|| friendly_name.clone())
        .ok_or_else(|| bad("no <roomName> element"))?;

    Ok(DeviceDescription {
        room_name,
        udn,
        friendly_name,
        model_name: extract_optional_child_text(device, "modelName"),
    })
}

/// Resolve a possibly relative controlURL against the description URL.
///
/// - If `control_url` is already absolute (starts with http:// or https://), it is returned as-is.
/// - Otherwise, it is resolved against the scheme://host:port of `description_url`.
pub fn resolve_control_url(description_url: &str, control_url: &str) -> String {
    if control_url.starts_with("http://") || control_url.starts_with("https://") {
        return control_url.to_string();
    }

    if let Some((scheme, rest)) = description_url.split_once("://") {
        let authority = rest.split('/').next().unwrap_or(rest);
        let base = format!("{}://{}", scheme, authority);

        return if control_url.starts_with('/') {
            format!("{}{}", base, control_url)
        } else {
            format!("{}/{}", base, control_url)
        };
    }

    // Fallback: just return the raw control_url if we cannot parse
    control_url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>192.168.1.20 - Sonos One - RINCON_000E58A0B1C201400</friendlyName>
    <manufacturer>Sonos, Inc.</manufacturer>
    <modelName>Sonos One</modelName>
    <roomName>Office</roomName>
    <UDN>uuid:RINCON_000E58A0B1C201400</UDN>
  </device>
</root>"#;

    #[test]
    fn description_gives_room_and_uid() {
        let desc = parse_description(
            "http://192.168.1.20:1400/xml/device_description.xml",
            DESCRIPTION.as_bytes(),
        )
        .unwrap();

        assert_eq!(desc.room_name, "Office");
        assert_eq!(desc.uid(), "RINCON_000E58A0B1C201400");
        assert_eq!(desc.model_name.as_deref(), Some("Sonos One"));
    }

    #[test]
    fn description_without_device_is_rejected() {
        let err = parse_description("http://x", b"<root/>").unwrap_err();
        assert!(matches!(err, ControlError::BadDescription(_, _)));
    }

    #[test]
    fn control_urls_are_resolved_against_description() {
        let location = "http://192.168.1.20:1400/xml/device_description.xml";
        assert_eq!(
            resolve_control_url(location, "/MediaRenderer/AVTransport/Control"),
            "http://192.168.1.20:1400/MediaRenderer/AVTransport/Control"
        );
        assert_eq!(
            resolve_control_url(location, "MediaServer/ContentDirectory/Control"),
            "http://192.168.1.20:1400/MediaServer/ContentDirectory/Control"
        );
        assert_eq!(
            resolve_control_url(location, "http://10.0.0.1/ctl"),
            "http://10.0.0.1/ctl"
        );
    }
}
