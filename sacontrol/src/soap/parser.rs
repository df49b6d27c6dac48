//! SOAP envelope parsing for action responses

use std::io::BufReader;
use xmltree::{Element, XMLNode};

/// Complete SOAP envelope as returned by a device.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Raw XML content of the Body element.
    pub body: Element,
}

/// UPnP error carried in a SOAP Fault detail.
#[derive(Debug, Clone)]
pub struct UpnpFault {
    pub error_code: u32,
    pub error_description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,
}

/// Parses a full SOAP envelope.
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let reader = BufReader::new(xml);
    let root = Element::parse(reader)?;

    if !root.name.ends_with("Envelope") {
        return Err(SoapParseError::MissingEnvelope);
    }

    let body = root
        .children
        .iter()
        .find_map(|n| n.as_element().filter(|e| e.name.ends_with("Body")))
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope { body: body.clone() })
}

/// Extracts the UPnPError of a SOAP Fault, if the body holds one.
pub fn parse_upnp_fault(envelope: &SoapEnvelope) -> Option<UpnpFault> {
    let fault = child_with_suffix(&envelope.body, "Fault")?;
    let detail = child_with_suffix(fault, "detail")?;
    let upnp_error = child_with_suffix(detail, "UPnPError")?;

    let error_code = child_with_suffix(upnp_error, "errorCode")
        .and_then(|e| e.get_text())
        .and_then(|t| t.trim().parse::<u32>().ok())?;
    let error_description = child_with_suffix(upnp_error, "errorDescription")
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    Some(UpnpFault {
        error_code,
        error_description,
    })
}

fn child_with_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_body() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:GetTransportInfoResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
      <CurrentTransportState>PLAYING</CurrentTransportState>
    </u:GetTransportInfoResponse>
  </s:Body>
</s:Envelope>"#;

        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        assert!(child_with_suffix(&envelope.body, "GetTransportInfoResponse").is_some());
        assert!(parse_upnp_fault(&envelope).is_none());
    }

    #[test]
    fn parses_upnp_fault() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>701</errorCode>
          <errorDescription>Transition not available</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        let fault = parse_upnp_fault(&envelope).unwrap();
        assert_eq!(fault.error_code, 701);
        assert_eq!(fault.error_description, "Transition not available");
    }

    #[test]
    fn rejects_non_envelope() {
        let err = parse_soap_envelope(b"<html><body/></html>").unwrap_err();
        assert!(matches!(err, SoapParseError::MissingEnvelope));
    }
}
