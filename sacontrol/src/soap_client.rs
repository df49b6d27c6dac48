use std::time::Duration;

use tracing::trace;
use ureq::Agent;
use xmltree::{Element, XMLNode};

use crate::errors::ControlError;
use crate::soap::{SoapEnvelope, build_soap_request, parse_soap_envelope, parse_upnp_fault};

const SOAP_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a SOAP call:
/// - HTTP status code
/// - raw XML body (always)
/// - parsed SOAP envelope if parsing succeeded
pub struct SoapCallResult {
    pub status: u16,
    pub raw_body: String,
    pub envelope: Option<SoapEnvelope>,
}

/// Builds the HTTP agent shared by SOAP calls and description fetches.
///
/// 4xx/5xx are not turned into errors: a SOAP Fault comes back as HTTP 500
/// and its body is what tells us what went wrong.
pub(crate) fn http_agent() -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(SOAP_HTTP_TIMEOUT))
        .build()
        .into()
}

/// Invoke a UPnP SOAP action on a control URL.
///
/// - `control_url`: full HTTP URL of the service control endpoint
/// - `service_type`: service URN, e.g. "urn:schemas-upnp-org:service:AVTransport:1"
/// - `action`: action name, e.g. "GetTransportInfo"
/// - `args`: list of (name, value) pairs, e.g. &[("InstanceID", "0")]
pub fn invoke_upnp_action(
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<SoapCallResult, ControlError> {
    let body_xml = build_soap_request(service_type, action, args)
        .map_err(|e| ControlError::SoapBuild(action.to_string(), e.to_string()))?;

    let soap_action_header = format!(r#""{}#{}""#, service_type, action);
    trace!(action, control_url, "Sending SOAP request");

    let mut response = http_agent()
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPAction", &soap_action_header)
        .send(body_xml)
        .map_err(|e| ControlError::http(control_url, e))?;

    let status = response.status().as_u16();
    let raw_body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ControlError::http(control_url, e))?;

    // A body that is not SOAP still leaves status + raw_body to report.
    let envelope = parse_soap_envelope(raw_body.as_bytes()).ok();

    Ok(SoapCallResult {
        status,
        raw_body,
        envelope,
    })
}

/// Fails with the UPnP fault (or the raw body) when the call did not succeed.
pub fn ensure_success(action: &str, call_result: &SoapCallResult) -> Result<(), ControlError> {
    if (200..300).contains(&call_result.status) {
        return Ok(());
    }

    if let Some(fault) = call_result.envelope.as_ref().and_then(parse_upnp_fault) {
        return Err(ControlError::SoapUpnpFault(
            action.to_string(),
            fault.error_code,
            fault.error_description,
            call_result.status,
        ));
    }

    Err(ControlError::SoapActionWrongBody(
        action.to_string(),
        call_result.status,
        call_result.raw_body.chars().take(512).collect(),
    ))
}

/// Checks a call that returns no value.
pub fn handle_action_response(
    action: &str,
    call_result: &SoapCallResult,
) -> Result<(), ControlError> {
    ensure_success(action, call_result)
}

/// Returns the `<ActionResponse>` element of a successful call.
pub fn action_response<'a>(
    action: &str,
    call_result: &'a SoapCallResult,
) -> Result<&'a Element, ControlError> {
    ensure_success(action, call_result)?;

    let envelope = call_result
        .envelope
        .as_ref()
        .ok_or_else(|| ControlError::SoapNoEnvelope(action.to_string()))?;

    let response_name = format!("{}Response", action);
    find_child_with_suffix(&envelope.body, &response_name)
        .ok_or_else(|| ControlError::upnp_missing_return_value(&response_name))
}

pub fn find_child_with_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}

/// Text of a mandatory child element, trimmed. Empty text is returned as "".
pub fn extract_child_text(parent: &Element, name: &str) -> Result<String, ControlError> {
    let child = find_child_with_suffix(parent, name)
        .ok_or_else(|| ControlError::upnp_missing_return_value(name))?;

    Ok(child
        .get_text()
        .map(|t| t.trim().to_string())
        .unwrap_or_default())
}

/// Text of an optional child element; missing or empty gives `None`.
pub fn extract_optional_child_text(parent: &Element, name: &str) -> Option<String> {
    find_child_with_suffix(parent, name)
        .and_then(|child| child.get_text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
