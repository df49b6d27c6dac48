use tracing::debug;
use xmltree::Element;

use crate::errors::ControlError;
use crate::model::{MediaInfo, PositionInfo};
use crate::soap_client::{
    SoapCallResult, action_response, extract_child_text, extract_optional_child_text,
    handle_action_response, invoke_upnp_action,
};

pub const AVTRANSPORT_SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:AVTransport:1";

#[derive(Debug, Clone)]
pub struct AvTransportClient {
    pub control_url: String,
    pub service_type: String,
}

#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub current_transport_state: String,
    pub current_transport_status: String,
    pub current_speed: String,
}

impl AvTransportClient {
    pub fn new(control_url: String, service_type: String) -> Self {
        Self {
            control_url,
            service_type,
        }
    }

    fn call(&self, action: &str, args: &[(&str, &str)]) -> Result<SoapCallResult, ControlError> {
        invoke_upnp_action(&self.control_url, &self.service_type, action, args)
    }

    /// AVTransport:1: GetTransportInfo
    pub fn get_transport_info(&self, instance_id: u32) -> Result<TransportInfo, ControlError> {
        let instance_id_str = instance_id.to_string();
        let call_result =
            self.call("GetTransportInfo", &[("InstanceID", instance_id_str.as_str())])?;
        let response = action_response("GetTransportInfo", &call_result)?;
        parse_transport_info(response)
    }

    /// AVTransport:1: GetPositionInfo
    pub fn get_position_info(&self, instance_id: u32) -> Result<PositionInfo, ControlError> {
        let instance_id_str = instance_id.to_string();
        let call_result =
            self.call("GetPositionInfo", &[("InstanceID", instance_id_str.as_str())])?;
        let response = action_response("GetPositionInfo", &call_result)?;
        let info = parse_position_info(response)?;

        debug!(
            track = info.track,
            duration = ?info.track_duration,
            rel_time = ?info.rel_time,
            "GetPositionInfo"
        );
        Ok(info)
    }

    /// AVTransport:1: GetMediaInfo
    pub fn get_media_info(&self, instance_id: u32) -> Result<MediaInfo, ControlError> {
        let instance_id_str = instance_id.to_string();
        let call_result =
            self.call("GetMediaInfo", &[("InstanceID", instance_id_str.as_str())])?;
        let response = action_response("GetMediaInfo", &call_result)?;
        parse_media_info(response)
    }

    /// AVTransport:1: SetAVTransportURI
    pub fn set_av_transport_uri(&self, uri: &str, meta: &str) -> Result<(), ControlError> {
        let call_result = self.call(
            "SetAVTransportURI",
            &[
                ("InstanceID", "0"),
                ("CurrentURI", uri),
                ("CurrentURIMetaData", meta),
            ],
        )?;
        handle_action_response("SetAVTransportURI", &call_result)
    }

    /// AVTransport:1: Play
    pub fn play(&self, instance_id: u32, speed: &str) -> Result<(), ControlError> {
        let instance_id_str = instance_id.to_string();
        let call_result = self.call(
            "Play",
            &[("InstanceID", instance_id_str.as_str()), ("Speed", speed)],
        )?;
        handle_action_response("Play", &call_result)
    }

    /// AVTransport:1: Seek
    ///
    /// `unit` is `REL_TIME` (target `H:MM:SS`) or `TRACK_NR` (1-based queue index).
    pub fn seek(&self, instance_id: u32, unit: &str, target: &str) -> Result<(), ControlError> {
        let instance_id_str = instance_id.to_string();
        let call_result = self.call(
            "Seek",
            &[
                ("InstanceID", instance_id_str.as_str()),
                ("Unit", unit),
                ("Target", target),
            ],
        )?;
        handle_action_response("Seek", &call_result)
    }
}

fn parse_transport_info(response: &Element) -> Result<TransportInfo, ControlError> {
    Ok(TransportInfo {
        current_transport_state: extract_child_text(response, "CurrentTransportState")?,
        current_transport_status: extract_child_text(response, "CurrentTransportStatus")?,
        current_speed: extract_child_text(response, "CurrentSpeed")?,
    })
}

fn parse_position_info(response: &Element) -> Result<PositionInfo, ControlError> {
    let track_text = extract_child_text(response, "Track")?;
    let track = track_text
        .parse::<u32>()
        .map_err(|_| ControlError::upnp_bad_return_value("Track", &track_text))?;

    Ok(PositionInfo {
        track,
        track_duration: extract_optional_child_text(response, "TrackDuration"),
        track_metadata: extract_optional_child_text(response, "TrackMetaData"),
        track_uri: extract_optional_child_text(response, "TrackURI"),
        rel_time: extract_optional_child_text(response, "RelTime"),
    })
}

fn parse_media_info(response: &Element) -> Result<MediaInfo, ControlError> {
    Ok(MediaInfo {
        current_uri: extract_child_text(response, "CurrentURI")?,
        current_uri_metadata: extract_child_text(response, "CurrentURIMetaData")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmltree::XMLNode;

    fn response(name: &str, fields: &[(&str, &str)]) -> Element {
        let mut response = Element::new(name);
        for (field, text) in fields {
            let mut elem = Element::new(field);
            if !text.is_empty() {
                elem.children.push(XMLNode::Text(text.to_string()));
            }
            response.children.push(XMLNode::Element(elem));
        }
        response
    }

    #[test]
    fn parse_transport_info_extracts_fields() {
        let response = response(
            "GetTransportInfoResponse",
            &[
                ("CurrentTransportState", "STOPPED"),
                ("CurrentTransportStatus", "OK"),
                ("CurrentSpeed", "1"),
            ],
        );

        let info = parse_transport_info(&response).unwrap();
        assert_eq!(info.current_transport_state, "STOPPED");
        assert_eq!(info.current_transport_status, "OK");
        assert_eq!(info.current_speed, "1");
    }

    #[test]
    fn parse_position_info_keeps_queue_track_and_times() {
        let response = response(
            "GetPositionInfoResponse",
            &[
                ("Track", "5"),
                ("TrackDuration", "0:04:12"),
                ("TrackMetaData", ""),
                ("TrackURI", "x-file-cifs://nas/music/song.flac"),
                ("RelTime", "0:01:30"),
                ("AbsTime", "NOT_IMPLEMENTED"),
            ],
        );

        let info = parse_position_info(&response).unwrap();
        assert_eq!(info.track, 5);
        assert_eq!(info.track_duration.as_deref(), Some("0:04:12"));
        assert_eq!(info.track_metadata, None);
        assert_eq!(info.track_uri.as_deref(), Some("x-file-cifs://nas/music/song.flac"));
        assert_eq!(info.rel_time.as_deref(), Some("0:01:30"));
    }

    #[test]
    fn parse_position_info_rejects_bad_track() {
        let response = response("GetPositionInfoResponse", &[("Track", "first")]);
        assert!(matches!(
            parse_position_info(&response),
            Err(ControlError::UpnpBadReturnValue(_, _))
        ));
    }

    #[test]
    fn parse_media_info_keeps_metadata_verbatim() {
        let meta =
            r#"<DIDL-Lite><item id="R:0/0/1"><dc:title>Station</dc:title></item></DIDL-Lite>"#;
        let response = response(
            "GetMediaInfoResponse",
            &[
                ("NrTracks", "1"),
                ("CurrentURI", "x-sonosapi-radio:station?sid=236"),
                ("CurrentURIMetaData", meta),
            ],
        );

        let info = parse_media_info(&response).unwrap();
        assert_eq!(info.current_uri, "x-sonosapi-radio:station?sid=236");
        assert_eq!(info.current_uri_metadata, meta);
    }
}
