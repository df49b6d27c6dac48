use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("HTTP error calling {0}: {1}")]
    Http(String, String),
    #[error("Cannot build SOAP request for {0}: {1}")]
    SoapBuild(String, String),
    #[error("Soap Error: No envelope for action {0}")]
    SoapNoEnvelope(String),
    #[error("{0} returned UPnP error {1}: {2} (HTTP status {3})")]
    SoapUpnpFault(String, u32, String, u16),
    #[error("{0} failed with HTTP status {1} and body: {2}")]
    SoapActionWrongBody(String, u16, String),
    #[error("Missing {0} element in SOAP body")]
    UpnpMissingReturnValue(String),
    #[error("Invalid {0} value: {1}")]
    UpnpBadReturnValue(String, String),
    #[error("Invalid device description at {0}: {1}")]
    BadDescription(String, String),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("Discovery Error: {0}")]
    Discovery(String),
    #[error("Speaker '{0}' not found among discovered devices")]
    SpeakerNotFound(String),
}

impl ControlError {
    pub fn upnp_missing_return_value(value: &str) -> Self {
        ControlError::UpnpMissingReturnValue(value.to_string())
    }

    pub fn upnp_bad_return_value(name: &str, value: &str) -> Self {
        ControlError::UpnpBadReturnValue(name.to_string(), value.to_string())
    }

    pub fn http(target: &str, err: impl std::fmt::Display) -> Self {
        ControlError::Http(target.to_string(), err.to_string())
    }
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        ControlError::Discovery(err.to_string())
    }
}
