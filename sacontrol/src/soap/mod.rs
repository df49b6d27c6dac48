//! # SOAP envelopes for UPnP control
//!
//! Only the control-point side is needed here: building action requests and
//! reading the envelopes a device sends back (responses and faults).
//!
//! ```ignore
//! let xml = build_soap_request(
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "GetTransportInfo",
//!     &[("InstanceID", "0")],
//! )?;
//! ```

mod builder;
mod parser;

pub use builder::build_soap_request;
pub use parser::{SoapEnvelope, SoapParseError, UpnpFault, parse_soap_envelope, parse_upnp_fault};
