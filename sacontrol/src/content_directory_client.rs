use xmltree::Element;

use crate::errors::ControlError;
use crate::soap_client::{action_response, extract_child_text, invoke_upnp_action};

pub const CONTENT_DIRECTORY_SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Object ID of the speaker's own play queue.
pub const QUEUE_OBJECT_ID: &str = "Q:0";

#[derive(Debug, Clone)]
pub struct ContentDirectoryClient {
    pub control_url: String,
    pub service_type: String,
}

/// Counters of a ContentDirectory Browse answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowseCount {
    pub number_returned: u32,
    pub total_matches: u32,
}

impl ContentDirectoryClient {
    pub fn new(control_url: String, service_type: String) -> Self {
        Self {
            control_url,
            service_type,
        }
    }

    /// ContentDirectory:1: Browse (BrowseDirectChildren), counters only.
    pub fn browse_count(
        &self,
        object_id: &str,
        requested_count: u32,
    ) -> Result<BrowseCount, ControlError> {
        let requested_count_str = requested_count.to_string();
        let args = [
            ("ObjectID", object_id),
            ("BrowseFlag", "BrowseDirectChildren"),
            ("Filter", "dc:title"),
            ("StartingIndex", "0"),
            ("RequestedCount", requested_count_str.as_str()),
            ("SortCriteria", ""),
        ];

        let call_result =
            invoke_upnp_action(&self.control_url, &self.service_type, "Browse", &args)?;
        let response = action_response("Browse", &call_result)?;
        parse_browse_count(response)
    }
}

fn parse_browse_count(response: &Element) -> Result<BrowseCount, ControlError> {
    Ok(BrowseCount {
        number_returned: parse_count(response, "NumberReturned")?,
        total_matches: parse_count(response, "TotalMatches")?,
    })
}

fn parse_count(response: &Element, name: &str) -> Result<u32, ControlError> {
    let text = extract_child_text(response, name)?;
    text.parse::<u32>()
        .map_err(|_| ControlError::upnp_bad_return_value(name, &text))
}
