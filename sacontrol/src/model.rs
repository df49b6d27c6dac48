use std::io::BufReader;

use xmltree::Element;

use crate::soap_client::find_child_with_suffix;

/// Values of AVTransport::GetPositionInfo.
#[derive(Clone, Debug, Default)]
pub struct PositionInfo {
    /// 1-based index of the current item in the queue, 0 when not playing from it.
    pub track: u32,
    pub track_duration: Option<String>,
    /// DIDL-Lite XML describing the current track.
    pub track_metadata: Option<String>,
    pub track_uri: Option<String>,
    pub rel_time: Option<String>,
}

impl PositionInfo {
    /// Title and artist read from the DIDL-Lite metadata, when present.
    pub fn title_artist(&self) -> (Option<String>, Option<String>) {
        self.track_metadata
            .as_deref()
            .map(didl_title_artist)
            .unwrap_or((None, None))
    }
}

/// Values of AVTransport::GetMediaInfo.
#[derive(Clone, Debug, Default)]
pub struct MediaInfo {
    pub current_uri: String,
    /// Opaque DIDL-Lite blob, passed back verbatim when resuming.
    pub current_uri_metadata: String,
}

/// Extracts `dc:title` and `dc:creator` from the first item of a DIDL-Lite document.
pub fn didl_title_artist(didl: &str) -> (Option<String>, Option<String>) {
    let Ok(root) = Element::parse(BufReader::new(didl.as_bytes())) else {
        return (None, None);
    };

    let Some(item) = find_child_with_suffix(&root, "item") else {
        return (None, None);
    };

    let text = |name: &str| {
        find_child_with_suffix(item, name)
            .and_then(|e| e.get_text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    };

    (text("title"), text("creator"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_artist_come_from_didl() {
        let didl = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"><item id="-1" parentID="-1" restricted="true"><res protocolInfo="http-get:*:audio/mpeg:*" duration="0:03:18">http://nas/song.mp3</res><dc:title>Blue in Green</dc:title><dc:creator>Miles Davis</dc:creator><upnp:class>object.item.audioItem.musicTrack</upnp:class></item></DIDL-Lite>"#;

        let (title, artist) = didl_title_artist(didl);
        assert_eq!(title.as_deref(), Some("Blue in Green"));
        assert_eq!(artist.as_deref(), Some("Miles Davis"));
    }

    #[test]
    fn garbage_metadata_yields_nothing() {
        assert_eq!(didl_title_artist("NOT_IMPLEMENTED"), (None, None));
        assert_eq!(didl_title_artist(""), (None, None));
    }
}
