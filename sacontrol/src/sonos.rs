use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{debug, info};

use crate::avtransport_client::{AVTRANSPORT_SERVICE_TYPE, AvTransportClient};
use crate::capabilities::{
    MediaSource, PlaybackPosition, PlaybackState, PlaybackStatus, QueueControl, TransportControl,
};
use crate::content_directory_client::{
    CONTENT_DIRECTORY_SERVICE_TYPE, ContentDirectoryClient, QUEUE_OBJECT_ID,
};
use crate::description::{DeviceDescription, fetch_description, resolve_control_url};
use crate::discovery::find_player;
use crate::errors::ControlError;
use crate::model::{MediaInfo, PositionInfo};

/// HTTP port of the UPnP services on every Sonos player.
pub const SONOS_PORT: u16 = 1400;

const DESCRIPTION_PATH: &str = "/xml/device_description.xml";
const AVTRANSPORT_CONTROL_PATH: &str = "/MediaRenderer/AVTransport/Control";
const CONTENT_DIRECTORY_CONTROL_PATH: &str = "/MediaServer/ContentDirectory/Control";

/// Handle on one Sonos player, built once at startup.
#[derive(Clone, Debug)]
pub struct SonosSpeaker {
    location: String,
    description: DeviceDescription,
    avtransport: AvTransportClient,
    content_directory: ContentDirectoryClient,
}

impl SonosSpeaker {
    /// Connects to `player`, which is either an address (`192.168.1.20`,
    /// `192.168.1.20:1400`) or a room name looked up with SSDP.
    ///
    /// # Errors
    /// [`ControlError::SpeakerNotFound`] when a room name is not answered by any player,
    /// or the HTTP error of the description fetch.
    pub fn resolve(player: &str, discovery_timeout: Duration) -> Result<Self, ControlError> {
        match parse_player_address(player) {
            Some(addr) => Self::connect(addr),
            None => {
                info!(room = player, "Looking up Sonos player by room name");
                let found = find_player(player, discovery_timeout)?;
                Ok(Self::from_description(found.location, found.description))
            }
        }
    }

    /// Connects directly to the player at `addr`.
    pub fn connect(addr: SocketAddr) -> Result<Self, ControlError> {
        let location = format!("http://{}{}", addr, DESCRIPTION_PATH);
        let description = fetch_description(&location)?;
        Ok(Self::from_description(location, description))
    }

    pub fn from_description(location: String, description: DeviceDescription) -> Self {
        let avtransport = AvTransportClient::new(
            resolve_control_url(&location, AVTRANSPORT_CONTROL_PATH),
            AVTRANSPORT_SERVICE_TYPE.to_string(),
        );
        let content_directory = ContentDirectoryClient::new(
            resolve_control_url(&location, CONTENT_DIRECTORY_CONTROL_PATH),
            CONTENT_DIRECTORY_SERVICE_TYPE.to_string(),
        );

        debug!(room = %description.room_name, uid = description.uid(), "Sonos speaker ready");

        Self {
            location,
            description,
            avtransport,
            content_directory,
        }
    }

    pub fn room_name(&self) -> &str {
        &self.description.room_name
    }

    pub fn uid(&self) -> &str {
        self.description.uid()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn queue_uri(&self) -> String {
        format!("x-rincon-queue:{}#0", self.uid())
    }
}

/// `ip` or `ip:port`; anything else is a room name.
pub fn parse_player_address(player: &str) -> Option<SocketAddr> {
    let player = player.trim();
    if let Ok(addr) = player.parse::<SocketAddr>() {
        return Some(addr);
    }
    player
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, SONOS_PORT))
}

impl PlaybackStatus for SonosSpeaker {
    fn playback_state(&self) -> Result<PlaybackState, ControlError> {
        let info = self.avtransport.get_transport_info(0)?;
        Ok(PlaybackState::from_upnp_state(&info.current_transport_state))
    }
}

impl PlaybackPosition for SonosSpeaker {
    fn playback_position(&self) -> Result<PositionInfo, ControlError> {
        self.avtransport.get_position_info(0)
    }
}

impl MediaSource for SonosSpeaker {
    fn media_info(&self) -> Result<MediaInfo, ControlError> {
        self.avtransport.get_media_info(0)
    }
}

impl TransportControl for SonosSpeaker {
    fn play_uri(&self, uri: &str, meta: &str) -> Result<(), ControlError> {
        self.avtransport.set_av_transport_uri(uri, meta)?;
        self.avtransport.play(0, "1")
    }

    fn seek_rel_time(&self, hhmmss: &str) -> Result<(), ControlError> {
        self.avtransport.seek(0, "REL_TIME", hhmmss)
    }
}

impl QueueControl for SonosSpeaker {
    fn queue_len(&self) -> Result<usize, ControlError> {
        let count = self.content_directory.browse_count(QUEUE_OBJECT_ID, 1)?;
        Ok(count.total_matches as usize)
    }

    fn play_from_queue(&self, index: usize) -> Result<(), ControlError> {
        // The transport has to be switched back to the queue before TRACK_NR means anything.
        self.avtransport.set_av_transport_uri(&self.queue_uri(), "")?;
        self.avtransport
            .seek(0, "TRACK_NR", &(index + 1).to_string())?;
        self.avtransport.play(0, "1")
    }
}
