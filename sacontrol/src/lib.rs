pub mod alert;
pub mod avtransport_client;
pub mod capabilities;
pub mod content_directory_client;
pub mod description;
pub mod discovery;
pub mod errors;
pub mod model;
pub mod soap;
pub mod soap_client;
pub mod sonos;
pub mod time_utils;

pub use alert::{
    AlertController, AlertError, AlertPhase, AlertTimings, PlaybackSnapshot, RestoreAction,
};
pub use avtransport_client::{AvTransportClient, TransportInfo};
pub use capabilities::{
    MediaSource, PlaybackPosition, PlaybackState, PlaybackStatus, QueueControl, SpeakerControl,
    TransportControl,
};
pub use content_directory_client::{BrowseCount, ContentDirectoryClient};
pub use description::DeviceDescription;
pub use discovery::{DiscoveredPlayer, SearchResponse};
pub use errors::ControlError;
pub use model::{MediaInfo, PositionInfo};
pub use sonos::{SONOS_PORT, SonosSpeaker};
