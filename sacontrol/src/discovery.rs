/*!
SSDP search for Sonos ZonePlayers.

The search socket binds an ephemeral port (`0.0.0.0:0`), never UDP 1900:
a control point only needs to send `M-SEARCH` and read the unicast
`HTTP/1.1 200 OK` replies.
*/

use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use crate::description::{DeviceDescription, fetch_description};
use crate::errors::ControlError;

pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";
pub const SSDP_PORT: u16 = 1900;

/// Search target answered by every Sonos player.
pub const ZONE_PLAYER_ST: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

const MSEARCH_MX: u32 = 1;
const RECV_POLL: Duration = Duration::from_millis(250);

/// One unicast answer to an `M-SEARCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub usn: String,
    pub st: String,
    pub location: String,
    pub server: String,
    pub from: SocketAddr,
}

/// A player found on the network, with its description.
#[derive(Debug, Clone)]
pub struct DiscoveredPlayer {
    pub location: String,
    pub description: DeviceDescription,
}

/// Sends `M-SEARCH` for `st` and collects answers until `timeout` expires.
///
/// Responses are de-duplicated by `LOCATION`.
pub fn search(st: &str, timeout: Duration) -> Result<Vec<SearchResponse>, ControlError> {
    let socket = search_socket()?;
    let target: SocketAddr = format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT)
        .parse()
        .map_err(|e| ControlError::Discovery(format!("bad multicast address: {}", e)))?;

    let msg = msearch_message(st, MSEARCH_MX);
    // UDP is lossy; a second datagram costs nothing.
    for _ in 0..2 {
        socket.send_to(msg.as_bytes(), target)?;
    }
    info!(st, ?timeout, "M-SEARCH sent");

    let deadline = Instant::now() + timeout;
    let mut seen = HashSet::new();
    let mut responses = Vec::new();
    let mut buf = [0u8; 8192];

    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                match parse_search_response(&data, from) {
                    Some(resp) if seen.insert(resp.location.clone()) => {
                        debug!(location = %resp.location, %from, "SSDP search response");
                        responses.push(resp);
                    }
                    Some(_) => {}
                    None => trace!(%from, "Ignoring SSDP datagram"),
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                warn!("SSDP read error: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(responses)
}

/// Finds the ZonePlayer whose room name is `room_name` (case-insensitive).
///
/// # Errors
/// [`ControlError::SpeakerNotFound`] when no answering player has that room name.
pub fn find_player(room_name: &str, timeout: Duration) -> Result<DiscoveredPlayer, ControlError> {
    let responses = search(ZONE_PLAYER_ST, timeout)?;
    info!(count = responses.len(), "ZonePlayers answered");

    for resp in responses {
        match fetch_description(&resp.location) {
            Ok(description) if description.room_name.eq_ignore_ascii_case(room_name) => {
                info!(room = %description.room_name, location = %resp.location, "Player found");
                return Ok(DiscoveredPlayer {
                    location: resp.location,
                    description,
                });
            }
            Ok(description) => {
                debug!(room = %description.room_name, "Skipping player");
            }
            Err(e) => {
                warn!(location = %resp.location, "Cannot read description: {}", e);
            }
        }
    }

    Err(ControlError::SpeakerNotFound(room_name.to_string()))
}

fn search_socket() -> Result<UdpSocket, ControlError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    let bind_addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], 0));
    socket.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(RECV_POLL))?;
    socket.set_multicast_ttl_v4(2)?;
    Ok(socket)
}

fn msearch_message(st: &str, mx: u32) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR,
        SSDP_PORT,
        mx.max(1),
        st
    )
}

/// Parses a unicast `HTTP/1.1 200 OK` search answer; anything else gives `None`.
pub fn parse_search_response(data: &str, from: SocketAddr) -> Option<SearchResponse> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim().to_ascii_uppercase();
    if !(first_line.starts_with("HTTP/") && first_line.contains(" 200")) {
        return None;
    }

    let headers = parse_headers(lines);
    Some(SearchResponse {
        usn: headers.get("USN").cloned().unwrap_or_default(),
        st: headers.get("ST").cloned().unwrap_or_default(),
        location: headers.get("LOCATION")?.clone(),
        server: headers.get("SERVER").cloned().unwrap_or_default(),
        from,
    })
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_uppercase(), value.trim().to_string()))
        })
        .collect()
}
