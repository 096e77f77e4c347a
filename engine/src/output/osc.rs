use crate::output::{PositionUpdate, WireSink};
use crate::EngineResult;
use animator_api::persistence::{Position, TrackId, WireFormat};
use rosc::{OscBundle, OscMessage, OscPacket, OscType};
use std::error::Error;
use std::net::{Ipv4Addr, SocketAddrV4, ToSocketAddrs, UdpSocket};

/// Converts a cartesian position to the spherical wire form.
///
/// Azimuth 0 is straight ahead (+y) and grows clockwise toward +x; elevation grows toward +z.
/// Both are in degrees, distance is in meters.
pub fn to_aed(position: Position) -> (f64, f64, f64) {
    let horizontal = (position.x * position.x + position.y * position.y).sqrt();
    let azimuth = position.x.atan2(position.y).to_degrees();
    let elevation = position.z.atan2(horizontal).to_degrees();
    let distance =
        (position.x * position.x + position.y * position.y + position.z * position.z).sqrt();
    (azimuth, elevation, distance)
}

fn message(address: String, args: Vec<OscType>) -> OscMessage {
    OscMessage { addr: address, args }
}

fn absolute_xyz(track: TrackId, position: Position) -> OscMessage {
    message(
        format!("/track/{track}/xyz"),
        vec![
            OscType::Float(position.x as f32),
            OscType::Float(position.y as f32),
            OscType::Float(position.z as f32),
        ],
    )
}

fn absolute_aed(track: TrackId, position: Position) -> OscMessage {
    let (azimuth, elevation, distance) = to_aed(position);
    message(
        format!("/track/{track}/aed"),
        vec![
            OscType::Float(azimuth as f32),
            OscType::Float(elevation as f32),
            OscType::Float(distance as f32),
        ],
    )
}

/// Per-axis incremental message: positive deltas go to the `+` address, negative ones to the
/// `-` address, always carrying the magnitude.
fn delta_message(track: TrackId, axis: &str, delta: f64) -> Option<OscMessage> {
    if delta == 0.0 {
        return None;
    }
    let sign = if delta > 0.0 { '+' } else { '-' };
    Some(message(
        format!("/track/{track}/{axis}{sign}"),
        vec![OscType::Float(delta.abs() as f32)],
    ))
}

/// Encodes one update into its wire messages.
///
/// `last_sent` is the previously sent position for this track, if any; incremental forms fall
/// back to an absolute message when there is none.
pub fn track_messages(update: &PositionUpdate, last_sent: Option<Position>) -> Vec<OscMessage> {
    let track = update.track;
    let position = update.position;
    match (update.format, last_sent) {
        (WireFormat::Xyz, _) | (WireFormat::XyzDelta, None) => vec![absolute_xyz(track, position)],
        (WireFormat::Aed, _) | (WireFormat::AedDelta, None) => vec![absolute_aed(track, position)],
        (WireFormat::XyzDelta, Some(last)) => {
            let delta = position - last;
            [
                delta_message(track, "x", delta.x),
                delta_message(track, "y", delta.y),
                delta_message(track, "z", delta.z),
            ]
            .into_iter()
            .flatten()
            .collect()
        }
        (WireFormat::AedDelta, Some(last)) => {
            let (azimuth, elevation, distance) = to_aed(position);
            let (last_azimuth, last_elevation, last_distance) = to_aed(last);
            [
                delta_message(track, "azim", azimuth - last_azimuth),
                delta_message(track, "elev", elevation - last_elevation),
                delta_message(track, "dist", distance - last_distance),
            ]
            .into_iter()
            .flatten()
            .collect()
        }
    }
}

/// Outbound OSC device: a connected nonblocking UDP socket.
#[derive(Debug)]
pub struct OscOutputDevice {
    socket: UdpSocket,
}

impl OscOutputDevice {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<OscOutputDevice, Box<dyn Error>> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_nonblocking(true)?;
        socket.connect(addr)?;
        Ok(OscOutputDevice { socket })
    }
}

impl WireSink for OscOutputDevice {
    fn send_batch(&mut self, messages: Vec<OscMessage>) -> EngineResult<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let bundle = OscBundle {
            // That should be "immediately" according to the OSC Time Tag spec.
            timetag: (0, 1).into(),
            content: messages.into_iter().map(OscPacket::Message).collect(),
        };
        let bytes = rosc::encoder::encode(&OscPacket::Bundle(bundle))
            .map_err(|_| "error trying to encode OSC bundle packet")?;
        self.socket
            .send(&bytes)
            .map_err(|_| "error trying to send OSC bundle packet")?;
        Ok(())
    }
}
