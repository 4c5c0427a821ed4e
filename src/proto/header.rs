//! The fixed 12-byte frame header

use super::{MessageType, ProtocolError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

pub const HEADER_LEN: usize = 12;

/// ```text
/// offset size field
/// 0      1    type
/// 1      1    reserved (0)
/// 2      2    payload_size
/// 4      4    timestamp_sec
/// 8      4    timestamp_nsec
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub msg_type: MessageType,
    pub payload_size: u16,
    pub timestamp_sec: u32,
    pub timestamp_nsec: u32,
}

impl Header {
    /// Build a header for an outbound message stamped with the current wall
    /// clock, the way a producer timestamps its own packets.
    pub fn now(msg_type: MessageType, payload_size: u16) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            msg_type,
            payload_size,
            timestamp_sec: now.as_secs() as u32,
            timestamp_nsec: now.subsec_nanos(),
        }
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        let msg_type = map_eof(r.read_u8())?;
        let msg_type = MessageType::from_u8(msg_type)?;
        let _reserved = map_eof(r.read_u8())?;
        let payload_size = map_eof(r.read_u16::<BigEndian>())?;
        let timestamp_sec = map_eof(r.read_u32::<BigEndian>())?;
        let timestamp_nsec = map_eof(r.read_u32::<BigEndian>())?;
        Ok(Self {
            msg_type,
            payload_size,
            timestamp_sec,
            timestamp_nsec,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u8(self.msg_type as u8)?;
        w.write_u8(0)?;
        w.write_u16::<BigEndian>(self.payload_size)?;
        w.write_u32::<BigEndian>(self.timestamp_sec)?;
        w.write_u32::<BigEndian>(self.timestamp_nsec)?;
        Ok(())
    }
}

/// Distinguish "peer closed the connection cleanly" from a genuine I/O error,
/// so [`super::ProtocolError::PeerClosed`] maps to an ordinary session
/// unwind rather than a logged failure.
fn map_eof<T>(result: std::io::Result<T>) -> Result<T, ProtocolError> {
    result.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::PeerClosed
        } else {
            ProtocolError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_buffer() {
        let header = Header {
            msg_type: MessageType::Buy,
            payload_size: 8,
            timestamp_sec: 42,
            timestamp_nsec: 7,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);

        let mut cursor = std::io::Cursor::new(buf);
        let read_back = Header::read_from(&mut cursor).unwrap();
        assert_eq!(read_back.msg_type, MessageType::Buy);
        assert_eq!(read_back.payload_size, 8);
        assert_eq!(read_back.timestamp_sec, 42);
        assert_eq!(read_back.timestamp_nsec, 7);
    }

    #[test]
    fn short_read_reports_peer_closed() {
        let buf: [u8; 3] = [MessageType::Ack as u8, 0, 0];
        let mut cursor = std::io::Cursor::new(buf);
        let err = Header::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::PeerClosed));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let buf: [u8; HEADER_LEN] = [255, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut cursor = std::io::Cursor::new(buf);
        let err = Header::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPacket(_)));
    }
}
