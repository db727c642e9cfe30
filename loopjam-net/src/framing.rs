//! Length-prefixed framing for TCP messages.
//!
//! Wire format: `[u32 length (big-endian)][JSON payload]`

use std::io::{self, Read, Write};

use serde::{de::DeserializeOwned, Serialize};

/// Frames larger than this are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serialize a message into a complete frame (header included).
///
/// Broadcasts encode once and write the same bytes to every connection.
pub fn encode_frame<T: Serialize>(msg: &T) -> io::Result<Vec<u8>> {
    let payload =
        serde_json::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes", payload.len()),
        ));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Write an already-encoded frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}

/// Write a length-prefixed JSON message to a stream.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let frame = encode_frame(msg)?;
    write_frame(writer, &frame)
}

/// Read one raw frame payload.
///
/// Errors here leave the stream position unknown; callers should drop the
/// connection.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Decode a frame payload. A failure here does not affect later frames.
pub fn decode_frame<T: DeserializeOwned>(payload: &[u8]) -> io::Result<T> {
    serde_json::from_slice(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read a length-prefixed JSON message from a stream.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let payload = read_frame(reader)?;
    decode_frame(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopjam_types::{LoopId, Message, PlayerId};
    use std::io::Cursor;

    #[test]
    fn message_survives_a_frame() {
        let msg = Message::LoopVolume {
            player_id: PlayerId::new("p1"),
            loop_id: LoopId::new("bass"),
            volume: 1.25,
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &msg).unwrap();
        assert_eq!(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize, buf.len() - 4);

        let mut cursor = Cursor::new(buf);
        let result: Message = read_message(&mut cursor).unwrap();
        assert_eq!(result, msg);
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Message::CreateSectionReset {}).unwrap();
        write_message(&mut buf, &Message::Unknown).unwrap();
        let mut cursor = Cursor::new(buf);
        let first: Message = read_message(&mut cursor).unwrap();
        let second: Message = read_message(&mut cursor).unwrap();
        assert_eq!(first, Message::CreateSectionReset {});
        assert_eq!(second, Message::Unknown);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut buf = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        let err = read_message::<_, Message>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn garbage_payload_is_invalid_data() {
        let payload = b"not json";
        let mut buf = (payload.len() as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(payload);
        let err = read_message::<_, Message>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_stream_is_eof() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Message::CreateSectionReset {}).unwrap();
        buf.truncate(buf.len() - 2);
        let err = read_message::<_, Message>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
