// Length-delimited framing for protocol messages.
//
// Every frame is a 4-byte big-endian length followed by that many bytes of
// JSON. `write_frame`/`read_frame` move raw bytes; `send`/`recv` add the
// serde step on top so callers deal in message enums. Errors are plain
// `io::Error`s: a JSON failure surfaces as `InvalidData`.
//
// Frames larger than `MAX_FRAME_SIZE` are refused on both sides so a bad
// length prefix cannot force a huge allocation. The join snapshot is the
// largest frame in practice.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest accepted frame body, 16 MB.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

fn too_large(len: usize, kind: io::ErrorKind) -> io::Error {
    io::Error::new(
        kind,
        format!("frame of {len} bytes exceeds limit of {MAX_FRAME_SIZE}"),
    )
}

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    let len = u32::try_from(body.len())
        .ok()
        .filter(|&len| len <= MAX_FRAME_SIZE)
        .ok_or_else(|| too_large(body.len(), io::ErrorKind::InvalidInput))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()
}

/// Read one frame. A stream that ends mid-frame yields `UnexpectedEof`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_SIZE {
        return Err(too_large(len as usize, io::ErrorKind::InvalidData));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Serialize `msg` as JSON and write it as one frame.
pub fn send<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let body = serde_json::to_vec(msg).map_err(io::Error::other)?;
    write_frame(writer, &body)
}

/// Read one frame and deserialize it.
pub fn recv<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let body = read_frame(reader)?;
    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_are_length_prefixed() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hamlet").unwrap();
        assert_eq!(&wire[..4], &[0, 0, 0, 6]);
        assert_eq!(&wire[4..], b"hamlet");
    }

    #[test]
    fn back_to_back_frames() {
        let mut wire = Vec::new();
        for body in [&b"one"[..], b"", b"three"] {
            write_frame(&mut wire, body).unwrap();
        }
        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"one");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"three");
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn refuses_oversized_frames() {
        let big = vec![0u8; MAX_FRAME_SIZE as usize + 1];
        let err = write_frame(&mut Vec::new(), &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let mut cursor = Cursor::new((MAX_FRAME_SIZE + 1).to_be_bytes().to_vec());
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_body_is_eof() {
        let mut wire = 10u32.to_be_bytes().to_vec();
        wire.extend_from_slice(b"short");
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_json_is_invalid_data() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"{not json").unwrap();
        let err = recv::<_, u64>(&mut Cursor::new(wire)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
