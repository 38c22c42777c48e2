use bytes::{Buf, BufMut, BytesMut};
use std::{io, str};
use tokio_util::codec::{Decoder, Encoder};

use super::response::Response;
use crate::proto::command::Command;

/// Line terminator used in both directions.
pub const EOL: &[u8] = b"\r\n";

/// Frames commands as `<command>\r\n` and splits responses at line ends.
#[derive(Default)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    fn convert_string(payload: impl AsRef<[u8]>) -> io::Result<String> {
        Ok(str::from_utf8(payload.as_ref())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            .trim()
            .to_string())
    }
}

impl Decoder for ProtocolCodec {
    type Item = Response;
    // Receiving "cmd err" or the like is a successful decode. Deciding if
    // this should be returned as an error is up to the device.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(n) = src.iter().position(|b| *b == b'\n') else {
                return Ok(None);
            };
            let line = src.split_to(n + 1);
            let line = Self::convert_string(&line[..n])?;
            // Stray terminators between responses.
            if line.is_empty() {
                continue;
            }
            return Ok(Some(Response::classify(&line)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(response) => Ok(Some(response)),
            None if src.iter().all(u8::is_ascii_whitespace) => {
                src.advance(src.len());
                Ok(None)
            }
            None => {
                let line = Self::convert_string(src.split())?;
                Ok(Some(Response::classify(&line)))
            }
        }
    }
}

impl Encoder<Command> for ProtocolCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        if line.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Command contains a line terminator: {:?}", line),
            ));
        }
        dst.reserve(line.len() + EOL.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(EOL);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SecondaryMode;

    #[test]
    fn encode_appends_terminator() {
        let mut dst = BytesMut::new();
        ProtocolCodec
            .encode(Command::SetSecondary(SecondaryMode::Theta), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"FUNC:IMP:B THR\r\n");
    }

    #[test]
    fn encode_rejects_embedded_terminator() {
        let mut dst = BytesMut::new();
        assert!(ProtocolCodec
            .encode(Command::Raw("FREQ 100\r\nVOLT 10".into()), &mut dst)
            .is_err());
        assert!(dst.is_empty());
    }

    #[test]
    fn decode_waits_for_full_line() {
        let mut src = BytesMut::from(&b"exec suc"[..]);
        assert_eq!(ProtocolCodec.decode(&mut src).unwrap(), None);
        src.extend_from_slice(b"cess\r\n1.5,2\r\n");
        assert_eq!(
            ProtocolCodec.decode(&mut src).unwrap(),
            Some(Response::Success)
        );
        assert_eq!(
            ProtocolCodec.decode(&mut src).unwrap(),
            Some(Response::Payload("1.5,2".into()))
        );
        assert!(src.is_empty());
    }

    #[test]
    fn decode_skips_empty_lines() {
        let mut src = BytesMut::from(&b"\r\n\r\ncmd err\r\n"[..]);
        assert_eq!(
            ProtocolCodec.decode(&mut src).unwrap(),
            Some(Response::UnknownCommand)
        );
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let mut src = BytesMut::from(&b"\xff\xfe\r\n"[..]);
        assert!(ProtocolCodec.decode(&mut src).is_err());
    }
}
