//! Handshake framing and length-prefixed vector helpers.

use super::HandshakeType;
use legatls_types::TlsError;

/// Handshake header length: `msg_type(1) || length(3)`.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Upper bound on a single handshake message body.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 1 << 17;

/// Parse a handshake header.
///
/// Returns `Ok(None)` while fewer than `4 + length` bytes are buffered,
/// otherwise the raw type byte, the body and the total bytes consumed.
pub fn parse_handshake_header(data: &[u8]) -> Result<Option<(u8, &[u8], usize)>, TlsError> {
    if data.len() < HANDSHAKE_HEADER_LEN {
        return Ok(None);
    }
    let length = u32::from_be_bytes([0, data[1], data[2], data[3]]) as usize;
    if length > MAX_HANDSHAKE_MESSAGE_LEN {
        return Err(TlsError::DecodeError(format!(
            "handshake message of {length} bytes is too large"
        )));
    }
    if data.len() < HANDSHAKE_HEADER_LEN + length {
        return Ok(None);
    }
    Ok(Some((
        data[0],
        &data[HANDSHAKE_HEADER_LEN..HANDSHAKE_HEADER_LEN + length],
        HANDSHAKE_HEADER_LEN + length,
    )))
}

/// Wrap a body in a handshake header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LEN + body.len());
    out.push(msg_type as u8);
    put_u24(&mut out, body.len());
    out.extend_from_slice(body);
    out
}

pub(crate) fn put_u24(out: &mut Vec<u8>, v: usize) {
    let b = (v as u32).to_be_bytes();
    out.extend_from_slice(&b[1..]);
}

pub(crate) fn put_vec8(out: &mut Vec<u8>, data: &[u8]) {
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

pub(crate) fn put_vec16(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

pub(crate) fn put_vec24(out: &mut Vec<u8>, data: &[u8]) {
    put_u24(out, data.len());
    out.extend_from_slice(data);
}

/// Cursor over a message body. Every read failure is a `DecodeError`.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    fn short(&self) -> TlsError {
        TlsError::DecodeError(format!("{} truncated", self.what))
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        if self.data.len() - self.pos < n {
            return Err(self.short());
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, TlsError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, TlsError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u24(&mut self) -> Result<usize, TlsError> {
        let b = self.bytes(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]) as usize)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], TlsError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn vec8(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u8()? as usize;
        self.bytes(n)
    }

    pub(crate) fn vec16(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u16()? as usize;
        self.bytes(n)
    }

    pub(crate) fn vec24(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u24()?;
        self.bytes(n)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Fail unless every byte was consumed.
    pub(crate) fn finish(&self) -> Result<(), TlsError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TlsError::DecodeError(format!(
                "{} has {} trailing bytes",
                self.what,
                self.data.len() - self.pos
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_and_parse_header() {
        let msg = wrap_handshake(HandshakeType::Finished, &[9; 12]);
        assert_eq!(&msg[..4], &[20, 0, 0, 12]);
        let (t, body, total) = parse_handshake_header(&msg).unwrap().unwrap();
        assert_eq!(t, 20);
        assert_eq!(body, &[9; 12]);
        assert_eq!(total, 16);
    }

    #[test]
    fn test_parse_header_needs_full_body() {
        let msg = wrap_handshake(HandshakeType::Certificate, &[1; 300]);
        assert!(parse_handshake_header(&msg[..3]).unwrap().is_none());
        assert!(parse_handshake_header(&msg[..303]).unwrap().is_none());
        assert!(parse_handshake_header(&msg).unwrap().is_some());
    }

    #[test]
    fn test_oversized_message_rejected() {
        assert!(matches!(
            parse_handshake_header(&[11, 0xff, 0xff, 0xff]),
            Err(TlsError::DecodeError(_))
        ));
    }

    #[test]
    fn test_reader_vectors() {
        let mut buf = Vec::new();
        put_vec8(&mut buf, b"ab");
        put_vec16(&mut buf, b"cde");
        put_vec24(&mut buf, b"f");
        buf.push(7);
        let mut r = Reader::new(&buf, "test");
        assert_eq!(r.vec8().unwrap(), b"ab");
        assert_eq!(r.vec16().unwrap(), b"cde");
        assert_eq!(r.vec24().unwrap(), b"f");
        assert!(r.finish().is_err());
        assert_eq!(r.u8().unwrap(), 7);
        r.finish().unwrap();
        assert!(matches!(r.u16(), Err(TlsError::DecodeError(_))));
    }

    #[test]
    fn test_reader_truncated_vector() {
        let mut r = Reader::new(&[0, 5, 1, 2], "body");
        let err = r.vec16().unwrap_err();
        assert_eq!(err.to_string(), "decode error: body truncated");
    }
}
