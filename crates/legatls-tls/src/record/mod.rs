//! Record layer framing: `type(1) || version(2) || length(2) || fragment`.

pub mod encryption;

use legatls_types::TlsError;

/// Maximum plaintext fragment length (2^14).
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;
/// Maximum ciphertext fragment length (2^14 + 2048).
pub const MAX_CIPHERTEXT_LENGTH: usize = MAX_PLAINTEXT_LENGTH + 2048;
/// Record header length.
pub const RECORD_HEADER_LEN: usize = 5;

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            _ => Err(v),
        }
    }
}

/// A framed record. The fragment is ciphertext or plaintext depending on
/// which side of the cipher state it is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: u16,
    pub fragment: Vec<u8>,
}

/// Parse one record from the front of `data`.
///
/// Returns `Ok(None)` when `data` does not yet hold a full record, otherwise
/// the record and the number of bytes it occupied.
pub fn parse_record(data: &[u8]) -> Result<Option<(Record, usize)>, TlsError> {
    if data.len() < RECORD_HEADER_LEN {
        return Ok(None);
    }

    let content_type = ContentType::from_u8(data[0]).map_err(|v| {
        TlsError::UnexpectedMessage(format!("unknown record content type {v}"))
    })?;
    let version = u16::from_be_bytes([data[1], data[2]]);
    if version >> 8 != 3 {
        return Err(TlsError::DecodeError(format!(
            "record version 0x{version:04x} is not SSL 3.x"
        )));
    }
    let length = u16::from_be_bytes([data[3], data[4]]) as usize;
    if length > MAX_CIPHERTEXT_LENGTH {
        return Err(TlsError::RecordOverflow);
    }

    if data.len() < RECORD_HEADER_LEN + length {
        return Ok(None);
    }

    let fragment = data[RECORD_HEADER_LEN..RECORD_HEADER_LEN + length].to_vec();
    Ok(Some((
        Record {
            content_type,
            version,
            fragment,
        },
        RECORD_HEADER_LEN + length,
    )))
}

/// Length of the record starting at the front of `data`, once its header
/// is available.
pub fn peek_record_len(data: &[u8]) -> Option<usize> {
    if data.len() < RECORD_HEADER_LEN {
        return None;
    }
    Some(RECORD_HEADER_LEN + u16::from_be_bytes([data[3], data[4]]) as usize)
}

/// Serialize a record to bytes.
pub fn serialize_record(record: &Record, out: &mut Vec<u8>) {
    out.reserve(RECORD_HEADER_LEN + record.fragment.len());
    out.push(record.content_type as u8);
    out.extend_from_slice(&record.version.to_be_bytes());
    out.extend_from_slice(&(record.fragment.len() as u16).to_be_bytes());
    out.extend_from_slice(&record.fragment);
}
