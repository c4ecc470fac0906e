#![forbid(unsafe_code)]
#![doc = "SSL 3.0 / TLS 1.0 record and handshake protocol for legatls."]

pub mod alert;
pub mod config;
pub mod context;
pub mod crypt;
pub mod handshake;
pub mod protocol;
pub mod record;
pub mod session;
pub mod stream;
#[cfg(feature = "async")]
pub mod stream_async;
pub mod transport;

pub use config::TlsConfig;
pub use legatls_types::TlsError;
pub use protocol::{RecordEvent, RecordProtocol};
pub use session::SessionCache;
pub use stream::SslStream;
#[cfg(feature = "async")]
pub use stream_async::AsyncSslStream;

use std::fmt;

/// Protocol version as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ProtocolVersion {
    Ssl30 = 0x0300,
    Tls10 = 0x0301,
}

impl ProtocolVersion {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0300 => Some(ProtocolVersion::Ssl30),
            0x0301 => Some(ProtocolVersion::Tls10),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Highest version we speak that does not exceed a peer's offer.
    /// Offers above TLS 1.0 (e.g. 0x0303) fall back to TLS 1.0.
    pub fn clamp_offer(v: u16) -> Option<Self> {
        if v >= ProtocolVersion::Tls10 as u16 {
            Some(ProtocolVersion::Tls10)
        } else {
            Self::from_u16(v)
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Ssl30 => f.write_str("SSLv3"),
            ProtocolVersion::Tls10 => f.write_str("TLSv1.0"),
        }
    }
}

/// Cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const TLS_RSA_WITH_NULL_MD5: Self = Self(0x0001);
    pub const TLS_RSA_WITH_NULL_SHA: Self = Self(0x0002);
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x000A);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crypt::CipherSuiteParams::from_suite(*self) {
            Ok(params) => f.write_str(params.name),
            Err(_) => write!(f, "0x{:04x}", self.0),
        }
    }
}

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsRole {
    Client,
    Server,
}

impl TlsRole {
    pub fn peer(self) -> Self {
        match self {
            TlsRole::Client => TlsRole::Server,
            TlsRole::Server => TlsRole::Client,
        }
    }
}

/// Direction of record traffic relative to the local endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A synchronous TLS connection.
pub trait TlsConnection {
    /// Perform the handshake if it has not completed yet.
    fn handshake(&self) -> Result<(), TlsError>;
    /// Read decrypted application data into `buf`. Returns 0 at end of stream.
    fn read_data(&self, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Encrypt and send `buf`.
    fn write_data(&self, buf: &[u8]) -> Result<usize, TlsError>;
    /// Send close_notify (if appropriate) and shut the transport down.
    fn close(&self) -> Result<(), TlsError>;
    /// Negotiated protocol version, once the handshake finished.
    fn version(&self) -> Option<ProtocolVersion>;
    /// Negotiated cipher suite, once the handshake finished.
    fn cipher_suite(&self) -> Option<CipherSuite>;
}

/// An asynchronous TLS connection.
#[cfg(feature = "async")]
#[allow(async_fn_in_trait)]
pub trait AsyncTlsConnection {
    /// Perform the handshake if it has not completed yet.
    async fn handshake(&self) -> Result<(), TlsError>;
    /// Read decrypted application data into `buf`. Returns 0 at end of stream.
    async fn read_data(&self, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Encrypt and send `buf`.
    async fn write_data(&self, buf: &[u8]) -> Result<usize, TlsError>;
    /// Send close_notify (if appropriate) and shut the transport down.
    async fn close(&self) -> Result<(), TlsError>;
    /// Negotiated protocol version, once the handshake finished.
    fn version(&self) -> Option<ProtocolVersion>;
    /// Negotiated cipher suite, once the handshake finished.
    fn cipher_suite(&self) -> Option<CipherSuite>;
}
