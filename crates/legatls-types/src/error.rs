use crate::alert::{Alert, AlertDescription};

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid key")]
    InvalidKey,
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input not a multiple of the block size")]
    NotBlockAligned,
    #[error("rsa: encryption failed")]
    RsaEncryptFail,
    #[error("rsa: signing failed")]
    RsaSignFail,
    #[error("rsa: verification failed")]
    RsaVerifyFail,
    #[error("rsa: invalid padding")]
    RsaInvalidPadding,
    #[error("random number generator failure")]
    RandFail,
}

/// TLS protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("record overflow")]
    RecordOverflow,
    #[error("bad record MAC")]
    BadRecordMac,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("certificate verification failed: {0}")]
    CertVerifyFailed(String),
    #[error("alert received: {0}")]
    AlertReceived(Alert),
    #[error("unsupported cipher suite: 0x{0:04x}")]
    UnsupportedCipherSuite(u16),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("record layer error: {0}")]
    RecordError(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("stream truncated inside a record")]
    TruncatedStream,
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

impl TlsError {
    /// The alert a local failure is reported to the peer with, if any.
    ///
    /// Peer-signaled, configuration and transport errors return `None`.
    pub fn alert_description(&self) -> Option<AlertDescription> {
        match self {
            TlsError::HandshakeFailed(_) | TlsError::NoSharedCipherSuite => {
                Some(AlertDescription::HandshakeFailure)
            }
            TlsError::UnexpectedMessage(_) => Some(AlertDescription::UnexpectedMessage),
            TlsError::DecodeError(_) => Some(AlertDescription::IllegalParameter),
            TlsError::UnsupportedVersion => Some(AlertDescription::ProtocolVersion),
            TlsError::RecordOverflow => Some(AlertDescription::RecordOverflow),
            TlsError::BadRecordMac => Some(AlertDescription::BadRecordMac),
            TlsError::DecryptionFailed => Some(AlertDescription::DecryptionFailed),
            TlsError::CertVerifyFailed(_) => Some(AlertDescription::BadCertificate),
            TlsError::RecordError(_) | TlsError::CryptoError(_) => {
                Some(AlertDescription::InternalError)
            }
            TlsError::AlertReceived(_)
            | TlsError::UnsupportedCipherSuite(_)
            | TlsError::UnsupportedAlgorithm(_)
            | TlsError::InvalidConfig(_)
            | TlsError::ConnectionClosed
            | TlsError::TruncatedStream
            | TlsError::IoError(_) => None,
        }
    }
}

impl From<TlsError> for std::io::Error {
    fn from(err: TlsError) -> Self {
        use std::io::ErrorKind;
        match err {
            TlsError::IoError(e) => e,
            TlsError::TruncatedStream => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            TlsError::ConnectionClosed => std::io::Error::new(ErrorKind::NotConnected, err),
            TlsError::UnsupportedCipherSuite(_)
            | TlsError::UnsupportedAlgorithm(_)
            | TlsError::InvalidConfig(_) => std::io::Error::new(ErrorKind::InvalidInput, err),
            other => std::io::Error::new(ErrorKind::InvalidData, other),
        }
    }
}
